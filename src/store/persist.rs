//! On-disk layout of a chunk store.
//!
//! ```text
//! index_dir/
//!   index.bin     header (magic, version, dimension, count) + f32 vectors
//!   chunks.txt    chunk texts, each followed by CHUNK_SEPARATOR
//!   sources.json  [{document_id, position}] in chunk order
//! ```
//!
//! Vectors are written in host byte order, which is little-endian on every
//! target this crate ships for.
use std::fs;
use std::path::Path;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Chunk, ChunkStore, FlatIndex, StoreError};

pub const CHUNK_SEPARATOR: &str = "\n===CHUNK_SEPARATOR===\n";
pub const INDEX_FILE: &str = "index.bin";
pub const CHUNKS_FILE: &str = "chunks.txt";
pub const SOURCES_FILE: &str = "sources.json";

const MAGIC: [u8; 4] = *b"RGIX";
const FORMAT_VERSION: u32 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct IndexHeader {
    magic: [u8; 4],
    version: u32,
    dimension: u32,
    count: u32,
}

const HEADER_LEN: usize = std::mem::size_of::<IndexHeader>();

#[derive(Debug, Serialize, Deserialize)]
struct ChunkSource {
    document_id: String,
    position: usize,
}

/// Whether all three index files exist in `dir`.
#[must_use]
pub fn exists(dir: &Path) -> bool {
    [INDEX_FILE, CHUNKS_FILE, SOURCES_FILE]
        .iter()
        .all(|f| dir.join(f).is_file())
}

/// Write an indexed store to `dir`, creating the directory if needed.
pub fn save(store: &ChunkStore, dir: &Path) -> Result<(), StoreError> {
    let index = store.index().ok_or(StoreError::NotIndexed)?;
    fs::create_dir_all(dir)?;

    let header = IndexHeader {
        magic: MAGIC,
        version: FORMAT_VERSION,
        dimension: to_u32(index.dimension())?,
        count: to_u32(index.len())?,
    };
    let mut blob = Vec::with_capacity(HEADER_LEN + index.raw().len() * 4);
    blob.extend_from_slice(bytemuck::bytes_of(&header));
    blob.extend_from_slice(bytemuck::cast_slice(index.raw()));
    fs::write(dir.join(INDEX_FILE), blob)?;

    let mut text = String::new();
    for chunk in store.chunks() {
        if chunk.content.contains(CHUNK_SEPARATOR) {
            return Err(StoreError::Corrupt(format!(
                "chunk {} of {} contains the separator",
                chunk.position, chunk.document_id
            )));
        }
        text.push_str(&chunk.content);
        text.push_str(CHUNK_SEPARATOR);
    }
    fs::write(dir.join(CHUNKS_FILE), text)?;

    let sources: Vec<ChunkSource> = store
        .chunks()
        .iter()
        .map(|c| ChunkSource {
            document_id: c.document_id.clone(),
            position: c.position,
        })
        .collect();
    fs::write(
        dir.join(SOURCES_FILE),
        serde_json::to_string_pretty(&sources)?,
    )?;

    info!(
        "Saved index with {} chunks ({} dims) to {}",
        store.len(),
        index.dimension(),
        dir.display()
    );
    Ok(())
}

/// Read a store previously written by [`save`].
///
/// The three files must agree on the chunk count.
pub fn load(dir: &Path) -> Result<ChunkStore, StoreError> {
    let blob = fs::read(dir.join(INDEX_FILE))?;
    let index = decode_index(&blob)?;

    let text = fs::read_to_string(dir.join(CHUNKS_FILE))?;
    let texts = split_chunk_texts(&text);

    let sources: Vec<ChunkSource> =
        serde_json::from_str(&fs::read_to_string(dir.join(SOURCES_FILE))?)?;

    if texts.len() != sources.len() {
        return Err(StoreError::Corrupt(format!(
            "{} chunk texts but {} chunk sources",
            texts.len(),
            sources.len()
        )));
    }

    let chunks = texts
        .into_iter()
        .zip(sources)
        .map(|(content, src)| Chunk {
            document_id: src.document_id,
            position: src.position,
            content: content.to_string(),
        })
        .collect();

    ChunkStore::indexed(chunks, index)
}

/// Split the chunk file, dropping the empty entry left by the final separator.
fn split_chunk_texts(text: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = text.split(CHUNK_SEPARATOR).collect();
    if parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts
}

fn decode_index(blob: &[u8]) -> Result<FlatIndex, StoreError> {
    let header_bytes = blob
        .get(..HEADER_LEN)
        .ok_or_else(|| StoreError::Corrupt("index file shorter than header".to_string()))?;
    let header: IndexHeader = bytemuck::pod_read_unaligned(header_bytes);

    if header.magic != MAGIC {
        return Err(StoreError::Corrupt("bad magic".to_string()));
    }
    if header.version != FORMAT_VERSION {
        return Err(StoreError::Corrupt(format!(
            "unsupported format version {}",
            header.version
        )));
    }

    let body = &blob[HEADER_LEN..];
    let expected = header.dimension as usize * header.count as usize * 4;
    if body.len() != expected {
        return Err(StoreError::Corrupt(format!(
            "expected {expected} bytes of vectors, found {}",
            body.len()
        )));
    }

    let data: Vec<f32> = bytemuck::pod_collect_to_vec(body);
    FlatIndex::from_raw(header.dimension as usize, data)
}

fn to_u32(n: usize) -> Result<u32, StoreError> {
    u32::try_from(n).map_err(|_| StoreError::Corrupt(format!("{n} does not fit the header")))
}
