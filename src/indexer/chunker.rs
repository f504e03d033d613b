//! Paragraph-first chunking with sentence-bounded splitting of oversized text.
use crate::config::Config;
use crate::store::Chunk;

/// Sentence terminators considered when cutting an oversized paragraph.
const SENTENCE_ENDS: [char; 5] = ['.', '!', '?', '\n', '。'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    pub chunk_size: usize,
    /// Chunks longer than this are re-split before indexing.
    pub presplit_threshold: usize,
    /// Upper bound for re-split segments.
    pub presplit_target: usize,
}

impl ChunkOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunk_size,
            presplit_threshold: config.retrieval.presplit_threshold,
            presplit_target: config.retrieval.presplit_target,
        }
    }
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Chunk one document. Positions count up from zero in document order.
#[must_use]
pub fn chunk_document(document_id: &str, text: &str, options: &ChunkOptions) -> Vec<Chunk> {
    split_into_chunks(text, options.chunk_size)
        .into_iter()
        .flat_map(|c| presplit(&c, options.presplit_threshold, options.presplit_target))
        .enumerate()
        .map(|(position, content)| Chunk {
            document_id: document_id.to_string(),
            position,
            content,
        })
        .collect()
}

/// Group blank-line separated paragraphs into chunks of about `chunk_size`
/// characters.
#[must_use]
pub fn split_into_chunks(content: &str, chunk_size: usize) -> Vec<String> {
    if content.chars().count() <= chunk_size {
        let trimmed = content.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for para in content.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let para_len = para.chars().count();

        if current_len > 0 && current_len + para_len + 2 > chunk_size {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if para_len > chunk_size {
            if current_len > 0 {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            chunks.extend(split_at_sentences(para, chunk_size));
            continue;
        }

        if current_len > 0 {
            current.push_str("\n\n");
            current_len += 2;
        }
        current.push_str(para);
        current_len += para_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Re-split a chunk longer than `threshold` into sentence groups no longer
/// than `target` characters. Shorter chunks pass through untouched.
#[must_use]
pub fn presplit(chunk: &str, threshold: usize, target: usize) -> Vec<String> {
    if chunk.chars().count() <= threshold {
        return vec![chunk.to_string()];
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in chunk
        .split_inclusive('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let sentence_len = sentence.chars().count();

        if sentence_len > target {
            if current_len > 0 {
                segments.push(std::mem::take(&mut current));
                current_len = 0;
            }
            segments.extend(split_at_sentences(sentence, target));
            continue;
        }

        let joined_len = if current_len > 0 {
            current_len + 1 + sentence_len
        } else {
            sentence_len
        };
        if joined_len > target {
            segments.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(sentence);
        current_len += sentence_len;
    }

    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Cut `text` into pieces of at most `max_chars`, preferring to end each piece
/// on a sentence terminator found in its second half.
fn split_at_sentences(text: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut chars: Vec<char> = text.chars().collect();

    while chars.len() > max_chars {
        let cut = (max_chars / 2..max_chars)
            .rev()
            .find(|&i| SENTENCE_ENDS.contains(&chars[i]))
            .map_or(max_chars, |i| i + 1);

        let piece: String = chars[..cut].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }

        let rest: String = chars[cut..].iter().collect();
        chars = rest.trim().chars().collect();
    }

    if !chars.is_empty() {
        pieces.push(chars.into_iter().collect());
    }
    pieces
}
