use serde::{Deserialize, Serialize};

/// A bounded text segment owned by exactly one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub document_id: String,
    /// Position within the owning document, stable across rebuilds of the
    /// same text.
    pub position: usize,
    pub content: String,
}

/// One nearest-neighbor hit: index into the chunk list plus squared L2 distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f32,
}
