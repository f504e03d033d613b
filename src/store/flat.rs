//! Exact nearest-neighbor index over squared L2 distance.
//!
//! Vectors are stored contiguously so the whole index can be written out as a
//! single little-endian blob. The index is immutable: rebuilding produces a new
//! value.
use super::StoreError;
use super::models::Neighbor;

#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Build an index from per-chunk embeddings. All vectors must share `dimension`.
    pub fn build(dimension: usize, embeddings: &[Vec<f32>]) -> Result<Self, StoreError> {
        if dimension == 0 {
            return Err(StoreError::InvalidDimension(0));
        }

        let mut data = Vec::with_capacity(dimension * embeddings.len());
        for (i, vector) in embeddings.iter().enumerate() {
            if vector.len() != dimension {
                return Err(StoreError::DimensionMismatch {
                    position: i,
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            data.extend_from_slice(vector);
        }

        Ok(Self { dimension, data })
    }

    pub(crate) fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self, StoreError> {
        if dimension == 0 {
            return Err(StoreError::InvalidDimension(0));
        }
        if data.len() % dimension != 0 {
            return Err(StoreError::Corrupt(format!(
                "{} floats is not a multiple of dimension {dimension}",
                data.len()
            )));
        }
        Ok(Self { dimension, data })
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn raw(&self) -> &[f32] {
        &self.data
    }

    /// The `k` closest vectors to `query`, nearest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, StoreError> {
        if query.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                position: 0,
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(index, vector)| Neighbor {
                index,
                distance: squared_l2(vector, query),
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.index.cmp(&b.index))
        });
        neighbors.truncate(k);
        Ok(neighbors)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
