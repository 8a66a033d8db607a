// Exact nearest-neighbor search over a flat vector store.
// Brute-force squared-L2 scan; for collections in the hundreds of thousands
// this is still fast enough and keeps results fully deterministic.

use serde::{Deserialize, Serialize};

/// A single search hit: insertion id plus squared-L2 distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: usize,
    pub distance: f32,
}

/// Append-only flat index of fixed-dimension vectors. The insertion id of a
/// vector is its 0-based position, and that correspondence survives
/// serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    dim: usize,
    vectors: Vec<f32>,
}

impl VectorIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.vectors.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Append a vector, returning its insertion id (the count before the
    /// append). The vector must match the index dimension.
    pub fn add(&mut self, vector: &[f32]) -> usize {
        assert_eq!(
            vector.len(),
            self.dim,
            "vector dimension {} does not match index dimension {}",
            vector.len(),
            self.dim
        );
        let id = self.len();
        self.vectors.extend_from_slice(vector);
        id
    }

    /// Exact k-nearest-neighbor search by squared Euclidean distance,
    /// ascending. Ties are broken by smaller insertion id. Requesting more
    /// results than stored returns everything.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        assert_eq!(
            query.len(),
            self.dim,
            "query dimension {} does not match index dimension {}",
            query.len(),
            self.dim
        );
        let mut hits: Vec<Neighbor> = self
            .vectors
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(id, stored)| Neighbor {
                id,
                distance: squared_l2(query, stored),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        hits.truncate(k);
        hits
    }
}

/// Sum of squared per-dimension differences.
#[inline]
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_insertion_order() {
        let mut index = VectorIndex::new(2);
        assert_eq!(index.add(&[0.0, 0.0]), 0);
        assert_eq!(index.add(&[1.0, 0.0]), 1);
        assert_eq!(index.add(&[5.0, 0.0]), 2);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn search_returns_exact_distances_ascending() {
        let mut index = VectorIndex::new(2);
        index.add(&[0.0, 0.0]); // A
        index.add(&[1.0, 0.0]); // B
        index.add(&[5.0, 0.0]); // C

        let hits = index.search(&[1.0, 0.0], 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, 1);
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[1].id, 0);
        assert_eq!(hits[1].distance, 1.0);
        assert_eq!(hits[2].id, 2);
        assert_eq!(hits[2].distance, 25.0);
    }

    #[test]
    fn ties_broken_by_lower_insertion_id() {
        let mut index = VectorIndex::new(2);
        index.add(&[0.0, 0.0]); // A
        index.add(&[0.0, 0.0]); // B, identical

        let hits = index.search(&[0.0, 0.0], 2);
        assert_eq!(hits[0].id, 0);
        assert_eq!(hits[1].id, 1);
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[1].distance, 0.0);
    }

    #[test]
    fn oversized_k_returns_everything() {
        let mut index = VectorIndex::new(1);
        index.add(&[1.0]);
        index.add(&[2.0]);
        assert_eq!(index.search(&[0.0], 100).len(), 2);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = VectorIndex::new(3);
        assert!(index.search(&[0.0, 0.0, 0.0], 5).is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn survives_serialization() {
        let mut index = VectorIndex::new(2);
        index.add(&[0.5, -1.5]);
        index.add(&[3.0, 4.0]);

        let bytes = bincode::serialize(&index).unwrap();
        let restored: VectorIndex = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.dimension(), 2);
        let hits = restored.search(&[0.5, -1.5], 1);
        assert_eq!(hits[0].id, 0);
        assert_eq!(hits[0].distance, 0.0);
    }
}
