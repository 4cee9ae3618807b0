//! Vector index - cosine-similarity ranking over chunk embeddings
//!
//! Brute-force exact scan, which is the right trade at single-repository
//! scale (low thousands of chunks). The `VectorSearcher` trait is the seam
//! for substituting an approximate index later without touching callers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{EngineError, Result};

/// Ranking interface shared by the flat index and any future ANN index.
pub trait VectorSearcher: Send + Sync {
    /// Store an embedding. The first insertion fixes the index dimension;
    /// later insertions with a different dimension fail.
    fn add(&mut self, chunk_id: &str, embedding: Vec<f32>) -> Result<()>;

    /// Returns false when the id was not present.
    fn remove(&mut self, chunk_id: &str) -> bool;

    fn update(&mut self, chunk_id: &str, embedding: Vec<f32>) -> Result<()> {
        self.remove(chunk_id);
        self.add(chunk_id, embedding)
    }

    /// Top-k by cosine similarity in `[-1, 1]`, score descending, ties
    /// broken by chunk id ascending.
    fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)>;

    /// Dimension fixed at first insertion, `None` while empty.
    fn dimension(&self) -> Option<usize>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

/// Flat in-memory embedding store.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FlatVectorIndex {
    embeddings: HashMap<String, Vec<f32>>,
    dimension: Option<usize>,
}

impl FlatVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.embeddings.contains_key(chunk_id)
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = &String> {
        self.embeddings.keys()
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&String, &Vec<f32>)> {
        self.embeddings.iter()
    }
}

impl VectorSearcher for FlatVectorIndex {
    fn add(&mut self, chunk_id: &str, embedding: Vec<f32>) -> Result<()> {
        match self.dimension {
            None => self.dimension = Some(embedding.len()),
            Some(expected) if expected != embedding.len() => {
                return Err(EngineError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
            Some(_) => {}
        }
        self.embeddings.insert(chunk_id.to_string(), embedding);
        Ok(())
    }

    fn remove(&mut self, chunk_id: &str) -> bool {
        self.embeddings.remove(chunk_id).is_some()
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        let mut scored: Vec<(String, f32)> = self
            .embeddings
            .iter()
            .map(|(id, emb)| (id.clone(), cosine_similarity(query, emb)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn len(&self) -> usize {
        self.embeddings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_by_cosine_similarity() {
        let mut index = FlatVectorIndex::new();
        index.add("near", vec![1.0, 0.0, 0.0]).unwrap();
        index.add("far", vec![0.0, 1.0, 0.0]).unwrap();
        index.add("opposite", vec![-1.0, 0.0, 0.0]).unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 3);
        assert_eq!(results[0].0, "near");
        assert!((results[0].1 - 1.0).abs() < 1e-6);
        assert_eq!(results[2].0, "opposite");
        assert!((results[2].1 + 1.0).abs() < 1e-6);
    }

    #[test]
    fn dimension_fixed_at_first_insertion() {
        let mut index = FlatVectorIndex::new();
        assert_eq!(index.dimension(), None);
        index.add("a", vec![0.1, 0.2]).unwrap();
        assert_eq!(index.dimension(), Some(2));

        let err = index.add("b", vec![0.1, 0.2, 0.3]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn equal_scores_tie_break_by_id_ascending() {
        let mut index = FlatVectorIndex::new();
        index.add("zeta", vec![1.0, 0.0]).unwrap();
        index.add("alpha", vec![1.0, 0.0]).unwrap();

        let results = index.search(&[1.0, 0.0], 2);
        assert_eq!(results[0].0, "alpha");
        assert_eq!(results[1].0, "zeta");
        assert_eq!(results[0].1, results[1].1);
    }

    #[test]
    fn remove_and_update() {
        let mut index = FlatVectorIndex::new();
        index.add("a", vec![1.0, 0.0]).unwrap();

        assert!(index.remove("a"));
        assert!(!index.remove("a"));
        assert!(index.is_empty());

        index.add("a", vec![0.0, 1.0]).unwrap();
        index.update("a", vec![1.0, 0.0]).unwrap();
        let results = index.search(&[1.0, 0.0], 1);
        assert!((results[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_scores_zero() {
        let mut index = FlatVectorIndex::new();
        index.add("a", vec![0.0, 0.0]).unwrap();
        let results = index.search(&[1.0, 0.0], 1);
        assert_eq!(results[0].1, 0.0);
    }
}
