//! In-memory vector index with cosine distance search.
//!
//! Stores question embeddings with their document and metadata.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::question::Metadata;

/// An entry in the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    /// The text that was embedded
    pub document: String,
    pub metadata: Metadata,
    /// The embedding vector
    pub embedding: Vec<f32>,
}

/// In-memory vector index for semantic search.
///
/// Stores entries keyed by question ID, supporting:
/// - Upsert by ID
/// - Exact nearest-neighbour search by cosine distance
pub struct VectorIndex {
    entries: HashMap<String, VectorEntry>,
    /// Expected embedding dimensions
    dimensions: usize,
}

/// One nearest-neighbour match.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    /// Cosine distance, `1 - cosine similarity` (0.0 is identical direction)
    pub distance: f32,
    pub metadata: Metadata,
}

impl VectorIndex {
    /// Create a new empty vector index with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            entries: HashMap::new(),
            dimensions,
        }
    }

    /// Create an index with pre-allocated capacity.
    pub fn with_capacity(dimensions: usize, capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            dimensions,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or overwrite an entry.
    ///
    /// Returns an error if the embedding has the wrong length or zero norm.
    pub fn upsert(&mut self, id: String, entry: VectorEntry) -> Result<(), IndexError> {
        self.check_vector(&entry.embedding)?;
        self.entries.insert(id, entry);
        Ok(())
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<&VectorEntry> {
        self.entries.get(id)
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VectorEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Return the `limit` entries nearest to `query`, nearest first.
    ///
    /// Ties on distance are ordered by ID so results are deterministic.
    pub fn query(&self, query: &[f32], limit: usize) -> Result<Vec<QueryHit>, IndexError> {
        self.check_vector(query)?;

        if limit == 0 {
            return Ok(vec![]);
        }

        let query_norm = l2_norm(query);

        let mut scored: Vec<(&String, f32)> = self
            .entries
            .par_iter()
            .map(|(id, entry)| (id, cosine_distance(query, query_norm, &entry.embedding)))
            .collect();

        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(id, distance)| {
                let entry = &self.entries[id];
                QueryHit {
                    id: id.clone(),
                    document: entry.document.clone(),
                    distance,
                    metadata: entry.metadata.clone(),
                }
            })
            .collect())
    }

    fn check_vector(&self, v: &[f32]) -> Result<(), IndexError> {
        if v.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: v.len(),
            });
        }

        if l2_norm(v) < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        Ok(())
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine distance with the query norm precomputed.
fn cosine_distance(query: &[f32], query_norm: f32, target: &[f32]) -> f32 {
    let target_norm = l2_norm(target);
    if target_norm < f32::EPSILON {
        return 1.0;
    }

    let dot_product: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    1.0 - dot_product / (query_norm * target_norm)
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot store or search with zero-norm vector")]
    ZeroNormVector,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(document: &str, embedding: Vec<f32>) -> VectorEntry {
        VectorEntry {
            document: document.to_string(),
            metadata: Metadata::new(),
            embedding,
        }
    }

    #[test]
    fn test_new_index() {
        let index = VectorIndex::new(384);
        assert_eq!(index.dimensions(), 384);
        assert!(index.is_empty());
    }

    #[test]
    fn test_upsert_overwrites_by_id() {
        let mut index = VectorIndex::new(3);
        index.upsert("1".into(), entry("old", vec![1.0, 0.0, 0.0])).unwrap();
        index.upsert("1".into(), entry("new", vec![0.0, 1.0, 0.0])).unwrap();

        assert_eq!(index.len(), 1);
        let stored = index.get("1").unwrap();
        assert_eq!(stored.document, "new");
        assert_eq!(stored.embedding, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_upsert_dimension_mismatch() {
        let mut index = VectorIndex::new(3);
        let result = index.upsert("1".into(), entry("t", vec![1.0, 0.0, 0.0, 0.0]));
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_upsert_zero_norm_rejected() {
        let mut index = VectorIndex::new(3);
        let result = index.upsert("1".into(), entry("t", vec![0.0, 0.0, 0.0]));
        assert!(matches!(result, Err(IndexError::ZeroNormVector)));
    }

    #[test]
    fn test_query_orders_by_ascending_distance() {
        let mut index = VectorIndex::new(3);
        index.upsert("far".into(), entry("far", vec![0.0, 0.0, 1.0])).unwrap();
        index.upsert("near".into(), entry("near", vec![1.0, 0.0, 0.0])).unwrap();
        index.upsert("mid".into(), entry("mid", vec![1.0, 1.0, 0.0])).unwrap();

        let hits = index.query(&[1.0, 0.1, 0.0], 10).unwrap();

        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!(hits[0].distance < 0.01);
        assert!((hits[2].distance - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_query_respects_limit() {
        let mut index = VectorIndex::new(3);
        for i in 0..10 {
            index
                .upsert(i.to_string(), entry("t", vec![1.0, i as f32 * 0.1, 0.0]))
                .unwrap();
        }

        assert_eq!(index.query(&[1.0, 0.0, 0.0], 3).unwrap().len(), 3);
        assert_eq!(index.query(&[1.0, 0.0, 0.0], 50).unwrap().len(), 10);
        assert!(index.query(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_query_ties_break_by_id() {
        let mut index = VectorIndex::new(2);
        index.upsert("b".into(), entry("b", vec![1.0, 0.0])).unwrap();
        index.upsert("a".into(), entry("a", vec![2.0, 0.0])).unwrap();

        let hits = index.query(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "b");
    }

    #[test]
    fn test_query_empty_index() {
        let index = VectorIndex::new(3);
        assert!(index.query(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let index = VectorIndex::new(3);
        let result = index.query(&[1.0, 0.0], 5);
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }
}
