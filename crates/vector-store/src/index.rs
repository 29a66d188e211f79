use crate::error::{Result, VectorStoreError};
use crate::fingerprint::Fingerprint;
use crate::types::{count_mismatch, CacheEntry};
use kb_chunker::Chunk;

/// Immutable in-memory index: one row per chunk, all rows the same dimension.
///
/// Built once per fingerprint and shared behind an `Arc`; a rebuild produces a new index
/// rather than mutating this one.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    fingerprint: Fingerprint,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
    weights: Vec<f32>,
    dimension: usize,
}

impl VectorIndex {
    pub fn build(entry: CacheEntry) -> Result<Self> {
        let CacheEntry {
            fingerprint,
            chunks,
            vectors,
        } = entry;

        if chunks.len() != vectors.len() {
            return Err(count_mismatch(chunks.len(), vectors.len()));
        }
        let Some(first) = vectors.first() else {
            return Err(VectorStoreError::EmptyIndex);
        };
        let dimension = first.len();
        if let Some((position, row)) = vectors
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != dimension)
        {
            return Err(VectorStoreError::DimensionMismatch {
                expected: dimension,
                actual: row.len(),
                position,
            });
        }

        let weights = chunks.iter().map(Chunk::priority_weight).collect();
        Ok(Self {
            fingerprint,
            chunks,
            vectors,
            weights,
            dimension,
        })
    }

    #[must_use]
    pub const fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[must_use]
    pub fn chunk(&self, position: usize) -> Option<&Chunk> {
        self.chunks.get(position)
    }

    /// `(chunk, vector, priority weight)` rows in build order
    pub fn rows(&self) -> impl Iterator<Item = (&Chunk, &[f32], f32)> {
        self.chunks
            .iter()
            .zip(self.vectors.iter().map(Vec::as_slice))
            .zip(self.weights.iter().copied())
            .map(|((chunk, vector), weight)| (chunk, vector, weight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_chunker::PriorityTier;
    use pretty_assertions::assert_eq;

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk::new(format!("doc{i}.md"), 1, 1, format!("text {i}"), PriorityTier::Qualitative))
            .collect()
    }

    fn entry(vectors: Vec<Vec<f32>>) -> CacheEntry {
        let chunks = chunks(vectors.len());
        CacheEntry {
            fingerprint: Fingerprint::of(&chunks),
            chunks,
            vectors,
        }
    }

    #[test]
    fn builds_with_uniform_dimension() {
        let index = VectorIndex::build(entry(vec![vec![1.0, 0.0], vec![0.0, 1.0]])).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.dimension(), 2);
        assert_eq!(index.rows().count(), 2);
        assert!(index.rows().all(|(_, _, weight)| weight == 3.0));
        assert_eq!(index.chunk(1).unwrap().path, "doc1.md");
    }

    #[test]
    fn rejects_ragged_vectors_with_position() {
        let err = VectorIndex::build(entry(vec![vec![1.0, 0.0], vec![1.0], vec![0.0, 1.0]]))
            .unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch {
                expected: 2,
                actual: 1,
                position: 1
            }
        ));
    }

    #[test]
    fn rejects_empty_and_misaligned_entries() {
        assert!(matches!(
            VectorIndex::build(entry(Vec::new())),
            Err(VectorStoreError::EmptyIndex)
        ));

        let mut misaligned = entry(vec![vec![1.0]]);
        misaligned.vectors.push(vec![2.0]);
        assert!(matches!(
            VectorIndex::build(misaligned),
            Err(VectorStoreError::Corrupt(_))
        ));
    }
}
