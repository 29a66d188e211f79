use crate::error::{Result, VectorStoreError};
use crate::fingerprint::Fingerprint;
use kb_chunker::Chunk;
use serde::{Deserialize, Serialize};

/// Chunks paired one-to-one with their embeddings, tagged with the set's fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub chunks: Vec<Chunk>,
    pub vectors: Vec<Vec<f32>>,
}

impl CacheEntry {
    pub fn new(fingerprint: Fingerprint, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(count_mismatch(chunks.len(), vectors.len()));
        }
        Ok(Self {
            fingerprint,
            chunks,
            vectors,
        })
    }

    /// Dimension of the first vector; `None` when empty
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.vectors.first().map(Vec::len)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

pub(crate) fn count_mismatch(chunks: usize, vectors: usize) -> VectorStoreError {
    VectorStoreError::Corrupt(format!("{chunks} chunks but {vectors} vectors"))
}
