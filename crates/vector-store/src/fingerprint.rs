use kb_chunker::Chunk;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Content hash over a whole chunk set; names and validates cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash the chunk set independent of load order.
    ///
    /// Chunks are sorted by `(path, content)`; each field is fed length-prefixed so that
    /// moving bytes between path and content still changes the digest.
    #[must_use]
    pub fn of(chunks: &[Chunk]) -> Self {
        let mut sorted: Vec<&Chunk> = chunks.iter().collect();
        sorted.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then_with(|| a.content.cmp(&b.content))
        });

        let mut hasher = Sha256::new();
        for chunk in sorted {
            update_field(&mut hasher, chunk.path.as_bytes());
            update_field(&mut hasher, chunk.content.as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Accepts a 64-char lowercase hex digest
    #[must_use]
    pub fn from_hex(raw: &str) -> Option<Self> {
        let valid = raw.len() == 64
            && raw
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(raw.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log lines
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
