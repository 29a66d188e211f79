use crate::priority::PriorityTier;
use serde::{Deserialize, Serialize};

/// A retrievable passage from the knowledge base
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Stable identifier, unique within a build (`path:start:end`)
    pub id: String,

    /// Document path relative to the knowledge-base root (`/`-separated)
    pub path: String,

    /// Passage text
    pub content: String,

    /// Priority tier resolved from the document category
    pub priority: PriorityTier,

    /// Start line (1-indexed)
    pub start_line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,
}

impl Chunk {
    /// Create a new chunk; the id is derived from path and line span
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        start_line: usize,
        end_line: usize,
        content: impl Into<String>,
        priority: PriorityTier,
    ) -> Self {
        let path = path.into();
        Self {
            id: Self::make_id(&path, start_line, end_line),
            path,
            content: content.into(),
            priority,
            start_line,
            end_line,
        }
    }

    #[must_use]
    pub fn make_id(path: &str, start_line: usize, end_line: usize) -> String {
        format!("{path}:{start_line}:{end_line}")
    }

    /// Numeric weight of this chunk's tier
    #[must_use]
    pub const fn priority_weight(&self) -> f32 {
        self.priority.weight()
    }

    /// Get the number of lines in this chunk
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}
