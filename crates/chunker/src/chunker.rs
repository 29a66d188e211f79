use crate::config::ChunkerConfig;
use crate::error::{LoadError, Result};
use crate::priority::PriorityTier;
use crate::types::Chunk;

/// Splits documents into overlapping, line-aligned passages
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker with configuration
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate().map_err(LoadError::invalid_config)?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk one document. Whitespace-only passages are dropped.
    pub fn chunk_document(&self, path: &str, content: &str, priority: PriorityTier) -> Vec<Chunk> {
        let lines: Vec<&str> = content.lines().collect();
        let mut chunks = Vec::new();

        // Window of line indices [start, end) plus its length in chars, newlines included.
        let mut start = 0usize;
        let mut end = 0usize;
        let mut window_chars = 0usize;

        for (idx, line) in lines.iter().enumerate() {
            let line_chars = line.chars().count();
            if end > start && window_chars + 1 + line_chars > self.config.chunk_size {
                Self::push_chunk(&mut chunks, path, &lines, start, end, priority);

                let carried = self.overlap_start(&lines, start, end);
                let carried_chars = Self::window_chars(&lines[carried..end]);
                if carried < end && carried_chars + 1 + line_chars <= self.config.chunk_size {
                    start = carried;
                    window_chars = carried_chars + 1;
                } else {
                    start = idx;
                    window_chars = 0;
                }
            } else if end > start {
                window_chars += 1;
            }
            window_chars += line_chars;
            end = idx + 1;
        }

        if end > start {
            Self::push_chunk(&mut chunks, path, &lines, start, end, priority);
        }

        chunks
    }

    /// First line index of the overlap carried out of the window `[start, end)`.
    /// Never carries the whole window.
    fn overlap_start(&self, lines: &[&str], start: usize, end: usize) -> usize {
        let mut carried = end;
        let mut chars = 0usize;
        while carried > start + 1 {
            let line_chars = lines[carried - 1].chars().count();
            let separator = usize::from(carried < end);
            if chars + line_chars + separator > self.config.overlap {
                break;
            }
            chars += line_chars + separator;
            carried -= 1;
        }
        carried
    }

    fn window_chars(lines: &[&str]) -> usize {
        let text: usize = lines.iter().map(|line| line.chars().count()).sum();
        text + lines.len().saturating_sub(1)
    }

    fn push_chunk(
        chunks: &mut Vec<Chunk>,
        path: &str,
        lines: &[&str],
        start: usize,
        end: usize,
        priority: PriorityTier,
    ) {
        let content = lines[start..end].join("\n");
        if content.trim().is_empty() {
            return;
        }
        chunks.push(Chunk::new(path, start + 1, end, content, priority));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunker(chunk_size: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkerConfig {
            chunk_size,
            overlap,
        })
        .unwrap()
    }

    #[test]
    fn small_document_is_one_chunk() {
        let chunks = chunker(1000, 200).chunk_document(
            "qualitative/mission.md",
            "# Mission\nHousing stability for all.",
            PriorityTier::Qualitative,
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "# Mission\nHousing stability for all.");
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
        assert_eq!(chunks[0].id, "qualitative/mission.md:1:2");
        assert_eq!(chunks[0].priority, PriorityTier::Qualitative);
    }

    #[test]
    fn splits_on_budget_and_carries_trailing_lines() {
        // Four 9-char lines; budget fits two lines (9 + 1 + 9 = 19).
        let doc = "line-aaaa\nline-bbbb\nline-cccc\nline-dddd";
        let chunks = chunker(20, 10).chunk_document("doc.md", doc, PriorityTier::Examples);

        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "line-aaaa\nline-bbbb",
                "line-bbbb\nline-cccc",
                "line-cccc\nline-dddd",
            ]
        );
        assert_eq!(chunks[1].start_line, 2);
        assert_eq!(chunks[1].end_line, 3);
        assert_eq!(chunks[2].end_line, 4);
    }

    #[test]
    fn zero_overlap_produces_disjoint_chunks() {
        let doc = "aaaa\nbbbb\ncccc\ndddd";
        let chunks = chunker(9, 0).chunk_document("doc.md", doc, PriorityTier::Contact);
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["aaaa\nbbbb", "cccc\ndddd"]);
    }

    #[test]
    fn joining_newline_counts_against_budget() {
        let chunks = chunker(8, 0).chunk_document("doc.md", "aaaa\nbbbb", PriorityTier::Contact);
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["aaaa", "bbbb"]);
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 8));
    }

    #[test]
    fn oversize_line_stands_alone() {
        let long = "x".repeat(50);
        let doc = format!("short\n{long}\ntail");
        let chunks = chunker(20, 10).chunk_document("doc.md", &doc, PriorityTier::Contact);
        let contents: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        assert_eq!(contents, vec!["short".to_string(), long, "tail".to_string()]);
    }

    #[test]
    fn blank_documents_yield_nothing() {
        let chunks = chunker(100, 10).chunk_document("empty.md", "\n  \n\n", PriorityTier::Contact);
        assert!(chunks.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = Chunker::new(ChunkerConfig {
            chunk_size: 10,
            overlap: 10,
        });
        assert!(matches!(err, Err(LoadError::InvalidConfig(_))));
    }
}
