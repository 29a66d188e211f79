use crate::config::DEFAULT_KEYWORD_BOOST_FACTOR;
use kb_chunker::Chunk;
use kb_vector_store::tokenize;
use std::collections::HashSet;

/// Word-overlap scoring used when the query cannot be embedded.
///
/// `score = |query words ∩ chunk words| * (1 + weight * boost_factor)`; chunks sharing no
/// word with the query are dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeywordScorer {
    boost_factor: f32,
}

impl Default for KeywordScorer {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORD_BOOST_FACTOR)
    }
}

impl KeywordScorer {
    #[must_use]
    pub const fn new(boost_factor: f32) -> Self {
        Self { boost_factor }
    }

    /// Top `top_k` chunks by boosted overlap, ties in input order
    #[must_use]
    pub fn rank<'a>(&self, query: &str, chunks: &'a [Chunk], top_k: usize) -> Vec<(&'a Chunk, f32)> {
        let query_words = word_set(query);
        if query_words.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(&Chunk, f32)> = chunks
            .iter()
            .filter_map(|chunk| {
                let overlap = word_set(&chunk.content).intersection(&query_words).count();
                (overlap > 0).then(|| {
                    let boost = chunk.priority_weight().mul_add(self.boost_factor, 1.0);
                    (chunk, overlap as f32 * boost)
                })
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);
        scored
    }
}

fn word_set(text: &str) -> HashSet<String> {
    tokenize(text).collect()
}
