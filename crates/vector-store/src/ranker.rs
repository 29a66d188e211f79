use crate::index::VectorIndex;
use kb_chunker::Chunk;

pub const DEFAULT_BOOST_FACTOR: f32 = 0.1;

/// A scored index row
#[derive(Debug, Clone, PartialEq)]
pub struct RankedChunk<'a> {
    pub chunk: &'a Chunk,
    /// Boosted score
    pub score: f32,
    /// Raw cosine similarity
    pub similarity: f32,
    /// Row position in the index
    pub position: usize,
}

/// Cosine similarity scaled by chunk priority: `sim * (1 + weight * boost_factor)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranker {
    boost_factor: f32,
}

impl Default for Ranker {
    fn default() -> Self {
        Self::new(DEFAULT_BOOST_FACTOR)
    }
}

impl Ranker {
    #[must_use]
    pub const fn new(boost_factor: f32) -> Self {
        Self { boost_factor }
    }

    #[must_use]
    pub const fn boost_factor(&self) -> f32 {
        self.boost_factor
    }

    #[must_use]
    pub fn boosted_score(&self, similarity: f32, weight: f32) -> f32 {
        // `+ 0.0` folds -0.0 into 0.0 so equal scores stay tied under `total_cmp`
        similarity.mul_add(weight.mul_add(self.boost_factor, 1.0), 0.0)
    }

    /// Top `top_k` rows by boosted score, descending.
    ///
    /// Ties keep index order. `top_k == 0` yields nothing; `top_k` beyond the index size
    /// yields every row.
    #[must_use]
    pub fn rank<'a>(&self, query: &[f32], index: &'a VectorIndex, top_k: usize) -> Vec<RankedChunk<'a>> {
        if top_k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<RankedChunk<'a>> = index
            .rows()
            .enumerate()
            .map(|(position, (chunk, vector, weight))| {
                let similarity = cosine_similarity(query, vector);
                RankedChunk {
                    chunk,
                    score: self.boosted_score(similarity, weight),
                    similarity,
                    position,
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        scored
    }
}

/// Cosine similarity; 0 for mismatched lengths, zero vectors or non-finite results
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot_product / (norm_a * norm_b);
    if similarity.is_finite() {
        similarity + 0.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;
    use crate::types::CacheEntry;
    use kb_chunker::PriorityTier;
    use pretty_assertions::assert_eq;

    fn index(rows: Vec<(&str, PriorityTier, Vec<f32>)>) -> VectorIndex {
        let mut chunks = Vec::new();
        let mut vectors = Vec::new();
        for (path, tier, vector) in rows {
            chunks.push(Chunk::new(path, 1, 1, path, tier));
            vectors.push(vector);
        }
        VectorIndex::build(CacheEntry {
            fingerprint: Fingerprint::of(&chunks),
            chunks,
            vectors,
        })
        .unwrap()
    }

    fn paths(ranked: &[RankedChunk<'_>]) -> Vec<String> {
        ranked.iter().map(|r| r.chunk.path.clone()).collect()
    }

    #[test]
    fn cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn priority_breaks_equal_similarity() {
        let idx = index(vec![
            ("contact.md", PriorityTier::Contact, vec![1.0, 0.0]),
            ("quant.md", PriorityTier::Quantitative, vec![1.0, 0.0]),
            ("qual.md", PriorityTier::Qualitative, vec![1.0, 0.0]),
        ]);
        let ranked = Ranker::default().rank(&[1.0, 0.0], &idx, 3);
        assert_eq!(paths(&ranked), vec!["quant.md", "qual.md", "contact.md"]);
        assert!((ranked[0].score - 1.4).abs() < 1e-6);
        assert!((ranked[2].score - 1.1).abs() < 1e-6);
    }

    #[test]
    fn boost_strictly_increases_with_weight_for_positive_similarity() {
        let ranker = Ranker::default();
        let mut previous = f32::MIN;
        for tier in PriorityTier::ALL.into_iter().rev() {
            let score = ranker.boosted_score(0.5, tier.weight());
            assert!(score > previous);
            previous = score;
        }
    }

    #[test]
    fn similarity_dominates_small_priority_gaps() {
        let idx = index(vec![
            ("qual.md", PriorityTier::Qualitative, vec![0.2, 1.0]),
            ("quant.md", PriorityTier::Quantitative, vec![1.0, 0.1]),
        ]);
        let ranked = Ranker::default().rank(&[1.0, 0.0], &idx, 2);
        assert_eq!(paths(&ranked), vec!["quant.md", "qual.md"]);
    }

    #[test]
    fn ties_keep_index_order() {
        let idx = index(vec![
            ("b.md", PriorityTier::Qualitative, vec![1.0, 0.0]),
            ("a.md", PriorityTier::Qualitative, vec![1.0, 0.0]),
            ("c.md", PriorityTier::Qualitative, vec![1.0, 0.0]),
        ]);
        let ranked = Ranker::default().rank(&[1.0, 0.0], &idx, 3);
        assert_eq!(paths(&ranked), vec!["b.md", "a.md", "c.md"]);
        assert_eq!(ranked.iter().map(|r| r.position).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn signed_zero_scores_tie_in_index_order() {
        let idx = index(vec![
            ("first.md", PriorityTier::Qualitative, vec![0.0, -1.0]),
            ("second.md", PriorityTier::Qualitative, vec![0.0, 0.0]),
        ]);
        let ranked = Ranker::default().rank(&[-1.0, 0.0], &idx, 2);
        assert_eq!(paths(&ranked), vec!["first.md", "second.md"]);
        assert!(ranked.iter().all(|r| r.score.is_sign_positive()));
        assert!(cosine_similarity(&[-1.0, 0.0], &[0.0, -1.0]).is_sign_positive());
    }

    #[test]
    fn top_k_bounds() {
        let idx = index(vec![
            ("a.md", PriorityTier::Qualitative, vec![1.0, 0.0]),
            ("b.md", PriorityTier::Qualitative, vec![0.0, 1.0]),
        ]);
        let ranker = Ranker::default();
        assert!(ranker.rank(&[1.0, 0.0], &idx, 0).is_empty());
        assert_eq!(ranker.rank(&[1.0, 0.0], &idx, 10).len(), 2);
        assert_eq!(ranker.rank(&[1.0, 0.0], &idx, 1).len(), 1);
    }

    #[test]
    fn zero_query_scores_everything_zero() {
        let idx = index(vec![("a.md", PriorityTier::Quantitative, vec![1.0, 0.0])]);
        let ranked = Ranker::default().rank(&[0.0, 0.0], &idx, 1);
        assert_eq!(ranked[0].score, 0.0);
    }
}
