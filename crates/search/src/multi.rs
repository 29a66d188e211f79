use crate::error::Result;
use crate::service::{RetrievalMode, SearchHit, SearchOutcome, SearchService};
use kb_vector_store::tokenize;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

const STOP_WORDS: [&str; 12] = [
    "what", "how", "when", "where", "why", "does", "is", "are", "the", "and", "for", "with",
];
const KEYWORDS_PER_QUESTION: usize = 5;
const MAX_COMBINED_KEYWORDS: usize = 20;
/// Above this many questions one combined query replaces per-question searches
const COMBINE_THRESHOLD: usize = 3;
const REFINE_QUESTIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionSources {
    pub question: String,
    /// Sorted, de-duplicated source labels
    pub sources: Vec<String>,
}

/// Shared context for a batch of questions
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QuestionContext {
    /// Unique chunks in first-seen order
    pub chunks: Vec<SearchHit>,
    pub sources: Vec<QuestionSources>,
    /// Some search in the batch was answered by keyword fallback
    pub keyword_fallback: bool,
}

impl QuestionContext {
    #[must_use]
    pub fn sources_for(&self, question: &str) -> Option<&[String]> {
        self.sources
            .iter()
            .find(|entry| entry.question == question)
            .map(|entry| entry.sources.as_slice())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Retrieves one pooled context for several questions at once.
///
/// Up to three questions are searched individually. Larger batches run a single combined
/// keyword query (attributed to every question) and then refine with the first three
/// questions at half depth.
#[derive(Clone)]
pub struct MultiQuestionRetriever {
    service: SearchService,
}

impl MultiQuestionRetriever {
    #[must_use]
    pub const fn new(service: SearchService) -> Self {
        Self { service }
    }

    pub async fn retrieve(&self, questions: &[String], top_k: usize) -> Result<QuestionContext> {
        let mut questions: Vec<&str> = questions
            .iter()
            .map(|question| question.trim())
            .filter(|question| !question.is_empty())
            .collect();
        let mut seen = HashSet::new();
        questions.retain(|question| seen.insert(*question));
        let mut builder = ContextBuilder::new(&questions);

        if questions.len() > COMBINE_THRESHOLD {
            let keywords = combined_keywords(&questions);
            if keywords.is_empty() {
                log::debug!("No keywords in {} questions; skipping combined query", questions.len());
            } else {
                let outcome = self
                    .service
                    .search_detailed(&keywords.join(" "), top_k.saturating_mul(2))
                    .await?;
                builder.add_to_all(outcome);
            }

            let refine_k = (top_k / 2).max(1);
            for (position, question) in questions.iter().take(REFINE_QUESTIONS).enumerate() {
                let outcome = self.service.search_detailed(question, refine_k).await?;
                builder.add(position, outcome);
            }
        } else {
            for (position, question) in questions.iter().enumerate() {
                let outcome = self.service.search_detailed(question, top_k).await?;
                builder.add(position, outcome);
            }
        }

        let context = builder.finish();
        log::debug!(
            "Retrieved {} unique chunks for {} questions",
            context.chunks.len(),
            context.sources.len()
        );
        Ok(context)
    }
}

/// First five keywords of each question, capped at twenty overall.
///
/// Keywords are lowercased words longer than three characters that are not stop words.
#[must_use]
pub fn combined_keywords(questions: &[&str]) -> Vec<String> {
    questions
        .iter()
        .flat_map(|question| {
            tokenize(question)
                .filter(|word| word.chars().count() > 3 && !STOP_WORDS.contains(&word.as_str()))
                .take(KEYWORDS_PER_QUESTION)
                .collect::<Vec<_>>()
        })
        .take(MAX_COMBINED_KEYWORDS)
        .collect()
}

struct ContextBuilder {
    questions: Vec<String>,
    sources: Vec<BTreeSet<String>>,
    chunks: Vec<SearchHit>,
    seen: HashSet<String>,
    keyword_fallback: bool,
}

impl ContextBuilder {
    fn new(questions: &[&str]) -> Self {
        Self {
            questions: questions.iter().map(ToString::to_string).collect(),
            sources: vec![BTreeSet::new(); questions.len()],
            chunks: Vec::new(),
            seen: HashSet::new(),
            keyword_fallback: false,
        }
    }

    fn add(&mut self, position: usize, outcome: SearchOutcome) {
        let labels: Vec<String> = outcome.hits.iter().map(|hit| hit.source_label.clone()).collect();
        if let Some(sources) = self.sources.get_mut(position) {
            sources.extend(labels);
        }
        self.absorb(outcome);
    }

    fn add_to_all(&mut self, outcome: SearchOutcome) {
        for sources in &mut self.sources {
            sources.extend(outcome.hits.iter().map(|hit| hit.source_label.clone()));
        }
        self.absorb(outcome);
    }

    fn absorb(&mut self, outcome: SearchOutcome) {
        self.keyword_fallback |= outcome.mode == RetrievalMode::KeywordFallback;
        for hit in outcome.hits {
            if self.seen.insert(hit.id.clone()) {
                self.chunks.push(hit);
            }
        }
    }

    fn finish(self) -> QuestionContext {
        QuestionContext {
            chunks: self.chunks,
            sources: self
                .questions
                .into_iter()
                .zip(self.sources)
                .map(|(question, sources)| QuestionSources {
                    question,
                    sources: sources.into_iter().collect(),
                })
                .collect(),
            keyword_fallback: self.keyword_fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keywords_skip_short_and_stop_words() {
        let keywords = combined_keywords(&["What does the program offer for youth?"]);
        assert_eq!(keywords, vec!["program", "offer", "youth"]);
    }

    #[test]
    fn keywords_capped_per_question_and_overall() {
        let long = "alpha bravo charlie delta echo foxtrot golf";
        assert_eq!(
            combined_keywords(&[long]),
            vec!["alpha", "bravo", "charlie", "delta", "echo"]
        );

        let batch = [long; 5];
        assert_eq!(combined_keywords(&batch).len(), 20);
    }
}
