use serde::{Deserialize, Serialize};
use std::fmt;

/// Category tier of a knowledge-base document.
///
/// Variants are declared lowest to highest so the derived ordering matches the weight table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    /// Contact details, people and addresses
    Contact,
    /// Anything no rule matched
    Uncategorized,
    /// Previous grant applications and worked examples
    Examples,
    /// Mission, programs and narrative descriptions
    Qualitative,
    /// Impact numbers and statistics
    Quantitative,
}

impl PriorityTier {
    pub const ALL: [Self; 5] = [
        Self::Quantitative,
        Self::Qualitative,
        Self::Examples,
        Self::Uncategorized,
        Self::Contact,
    ];

    /// Numeric weight used by the ranker's priority boost
    #[must_use]
    pub const fn weight(self) -> f32 {
        match self {
            Self::Quantitative => 4.0,
            Self::Qualitative => 3.0,
            Self::Examples => 2.0,
            Self::Uncategorized => 1.5,
            Self::Contact => 1.0,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quantitative => "quantitative",
            Self::Qualitative => "qualitative",
            Self::Examples => "examples",
            Self::Uncategorized => "uncategorized",
            Self::Contact => "contact",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a path fragment to a tier. Matching is case-insensitive substring search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub contains: String,
    pub tier: PriorityTier,
}

impl CategoryRule {
    pub fn new(contains: impl Into<String>, tier: PriorityTier) -> Self {
        Self {
            contains: contains.into(),
            tier,
        }
    }

    fn matches(&self, lowered_path: &str) -> bool {
        lowered_path.contains(&self.contains.to_lowercase())
    }
}

/// Ordered rule list; the first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryRules(Vec<CategoryRule>);

impl Default for CategoryRules {
    fn default() -> Self {
        Self(vec![
            // Fundraising history is kept out of the top tier.
            CategoryRule::new("donations_summary", PriorityTier::Examples),
            CategoryRule::new("quantitative", PriorityTier::Quantitative),
            CategoryRule::new("qualitative", PriorityTier::Qualitative),
            CategoryRule::new("grant_example", PriorityTier::Examples),
            CategoryRule::new("contact", PriorityTier::Contact),
        ])
    }
}

impl CategoryRules {
    #[must_use]
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        Self(rules)
    }

    /// Resolve the tier for a document path relative to the knowledge-base root
    #[must_use]
    pub fn resolve(&self, path: &str) -> PriorityTier {
        let lowered = path.to_lowercase();
        self.0
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map_or(PriorityTier::Uncategorized, |rule| rule.tier)
    }

    #[must_use]
    pub fn rules(&self) -> &[CategoryRule] {
        &self.0
    }
}
