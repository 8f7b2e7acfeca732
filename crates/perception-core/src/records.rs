//! Backend-maintained summaries and auxiliary datasets.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityId;

/// Precomputed per-period summary for one entity.
///
/// Absence of rows means "not yet computed". A row whose supporting count is
/// zero carries no information for that metric family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub entity_id: EntityId,
    /// First day of the time bucket (e.g. month start).
    pub period_start: NaiveDate,
    #[serde(default)]
    pub total_themes: u64,
    #[serde(default)]
    pub positive_themes: u64,
    #[serde(default)]
    pub negative_themes: u64,
    #[serde(default)]
    pub neutral_themes: u64,
    #[serde(default)]
    pub total_citations: u64,
    #[serde(default)]
    pub valid_citations: u64,
    /// Precomputed relevance score on a 0–100 scale.
    #[serde(default)]
    pub relevance_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagSentiment {
    Positive,
    Neutral,
    Negative,
}

/// A thematic sentiment tag attached to one observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentTag {
    pub observation_id: Uuid,
    pub sentiment: TagSentiment,
}

/// Cached relevance assessment for a cited domain, score in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceEntry {
    pub domain: String,
    pub score: f64,
}

/// Precomputed competitor mention count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorSourceRow {
    pub name: String,
    pub count: u64,
}

/// Precomputed citation domain count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationSourceRow {
    pub domain: String,
    pub count: u64,
}
