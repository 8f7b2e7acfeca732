//! The derived metrics snapshot.
//!
//! A snapshot carries no timestamps, so two computations over identical
//! inputs serialize to identical bytes and share a [`MetricsSnapshot::fingerprint`].

use perception_core::EntityId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::resolution::MetricSource;
use crate::score::PerceptionScore;
use crate::trend::Trends;

/// Sentiment ratio used when neither source has data.
pub const NEUTRAL_SENTIMENT_RATIO: f64 = 0.5;
/// Relevance score used when neither source has data.
pub const NEUTRAL_RELEVANCE_SCORE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    #[must_use]
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.6 {
            Self::Positive
        } else if ratio < 0.4 {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentMetric {
    /// Positive share on a 0–1 scale.
    pub ratio: f64,
    pub label: SentimentLabel,
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
    pub total: u64,
    /// `false` means "no data", which is not the same as a ratio of zero.
    pub has_data: bool,
    pub source: MetricSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibilityMetric {
    pub percentage: f64,
    pub mentioned: u64,
    pub total: u64,
    pub has_data: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelevanceMetric {
    /// 0–100 scale.
    pub score: f64,
    pub has_data: bool,
    pub source: MetricSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationTotals {
    pub total: u64,
    pub unique_domains: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub entity_id: EntityId,
    pub observation_count: u64,
    pub sentiment: SentimentMetric,
    pub visibility: VisibilityMetric,
    pub relevance: RelevanceMetric,
    pub citations: CitationTotals,
    pub perception: PerceptionScore,
    pub trends: Trends,
}

impl MetricsSnapshot {
    /// Lowercase hex SHA-256 of the snapshot's JSON encoding.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        // Struct fields serialize in declaration order and there are no maps,
        // so the encoding is canonical.
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        format!("{:x}", Sha256::digest(&bytes))
    }

    /// Whether any metric family is still waiting on an auxiliary dataset.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.sentiment.source == MetricSource::Pending
            || self.relevance.source == MetricSource::Pending
    }
}
