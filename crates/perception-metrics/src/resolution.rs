//! Source selection per metric family.
//!
//! Aggregate rows are preferred when they carry a non-zero supporting count.
//! Multiple rows are combined as a weighted average: each bucket's rate is
//! weighted by its own supporting count. When no row qualifies, the metric is
//! derived from raw observations plus the matching auxiliary dataset, but
//! only after that dataset's fetch has settled. Until then the family is
//! [`MetricSource::Pending`], never the neutral default.

use std::collections::{BTreeSet, HashMap, HashSet};

use perception_core::{AggregateRow, Observation, RelevanceEntry, SentimentTag, TagSentiment};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::input::Input;

/// A citation counts as valid when its domain scores at least this.
pub const VALID_RELEVANCE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricSource {
    /// Backend aggregate rows.
    Aggregate,
    /// Raw observations plus auxiliary data.
    Derived,
    /// Neither source had data; the neutral default applies.
    Default,
    /// Falling back, but the auxiliary fetch has not settled.
    Pending,
}

/// When to distrust an aggregate that does carry data.
///
/// An aggregate whose supporting count is below `min_coverage_ratio` times
/// the raw supporting count is considered stale and the derived value wins.
/// The check only runs once the auxiliary dataset has settled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatePolicy {
    pub min_coverage_ratio: f64,
}

impl Default for AggregatePolicy {
    fn default() -> Self {
        Self {
            min_coverage_ratio: 0.5,
        }
    }
}

impl AggregatePolicy {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn is_stale(&self, aggregate_support: u64, raw_support: u64) -> bool {
        raw_support > 0 && (aggregate_support as f64) < self.min_coverage_ratio * raw_support as f64
    }
}

/// Outcome of resolving one metric family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved<T> {
    /// `None` for [`MetricSource::Default`] and [`MetricSource::Pending`].
    pub value: Option<T>,
    pub source: MetricSource,
}

impl<T> Resolved<T> {
    fn found(value: T, source: MetricSource) -> Self {
        Self {
            value: Some(value),
            source,
        }
    }

    fn empty(source: MetricSource) -> Self {
        Self {
            value: None,
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SentimentCounts {
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
    pub total: u64,
}

impl SentimentCounts {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| self.positive as f64 / self.total as f64)
    }
}

/// Relevance on a 0–100 scale with its supporting count of valid citations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceValue {
    pub score: f64,
    pub support: u64,
}

/// Sums sentiment counts across buckets with `total_themes > 0`.
///
/// Summing counts is the weighted average of per-bucket rates.
#[must_use]
pub fn sentiment_from_aggregates(rows: &[AggregateRow]) -> Option<SentimentCounts> {
    let mut counts = SentimentCounts::default();
    for row in rows.iter().filter(|r| r.total_themes > 0) {
        counts.positive += row.positive_themes;
        counts.neutral += row.neutral_themes;
        counts.negative += row.negative_themes;
        counts.total += row.total_themes;
    }
    (counts.total > 0).then_some(counts)
}

/// Counts tags attached to the given observations.
///
/// Tags for observations outside the current set are ignored.
#[must_use]
pub fn sentiment_from_tags(
    observations: &[Observation],
    tags: &[SentimentTag],
) -> Option<SentimentCounts> {
    let ids: HashSet<Uuid> = observations.iter().map(|o| o.id).collect();
    let mut counts = SentimentCounts::default();
    for tag in tags.iter().filter(|t| ids.contains(&t.observation_id)) {
        match tag.sentiment {
            TagSentiment::Positive => counts.positive += 1,
            TagSentiment::Neutral => counts.neutral += 1,
            TagSentiment::Negative => counts.negative += 1,
        }
        counts.total += 1;
    }
    (counts.total > 0).then_some(counts)
}

#[must_use]
pub fn resolve_sentiment(
    aggregates: &[AggregateRow],
    observations: &[Observation],
    tags: Input<&[SentimentTag]>,
    policy: &AggregatePolicy,
) -> Resolved<SentimentCounts> {
    let aggregate = sentiment_from_aggregates(aggregates);
    let derived = tags
        .ready()
        .and_then(|tags| sentiment_from_tags(observations, tags));

    match (aggregate, derived) {
        (Some(agg), Some(raw)) if policy.is_stale(agg.total, raw.total) => {
            tracing::debug!(
                aggregate_support = agg.total,
                raw_support = raw.total,
                "sentiment aggregate below coverage, using derived counts"
            );
            Resolved::found(raw, MetricSource::Derived)
        }
        (Some(agg), _) => Resolved::found(agg, MetricSource::Aggregate),
        (None, Some(raw)) => Resolved::found(raw, MetricSource::Derived),
        (None, None) if !tags.is_settled() => Resolved::empty(MetricSource::Pending),
        (None, None) => Resolved::empty(MetricSource::Default),
    }
}

/// Weighted relevance across buckets with `valid_citations > 0`.
///
/// A bucket without a precomputed score contributes its own validity ratio.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn relevance_from_aggregates(rows: &[AggregateRow]) -> Option<RelevanceValue> {
    let mut weighted = 0.0;
    let mut support = 0u64;
    for row in rows.iter().filter(|r| r.valid_citations > 0) {
        let score = row.relevance_score.unwrap_or_else(|| {
            let total = row.total_citations.max(row.valid_citations);
            row.valid_citations as f64 / total as f64 * 100.0
        });
        weighted += score * row.valid_citations as f64;
        support += row.valid_citations;
    }
    (support > 0).then(|| RelevanceValue {
        score: weighted / support as f64,
        support,
    })
}

/// Share of evaluated citations whose domain meets the validity threshold.
///
/// Domains with no relevance entry are not evaluated and do not count
/// against the ratio.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn relevance_from_entries(
    observations: &[Observation],
    entries: &[RelevanceEntry],
) -> Option<RelevanceValue> {
    let scores: HashMap<String, f64> = entries
        .iter()
        .map(|e| (e.domain.trim().to_lowercase(), e.score))
        .collect();

    let mut evaluated = 0u64;
    let mut valid = 0u64;
    for key in observations
        .iter()
        .flat_map(|o| o.citations.iter())
        .filter_map(perception_core::CitationEntry::domain_key)
    {
        if let Some(score) = scores.get(&key) {
            evaluated += 1;
            if *score >= VALID_RELEVANCE_THRESHOLD {
                valid += 1;
            }
        }
    }

    (evaluated > 0).then(|| RelevanceValue {
        score: valid as f64 / evaluated as f64 * 100.0,
        support: valid,
    })
}

#[must_use]
pub fn resolve_relevance(
    aggregates: &[AggregateRow],
    observations: &[Observation],
    entries: Input<&[RelevanceEntry]>,
    policy: &AggregatePolicy,
) -> Resolved<RelevanceValue> {
    let aggregate = relevance_from_aggregates(aggregates);
    let derived = entries
        .ready()
        .and_then(|entries| relevance_from_entries(observations, entries));

    match (aggregate, derived) {
        (Some(agg), Some(raw)) if policy.is_stale(agg.support, raw.support) => {
            tracing::debug!(
                aggregate_support = agg.support,
                raw_support = raw.support,
                "relevance aggregate below coverage, using derived score"
            );
            Resolved::found(raw, MetricSource::Derived)
        }
        (Some(agg), _) => Resolved::found(agg, MetricSource::Aggregate),
        (None, Some(raw)) => Resolved::found(raw, MetricSource::Derived),
        (None, None) if !entries.is_settled() => Resolved::empty(MetricSource::Pending),
        (None, None) => Resolved::empty(MetricSource::Default),
    }
}

/// Distinct cited domain keys, sorted, for the relevance lookup.
#[must_use]
pub fn cited_domains(observations: &[Observation]) -> Vec<String> {
    observations
        .iter()
        .flat_map(|o| o.citations.iter())
        .filter_map(perception_core::CitationEntry::domain_key)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
#[path = "resolution_test.rs"]
mod tests;
