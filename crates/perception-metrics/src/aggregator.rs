//! Assembles a [`MetricsSnapshot`] from whichever inputs have arrived.
//!
//! [`compute_snapshot`] is deterministic and side-effect free; the engine
//! calls it after every input update and publishes the result.

use std::collections::HashSet;

use perception_core::{AggregateRow, EntityId, Observation, RelevanceEntry, SentimentTag};

use crate::input::Input;
use crate::resolution::{self, AggregatePolicy, MetricSource};
use crate::score::PerceptionScore;
use crate::snapshot::{
    CitationTotals, MetricsSnapshot, RelevanceMetric, SentimentLabel, SentimentMetric,
    VisibilityMetric, NEUTRAL_RELEVANCE_SCORE, NEUTRAL_SENTIMENT_RATIO,
};
use crate::trend::compute_trends;

/// Borrowed view of one entity's inputs.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotInputs<'a> {
    pub entity_id: EntityId,
    pub observations: &'a [Observation],
    pub aggregates: &'a [AggregateRow],
    pub tags: Input<&'a [SentimentTag]>,
    pub relevance: Input<&'a [RelevanceEntry]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Computation {
    pub snapshot: MetricsSnapshot,
    /// The tag dataset has not settled. The sentiment trend always reads
    /// tags, so this holds even when sentiment itself resolves from
    /// aggregates.
    pub awaiting_tags: bool,
    /// Relevance fell back and the relevance entries have not settled.
    pub awaiting_relevance: bool,
}

impl Computation {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.awaiting_tags && !self.awaiting_relevance
    }
}

#[must_use]
pub fn compute_snapshot(inputs: &SnapshotInputs<'_>, policy: &AggregatePolicy) -> Computation {
    let observations = inputs.observations;

    let sentiment = sentiment_metric(inputs, policy);
    let relevance = relevance_metric(inputs, policy);
    let visibility = visibility_metric(observations);
    let citations = citation_totals(observations);

    let perception = PerceptionScore::compute(sentiment.ratio, visibility.percentage, relevance.score);
    let trends = compute_trends(observations, inputs.tags.ready().copied());

    Computation {
        awaiting_tags: !inputs.tags.is_settled(),
        awaiting_relevance: relevance.source == MetricSource::Pending,
        snapshot: MetricsSnapshot {
            entity_id: inputs.entity_id,
            observation_count: observations.len() as u64,
            sentiment,
            visibility,
            relevance,
            citations,
            perception,
            trends,
        },
    }
}

fn sentiment_metric(inputs: &SnapshotInputs<'_>, policy: &AggregatePolicy) -> SentimentMetric {
    let resolved = resolution::resolve_sentiment(
        inputs.aggregates,
        inputs.observations,
        inputs.tags,
        policy,
    );
    let counts = resolved.value.unwrap_or_default();
    let ratio = counts.ratio().unwrap_or(NEUTRAL_SENTIMENT_RATIO);
    SentimentMetric {
        ratio,
        label: SentimentLabel::from_ratio(ratio),
        positive: counts.positive,
        neutral: counts.neutral,
        negative: counts.negative,
        total: counts.total,
        has_data: resolved.value.is_some(),
        source: resolved.source,
    }
}

fn relevance_metric(inputs: &SnapshotInputs<'_>, policy: &AggregatePolicy) -> RelevanceMetric {
    let resolved = resolution::resolve_relevance(
        inputs.aggregates,
        inputs.observations,
        inputs.relevance,
        policy,
    );
    RelevanceMetric {
        score: resolved
            .value
            .map_or(NEUTRAL_RELEVANCE_SCORE, |v| v.score),
        has_data: resolved.value.is_some(),
        source: resolved.source,
    }
}

#[allow(clippy::cast_precision_loss)]
fn visibility_metric(observations: &[Observation]) -> VisibilityMetric {
    let total = observations.len() as u64;
    let mentioned = observations.iter().filter(|o| o.mentioned).count() as u64;
    let percentage = if total == 0 {
        0.0
    } else {
        mentioned as f64 / total as f64 * 100.0
    };
    VisibilityMetric {
        percentage,
        mentioned,
        total,
        has_data: total > 0,
    }
}

fn citation_totals(observations: &[Observation]) -> CitationTotals {
    let total = observations.iter().map(|o| o.citations.len() as u64).sum();
    let unique: HashSet<String> = observations
        .iter()
        .flat_map(|o| o.citations.iter())
        .filter_map(perception_core::CitationEntry::domain_key)
        .collect();
    CitationTotals {
        total,
        unique_domains: unique.len() as u64,
    }
}

#[cfg(test)]
mod tests {
    use perception_core::{RelevanceEntry, TagSentiment};

    use super::*;
    use crate::test_support::{aggregate, observation, tag, ENTITY};

    fn inputs<'a>(
        observations: &'a [Observation],
        aggregates: &'a [AggregateRow],
        tags: Input<&'a [SentimentTag]>,
        relevance: Input<&'a [RelevanceEntry]>,
    ) -> SnapshotInputs<'a> {
        SnapshotInputs {
            entity_id: ENTITY,
            observations,
            aggregates,
            tags,
            relevance,
        }
    }

    #[test]
    fn empty_inputs_yield_flagged_neutral_defaults() {
        let computed = compute_snapshot(
            &inputs(&[], &[], Input::Unavailable, Input::Unavailable),
            &AggregatePolicy::default(),
        );
        let snapshot = &computed.snapshot;
        assert!(computed.is_complete());
        assert!(!snapshot.sentiment.has_data);
        assert_eq!(snapshot.sentiment.source, MetricSource::Default);
        assert!((snapshot.sentiment.ratio - 0.5).abs() < f64::EPSILON);
        assert_eq!(snapshot.sentiment.label, SentimentLabel::Neutral);
        assert!(!snapshot.relevance.has_data);
        assert!((snapshot.relevance.score - 50.0).abs() < f64::EPSILON);
        assert!(!snapshot.visibility.has_data);
        assert_eq!(snapshot.perception.composite, 35);
    }

    #[test]
    fn pending_fallback_is_reported_as_awaiting() {
        let observations = vec![observation(1, 1, true, &["a.com"])];
        let computed = compute_snapshot(
            &inputs(&observations, &[], Input::Pending, Input::Pending),
            &AggregatePolicy::default(),
        );
        assert!(computed.awaiting_tags);
        assert!(computed.awaiting_relevance);
        assert!(computed.snapshot.is_partial());
    }

    #[test]
    fn aggregate_sentiment_still_waits_for_tags_for_its_trend() {
        let observations = vec![observation(1, 1, true, &[]), observation(2, 2, true, &[])];
        let tags = vec![tag(1, TagSentiment::Negative), tag(2, TagSentiment::Positive)];
        let rows = [aggregate(10, 8)];

        let pending = compute_snapshot(
            &inputs(&observations, &rows, Input::Pending, Input::Unavailable),
            &AggregatePolicy::default(),
        );
        assert!(pending.awaiting_tags);
        assert!(!pending.is_complete());
        assert_eq!(pending.snapshot.sentiment.source, MetricSource::Aggregate);
        assert_eq!(pending.snapshot.sentiment.label, SentimentLabel::Positive);
        assert_eq!(pending.snapshot.trends.sentiment.previous, None);

        let settled = compute_snapshot(
            &inputs(
                &observations,
                &rows,
                Input::Ready(tags.as_slice()),
                Input::Unavailable,
            ),
            &AggregatePolicy::default(),
        );
        assert!(settled.is_complete());
        assert_eq!(settled.snapshot.sentiment, pending.snapshot.sentiment);
        assert_eq!(settled.snapshot.trends.sentiment.previous, Some(0.0));
        assert_eq!(
            settled.snapshot.trends.sentiment.direction,
            crate::trend::TrendDirection::Up
        );
    }

    #[test]
    fn full_snapshot_from_raw_data() {
        let observations = vec![
            observation(1, 1, true, &["forbes.com", "spam.biz"]),
            observation(2, 1, false, &["forbes.com"]),
            observation(3, 2, true, &["wired.com"]),
            observation(4, 2, true, &[]),
        ];
        let tags = vec![
            tag(1, TagSentiment::Positive),
            tag(2, TagSentiment::Negative),
            tag(3, TagSentiment::Positive),
            tag(4, TagSentiment::Positive),
        ];
        let relevance = vec![
            RelevanceEntry {
                domain: "forbes.com".to_owned(),
                score: 0.8,
            },
            RelevanceEntry {
                domain: "spam.biz".to_owned(),
                score: 0.2,
            },
        ];
        let computed = compute_snapshot(
            &inputs(
                &observations,
                &[],
                Input::Ready(tags.as_slice()),
                Input::Ready(relevance.as_slice()),
            ),
            &AggregatePolicy::default(),
        );
        let s = computed.snapshot;

        assert_eq!(s.observation_count, 4);
        assert!((s.sentiment.ratio - 0.75).abs() < 1e-12);
        assert_eq!(s.sentiment.source, MetricSource::Derived);
        assert!((s.visibility.percentage - 75.0).abs() < 1e-12);
        // forbes twice (valid), spam once (invalid); wired unscored.
        assert!((s.relevance.score - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(s.citations.total, 4);
        assert_eq!(s.citations.unique_domains, 3);
        // 75*0.5 + 75*0.3 + 66.67*0.2 = 37.5 + 22.5 + 13.33 = 73.33
        assert_eq!(s.perception.composite, 73);
        // Day 1 visibility 50%, day 2 100%.
        assert_eq!(s.trends.visibility.previous, Some(50.0));
    }

    #[test]
    fn identical_inputs_share_a_fingerprint() {
        let observations = vec![observation(1, 1, true, &["a.com"])];
        let tags = vec![tag(1, TagSentiment::Positive)];
        let compute = || {
            compute_snapshot(
                &inputs(
                    &observations,
                    &[],
                    Input::Ready(tags.as_slice()),
                    Input::Unavailable,
                ),
                &AggregatePolicy::default(),
            )
            .snapshot
        };
        let first = compute();
        let second = compute();
        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_eq!(first.fingerprint().len(), 64);

        let other = compute_snapshot(
            &inputs(&observations, &[], Input::Unavailable, Input::Unavailable),
            &AggregatePolicy::default(),
        )
        .snapshot;
        assert_ne!(first.fingerprint(), other.fingerprint());
    }
}
