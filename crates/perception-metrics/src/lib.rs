//! Metric derivation for the perception engine.
//!
//! Pure, synchronous computation: given the inputs collected for one entity
//! (raw observations, aggregate rows, and whichever auxiliary datasets have
//! completed), produce a [`MetricsSnapshot`]. Apart from reading normalizer
//! overrides at startup, nothing here performs I/O.
//!
//! - [`resolution`] decides per metric family whether aggregate rows or raw
//!   observations are the source.
//! - [`aggregator`] assembles the snapshot.
//! - [`trend`] computes current-vs-previous period deltas.
//! - [`score`] computes the composite perception score.
//! - [`normalizer`] and [`rankings`] clean competitor names and citation
//!   domains into sorted rankings.

pub mod aggregator;
pub mod input;
pub mod normalizer;
pub mod rankings;
pub mod resolution;
pub mod score;
pub mod snapshot;
pub mod trend;

pub use aggregator::{compute_snapshot, Computation, SnapshotInputs};
pub use input::Input;
pub use normalizer::Normalizer;
pub use rankings::{citation_ranking, competitor_ranking, CitationRank, CompetitorRank};
pub use resolution::{AggregatePolicy, MetricSource};
pub use score::{PerceptionScore, ScoreLabel};
pub use snapshot::{
    CitationTotals, MetricsSnapshot, RelevanceMetric, SentimentLabel, SentimentMetric,
    VisibilityMetric,
};
pub use trend::{Trend, TrendDirection, Trends};

#[cfg(test)]
mod test_support;
