//! Current-period vs previous-period trend deltas.
//!
//! The current period is the most recent UTC collection date present in the
//! observation set; the previous period is every earlier date. The previous
//! period is reduced to a daily average over its `N` distinct days before
//! comparing.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use perception_core::{Observation, SentimentTag, TagSentiment};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SENTIMENT_DEAD_ZONE: f64 = 0.05;
pub const VISIBILITY_DEAD_ZONE: f64 = 1.0;
pub const CITATION_DEAD_ZONE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Neutral,
}

impl TrendDirection {
    /// `Up`/`Down` only when `|change|` strictly exceeds `dead_zone`.
    #[must_use]
    pub fn classify(change: f64, dead_zone: f64) -> Self {
        if change > dead_zone {
            Self::Up
        } else if change < -dead_zone {
            Self::Down
        } else {
            Self::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub current: f64,
    /// Daily average over the previous period; `None` without a baseline.
    pub previous: Option<f64>,
    pub change: f64,
    pub direction: TrendDirection,
}

impl Trend {
    #[must_use]
    pub fn compare(current: Option<f64>, previous: Option<f64>, dead_zone: f64) -> Self {
        match (current, previous) {
            (Some(current), Some(previous)) => {
                let change = current - previous;
                Self {
                    current,
                    previous: Some(previous),
                    change,
                    direction: TrendDirection::classify(change, dead_zone),
                }
            }
            (current, previous) => Self {
                current: current.unwrap_or(0.0),
                previous,
                change: 0.0,
                direction: TrendDirection::Neutral,
            },
        }
    }
}

#[derive(Debug, Default)]
struct DayTotals {
    observations: u64,
    mentioned: u64,
    citations: u64,
    positive_tags: u64,
    tags: u64,
}

impl DayTotals {
    #[allow(clippy::cast_precision_loss)]
    fn visibility(&self) -> Option<f64> {
        (self.observations > 0).then(|| self.mentioned as f64 / self.observations as f64 * 100.0)
    }

    #[allow(clippy::cast_precision_loss)]
    fn sentiment(&self) -> Option<f64> {
        (self.tags > 0).then(|| self.positive_tags as f64 / self.tags as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trends {
    pub sentiment: Trend,
    pub visibility: Trend,
    pub citations: Trend,
}

/// Sentiment, visibility and citation trends.
///
/// Sentiment is computed per day from tags; without settled tags the
/// sentiment trend has no baseline and is neutral.
#[must_use]
pub fn compute_trends(observations: &[Observation], tags: Option<&[SentimentTag]>) -> Trends {
    let days = daily_totals(observations, tags);

    let Some((current_day, current)) = days.iter().next_back() else {
        return Trends {
            sentiment: Trend::compare(None, None, SENTIMENT_DEAD_ZONE),
            visibility: Trend::compare(None, None, VISIBILITY_DEAD_ZONE),
            citations: Trend::compare(None, None, CITATION_DEAD_ZONE),
        };
    };
    let previous: Vec<&DayTotals> = days
        .iter()
        .filter(|(day, _)| *day < current_day)
        .map(|(_, totals)| totals)
        .collect();

    let sentiment = Trend::compare(
        current.sentiment(),
        mean(previous.iter().filter_map(|d| d.sentiment())),
        SENTIMENT_DEAD_ZONE,
    );
    let visibility = Trend::compare(
        current.visibility(),
        mean(previous.iter().filter_map(|d| d.visibility())),
        VISIBILITY_DEAD_ZONE,
    );
    #[allow(clippy::cast_precision_loss)]
    let citations = Trend::compare(
        Some(current.citations as f64),
        (!previous.is_empty()).then(|| {
            previous.iter().map(|d| d.citations).sum::<u64>() as f64 / previous.len() as f64
        }),
        CITATION_DEAD_ZONE,
    );

    Trends {
        sentiment,
        visibility,
        citations,
    }
}

fn daily_totals(
    observations: &[Observation],
    tags: Option<&[SentimentTag]>,
) -> BTreeMap<NaiveDate, DayTotals> {
    let mut tags_by_observation: HashMap<Uuid, Vec<TagSentiment>> = HashMap::new();
    for tag in tags.unwrap_or_default() {
        tags_by_observation
            .entry(tag.observation_id)
            .or_default()
            .push(tag.sentiment);
    }

    let mut days: BTreeMap<NaiveDate, DayTotals> = BTreeMap::new();
    for obs in observations {
        let day = days.entry(obs.collection_date()).or_default();
        day.observations += 1;
        day.mentioned += u64::from(obs.mentioned);
        day.citations += obs.citations.len() as u64;
        if let Some(sentiments) = tags_by_observation.get(&obs.id) {
            day.tags += sentiments.len() as u64;
            day.positive_tags += sentiments
                .iter()
                .filter(|s| **s == TagSentiment::Positive)
                .count() as u64;
        }
    }
    days
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / f64::from(count))
}
