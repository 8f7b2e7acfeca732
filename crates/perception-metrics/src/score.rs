//! Composite perception score.

use serde::{Deserialize, Serialize};

const SENTIMENT_WEIGHT: f64 = 0.5;
const VISIBILITY_WEIGHT: f64 = 0.3;
const RELEVANCE_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreLabel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ScoreLabel {
    #[must_use]
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => Self::Excellent,
            65..=79 => Self::Good,
            50..=64 => Self::Fair,
            _ => Self::Poor,
        }
    }
}

/// Composite score plus the three 0–100 sub-scores it is built from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerceptionScore {
    pub composite: u8,
    pub label: ScoreLabel,
    pub sentiment_score: f64,
    pub visibility_score: f64,
    pub relevance_score: f64,
}

impl PerceptionScore {
    /// `sentiment_ratio` is on a 0–1 scale; `visibility` and `relevance` are
    /// percentages. Each sub-score is clamped to `[0, 100]`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn compute(sentiment_ratio: f64, visibility: f64, relevance: f64) -> Self {
        let sentiment_score = clamp_percent(sentiment_ratio * 100.0);
        let visibility_score = clamp_percent(visibility);
        let relevance_score = clamp_percent(relevance);

        let weighted = sentiment_score * SENTIMENT_WEIGHT
            + visibility_score * VISIBILITY_WEIGHT
            + relevance_score * RELEVANCE_WEIGHT;
        // Weights sum to 1 and inputs are clamped, so this is within 0..=100.
        let composite = weighted.round().clamp(0.0, 100.0) as u8;

        Self {
            composite,
            label: ScoreLabel::from_score(composite),
            sentiment_score,
            visibility_score,
            relevance_score,
        }
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
