//! Builders shared by the unit tests.

use chrono::{TimeZone, Utc};
use perception_core::{
    AggregateRow, CitationEntry, Observation, PromptMeta, SentimentTag, TagSentiment,
};
use uuid::Uuid;

pub(crate) const ENTITY: Uuid = Uuid::from_u128(0xE);

pub(crate) fn observation(n: u128, day: u32, mentioned: bool, domains: &[&str]) -> Observation {
    Observation {
        id: Uuid::from_u128(n),
        entity_id: ENTITY,
        prompt_id: Uuid::from_u128(1_000 + n),
        model: "gpt-4o".to_owned(),
        collected_at: Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap(),
        mentioned,
        citations: domains.iter().map(|d| CitationEntry::from_raw(d)).collect(),
        competitors: None,
        prompt: PromptMeta::default(),
    }
}

pub(crate) fn with_competitors(mut obs: Observation, raw: &str) -> Observation {
    obs.competitors = Some(raw.to_owned());
    obs
}

pub(crate) fn tag(n: u128, sentiment: TagSentiment) -> SentimentTag {
    SentimentTag {
        observation_id: Uuid::from_u128(n),
        sentiment,
    }
}

pub(crate) fn aggregate(total: u64, positive: u64) -> AggregateRow {
    AggregateRow {
        entity_id: ENTITY,
        period_start: chrono::NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        total_themes: total,
        positive_themes: positive,
        negative_themes: total - positive,
        neutral_themes: 0,
        total_citations: 0,
        valid_citations: 0,
        relevance_score: None,
    }
}
