//! Shared domain types and configuration for the perception metrics engine.
//!
//! Everything here is plain data: observations collected for an entity,
//! backend-maintained aggregate rows, auxiliary datasets, and the
//! environment-driven engine configuration.

pub mod app_config;
pub mod config;
pub mod entity;
pub mod error;
pub mod normalizer_config;
pub mod observation;
pub mod records;

pub use app_config::{EngineConfig, Environment};
pub use config::{load_engine_config, load_engine_config_from_env};
pub use entity::{Entity, EntityId};
pub use error::ConfigError;
pub use normalizer_config::{
    load_normalizer_overrides, parse_normalizer_overrides, NormalizerOverrides,
};
pub use observation::{CitationEntry, Observation, PromptMeta};
pub use records::{
    AggregateRow, CitationSourceRow, CompetitorSourceRow, RelevanceEntry, SentimentTag,
    TagSentiment,
};
