//! The backend collaborator interface.

use async_trait::async_trait;
use perception_core::{
    AggregateRow, CitationSourceRow, CompetitorSourceRow, EntityId, Observation, RelevanceEntry,
    SentimentTag,
};

use serde::Serialize;

use crate::error::StoreError;

/// Datasets the engine reads, used for logging and failure bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Observations,
    ExtendedObservations,
    Aggregates,
    Tags,
    Relevance,
    CompetitorSource,
    CitationSource,
}

impl Dataset {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Dataset::Observations => "observations",
            Dataset::ExtendedObservations => "extended_observations",
            Dataset::Aggregates => "aggregates",
            Dataset::Tags => "tags",
            Dataset::Relevance => "relevance",
            Dataset::CompetitorSource => "competitor_source",
            Dataset::CitationSource => "citation_source",
        }
    }
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only access to collected observations and their derived datasets.
///
/// Paged listings are zero-indexed and ordered by collection time,
/// newest first. Optional datasets return an empty `Vec` when the backend
/// has nothing for the entity.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn list_observations(
        &self,
        entity_id: EntityId,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Observation>, StoreError>;

    /// Same shape as [`DataStore::list_observations`], restricted to
    /// extended ("pro") prompt types.
    async fn list_extended_observations(
        &self,
        entity_id: EntityId,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Observation>, StoreError>;

    async fn list_aggregate_rows(&self, entity_id: EntityId)
        -> Result<Vec<AggregateRow>, StoreError>;

    async fn list_tags(&self, entity_id: EntityId) -> Result<Vec<SentimentTag>, StoreError>;

    async fn list_relevance_entries(
        &self,
        domains: &[String],
    ) -> Result<Vec<RelevanceEntry>, StoreError>;

    async fn list_competitor_ranking_source(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<CompetitorSourceRow>, StoreError>;

    async fn list_citation_ranking_source(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<CitationSourceRow>, StoreError>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}
