//! Retrying, paginating front end over any [`DataStore`].

use std::sync::Arc;

use perception_core::{
    AggregateRow, CitationSourceRow, CompetitorSourceRow, EngineConfig, EntityId, Observation,
    RelevanceEntry, SentimentTag,
};

use crate::error::StoreError;
use crate::paginator::{fetch_all_pages, merge_extended};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::store::{DataStore, Dataset};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetcherConfig {
    pub page_size: u32,
    pub max_pages: usize,
    pub retry: RetryPolicy,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            max_pages: 500,
            retry: RetryPolicy::default(),
        }
    }
}

impl FetcherConfig {
    #[must_use]
    pub fn from_engine_config(config: &EngineConfig) -> Self {
        Self {
            page_size: config.page_size,
            max_pages: config.max_pages,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                backoff_base_ms: config.retry_backoff_base_ms,
            },
        }
    }
}

/// Wraps every store call in the retry policy; paginated listings are
/// fetched to completion.
#[derive(Clone)]
pub struct Fetcher {
    store: Arc<dyn DataStore>,
    config: FetcherConfig,
}

impl Fetcher {
    #[must_use]
    pub fn new(store: Arc<dyn DataStore>, config: FetcherConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Returns the complete observation set for an entity.
    ///
    /// The primary listing and the extended subset are paginated
    /// concurrently and merged with [`merge_extended`]. If either side
    /// fails, nothing is returned.
    ///
    /// # Errors
    ///
    /// Returns the first error from either listing once retries are exhausted.
    pub async fn fetch_observations(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<Observation>, StoreError> {
        let (primary, extended) = futures::try_join!(
            self.paginate(entity_id, Dataset::Observations),
            self.paginate(entity_id, Dataset::ExtendedObservations),
        )?;

        let primary_len = primary.len();
        let extended_len = extended.len();
        let merged = merge_extended(primary, extended);
        tracing::debug!(
            entity_id = %entity_id,
            store = self.store.name(),
            primary = primary_len,
            extended = extended_len,
            merged = merged.len(),
            "fetched observations"
        );
        Ok(merged)
    }

    async fn paginate(
        &self,
        entity_id: EntityId,
        dataset: Dataset,
    ) -> Result<Vec<Observation>, StoreError> {
        let FetcherConfig {
            page_size,
            max_pages,
            retry,
        } = self.config;
        let store = &self.store;
        let context = format!("{dataset} for entity {entity_id}");
        let context = context.as_str();

        fetch_all_pages(context, page_size, max_pages, move |page| async move {
            retry_with_backoff(retry, context, move || async move {
                if dataset == Dataset::ExtendedObservations {
                    store
                        .list_extended_observations(entity_id, page, page_size)
                        .await
                } else {
                    store.list_observations(entity_id, page, page_size).await
                }
            })
            .await
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the store error once retries are exhausted.
    pub async fn fetch_aggregates(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<AggregateRow>, StoreError> {
        retry_with_backoff(self.config.retry, Dataset::Aggregates.as_str(), move || {
            self.store.list_aggregate_rows(entity_id)
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the store error once retries are exhausted.
    pub async fn fetch_tags(&self, entity_id: EntityId) -> Result<Vec<SentimentTag>, StoreError> {
        retry_with_backoff(self.config.retry, Dataset::Tags.as_str(), move || {
            self.store.list_tags(entity_id)
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the store error once retries are exhausted.
    pub async fn fetch_relevance(
        &self,
        domains: &[String],
    ) -> Result<Vec<RelevanceEntry>, StoreError> {
        if domains.is_empty() {
            return Ok(Vec::new());
        }
        retry_with_backoff(self.config.retry, Dataset::Relevance.as_str(), move || {
            self.store.list_relevance_entries(domains)
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the store error once retries are exhausted.
    pub async fn fetch_competitor_source(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<CompetitorSourceRow>, StoreError> {
        retry_with_backoff(self.config.retry, Dataset::CompetitorSource.as_str(), move || {
            self.store.list_competitor_ranking_source(entity_id)
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the store error once retries are exhausted.
    pub async fn fetch_citation_source(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<CitationSourceRow>, StoreError> {
        retry_with_backoff(self.config.retry, Dataset::CitationSource.as_str(), move || {
            self.store.list_citation_ranking_source(entity_id)
        })
        .await
    }
}
