//! In-process [`DataStore`] backed by per-entity fixtures.
//!
//! Backs the engine, server and CLI tests. Supports
//! per-entity latency (to exercise overlapping fetches) and injected
//! failures per dataset (to exercise retry and error propagation).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use perception_core::{
    AggregateRow, CitationSourceRow, CompetitorSourceRow, EntityId, Observation, RelevanceEntry,
    SentimentTag,
};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::store::{DataStore, Dataset};

/// Everything the backend holds for one entity.
#[derive(Debug, Clone, Default)]
pub struct EntityFixture {
    /// Newest first, as the backend would return them.
    pub observations: Vec<Observation>,
    pub extended: Vec<Observation>,
    pub aggregates: Vec<AggregateRow>,
    pub tags: Vec<SentimentTag>,
    pub competitor_source: Vec<CompetitorSourceRow>,
    pub citation_source: Vec<CitationSourceRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Retriable outage.
    Transient,
    AuthExpired,
    PermissionDenied,
}

#[derive(Debug, Default)]
struct MemoryState {
    fixtures: HashMap<EntityId, EntityFixture>,
    relevance: HashMap<String, f64>,
    latency: HashMap<EntityId, Duration>,
    dataset_latency: HashMap<Dataset, Duration>,
    failures: HashMap<(Option<EntityId>, Dataset), (InjectedFailure, u32)>,
    calls: HashMap<Dataset, u32>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the fixture for `entity_id`.
    pub async fn put_entity(&self, entity_id: EntityId, fixture: EntityFixture) {
        self.state.lock().await.fixtures.insert(entity_id, fixture);
    }

    pub async fn put_relevance(&self, domain: &str, score: f64) {
        self.state
            .lock()
            .await
            .relevance
            .insert(domain.to_lowercase(), score);
    }

    /// Every page and dataset read for `entity_id` sleeps this long first.
    pub async fn set_latency(&self, entity_id: EntityId, latency: Duration) {
        self.state.lock().await.latency.insert(entity_id, latency);
    }

    /// Every read of `dataset` sleeps this long, on top of entity latency.
    pub async fn set_dataset_latency(&self, dataset: Dataset, latency: Duration) {
        self.state
            .lock()
            .await
            .dataset_latency
            .insert(dataset, latency);
    }

    /// The next `times` reads of `dataset` fail with `failure`.
    ///
    /// `entity_id = None` applies to every entity (and to relevance reads,
    /// which are not entity-scoped).
    pub async fn inject_failure(
        &self,
        entity_id: Option<EntityId>,
        dataset: Dataset,
        failure: InjectedFailure,
        times: u32,
    ) {
        self.state
            .lock()
            .await
            .failures
            .insert((entity_id, dataset), (failure, times));
    }

    /// Number of reads issued against `dataset` so far.
    pub async fn call_count(&self, dataset: Dataset) -> u32 {
        self.state
            .lock()
            .await
            .calls
            .get(&dataset)
            .copied()
            .unwrap_or(0)
    }

    /// Records the call, applies latency, and consumes any injected failure.
    async fn enter(&self, entity_id: Option<EntityId>, dataset: Dataset) -> Result<(), StoreError> {
        let (latency, failure) = {
            let mut state = self.state.lock().await;
            *state.calls.entry(dataset).or_insert(0) += 1;
            let latency = entity_id
                .and_then(|id| state.latency.get(&id).copied())
                .unwrap_or_default()
                + state
                    .dataset_latency
                    .get(&dataset)
                    .copied()
                    .unwrap_or_default();
            let failure = take_failure(&mut state.failures, entity_id, dataset)
                .or_else(|| take_failure(&mut state.failures, None, dataset));
            (latency, failure)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match failure {
            None => Ok(()),
            Some(InjectedFailure::Transient) => Err(StoreError::FetchFailed {
                context: dataset.as_str().to_owned(),
                reason: "injected outage".to_owned(),
            }),
            Some(InjectedFailure::AuthExpired) => Err(StoreError::AuthExpired),
            Some(InjectedFailure::PermissionDenied) => Err(StoreError::PermissionDenied {
                resource: entity_id.map_or_else(
                    || dataset.as_str().to_owned(),
                    |id| format!("entity {id}"),
                ),
            }),
        }
    }

    async fn with_fixture<T>(
        &self,
        entity_id: EntityId,
        read: impl FnOnce(&EntityFixture) -> T,
    ) -> Option<T> {
        let state = self.state.lock().await;
        state.fixtures.get(&entity_id).map(read)
    }
}

fn take_failure(
    failures: &mut HashMap<(Option<EntityId>, Dataset), (InjectedFailure, u32)>,
    entity_id: Option<EntityId>,
    dataset: Dataset,
) -> Option<InjectedFailure> {
    let key = (entity_id, dataset);
    let (failure, remaining) = failures.get_mut(&key)?;
    let failure = *failure;
    *remaining = remaining.saturating_sub(1);
    if *remaining == 0 {
        failures.remove(&key);
    }
    Some(failure)
}

fn page_slice(rows: &[Observation], page: u32, page_size: u32) -> Vec<Observation> {
    let start = (page as usize).saturating_mul(page_size as usize);
    let end = start.saturating_add(page_size as usize).min(rows.len());
    rows.get(start..end).map(<[Observation]>::to_vec).unwrap_or_default()
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn list_observations(
        &self,
        entity_id: EntityId,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Observation>, StoreError> {
        self.enter(Some(entity_id), Dataset::Observations).await?;
        Ok(self
            .with_fixture(entity_id, |f| page_slice(&f.observations, page, page_size))
            .await
            .unwrap_or_default())
    }

    async fn list_extended_observations(
        &self,
        entity_id: EntityId,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Observation>, StoreError> {
        self.enter(Some(entity_id), Dataset::ExtendedObservations)
            .await?;
        Ok(self
            .with_fixture(entity_id, |f| page_slice(&f.extended, page, page_size))
            .await
            .unwrap_or_default())
    }

    async fn list_aggregate_rows(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<AggregateRow>, StoreError> {
        self.enter(Some(entity_id), Dataset::Aggregates).await?;
        Ok(self
            .with_fixture(entity_id, |f| f.aggregates.clone())
            .await
            .unwrap_or_default())
    }

    async fn list_tags(&self, entity_id: EntityId) -> Result<Vec<SentimentTag>, StoreError> {
        self.enter(Some(entity_id), Dataset::Tags).await?;
        Ok(self
            .with_fixture(entity_id, |f| f.tags.clone())
            .await
            .unwrap_or_default())
    }

    async fn list_relevance_entries(
        &self,
        domains: &[String],
    ) -> Result<Vec<RelevanceEntry>, StoreError> {
        self.enter(None, Dataset::Relevance).await?;
        let state = self.state.lock().await;
        Ok(domains
            .iter()
            .filter_map(|d| {
                state.relevance.get(&d.to_lowercase()).map(|score| RelevanceEntry {
                    domain: d.clone(),
                    score: *score,
                })
            })
            .collect())
    }

    async fn list_competitor_ranking_source(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<CompetitorSourceRow>, StoreError> {
        self.enter(Some(entity_id), Dataset::CompetitorSource)
            .await?;
        Ok(self
            .with_fixture(entity_id, |f| f.competitor_source.clone())
            .await
            .unwrap_or_default())
    }

    async fn list_citation_ranking_source(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<CitationSourceRow>, StoreError> {
        self.enter(Some(entity_id), Dataset::CitationSource).await?;
        Ok(self
            .with_fixture(entity_id, |f| f.citation_source.clone())
            .await
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
