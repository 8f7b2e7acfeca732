//! The entity context manager.
//!
//! All mutable state sits behind one async mutex. Fetch tasks never hold it
//! across a network call: they fetch, then lock, check their generation tag,
//! apply, recompute, and publish.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use perception_core::{
    CitationSourceRow, CompetitorSourceRow, EngineConfig, Entity, EntityId, Observation,
};
use perception_metrics::resolution::cited_domains;
use perception_metrics::{
    citation_ranking, competitor_ranking, compute_snapshot, AggregatePolicy, CitationRank,
    CompetitorRank, Computation, MetricsSnapshot, Normalizer,
};
use perception_store::Fetcher;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::cache::{CacheEntry, SnapshotCache};
use crate::error::EngineError;
use crate::readiness::{Progress, ReadinessState, ReadinessTracker};
use crate::reducer::{self, EntityInputs, InputUpdate};
use crate::view::{EngineFailure, EngineView, FailureKind, SnapshotView};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManagerConfig {
    /// Quiet period after the last switch request before fetching starts.
    pub debounce: Duration,
    pub cache_ttl: Duration,
    /// Publish snapshots whose fallback inputs are still pending.
    pub accept_partial: bool,
    pub policy: AggregatePolicy,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
            cache_ttl: Duration::from_secs(300),
            accept_partial: false,
            policy: AggregatePolicy::default(),
        }
    }
}

impl ManagerConfig {
    #[must_use]
    pub fn from_engine_config(config: &EngineConfig) -> Self {
        Self {
            debounce: Duration::from_millis(config.debounce_ms),
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            accept_partial: config.accept_partial,
            policy: AggregatePolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct Current {
    snapshot: MetricsSnapshot,
    complete: bool,
}

#[derive(Debug)]
struct ManagerState {
    generation: u64,
    active: Option<Entity>,
    pending_switch: Option<JoinHandle<()>>,
    inputs: EntityInputs,
    readiness: ReadinessTracker,
    failure: Option<EngineFailure>,
    current: Option<Current>,
    derived_at: Option<Instant>,
    /// Cache hit being revalidated by the current generation.
    cached: Option<CacheEntry>,
    cache: SnapshotCache,
}

impl ManagerState {
    fn new(cache_ttl: Duration) -> Self {
        Self {
            generation: 0,
            active: None,
            pending_switch: None,
            inputs: EntityInputs::default(),
            readiness: ReadinessTracker::new(),
            failure: None,
            current: None,
            derived_at: None,
            cached: None,
            cache: SnapshotCache::new(cache_ttl),
        }
    }

    /// Resets per-generation state for `entity`.
    fn start_generation(&mut self, entity: Entity, cached: Option<CacheEntry>) {
        self.readiness.begin(cached.is_some());
        self.active = Some(entity);
        self.inputs = EntityInputs::default();
        self.failure = None;
        self.current = None;
        self.derived_at = None;
        self.cached = cached;
    }

    /// Cache entry for the active entity, if its snapshot is complete.
    fn cache_entry(&self) -> Option<CacheEntry> {
        if self.readiness.state() != ReadinessState::Ready {
            return None;
        }
        let entity = self.active.as_ref()?;
        let current = self.current.as_ref().filter(|c| c.complete)?;
        Some(CacheEntry {
            entity_id: entity.id,
            observations: Arc::clone(self.inputs.observations.ready()?),
            snapshot: current.snapshot.clone(),
            competitor_source: self
                .inputs
                .competitor_source
                .ready()
                .cloned()
                .unwrap_or_default(),
            citation_source: self
                .inputs
                .citation_source
                .ready()
                .cloned()
                .unwrap_or_default(),
            derived_at: self.derived_at?,
        })
    }

    fn fail(&mut self, failure: EngineFailure) {
        self.readiness.fail();
        if matches!(
            failure.kind,
            FailureKind::AuthExpired | FailureKind::PermissionDenied
        ) {
            if let Some(entity) = &self.active {
                self.cache.invalidate(entity.id);
            }
        }
        self.inputs = EntityInputs::default();
        self.current = None;
        self.derived_at = None;
        self.cached = None;
        self.failure = Some(failure);
    }

    fn ranking_observations(&self) -> Arc<Vec<Observation>> {
        self.inputs
            .observations
            .ready()
            .cloned()
            .or_else(|| self.cached.as_ref().map(|c| Arc::clone(&c.observations)))
            .unwrap_or_default()
    }

    fn competitor_source(&self) -> Arc<Vec<CompetitorSourceRow>> {
        self.inputs
            .competitor_source
            .ready()
            .cloned()
            .or_else(|| {
                self.cached
                    .as_ref()
                    .map(|c| Arc::clone(&c.competitor_source))
            })
            .unwrap_or_default()
    }

    fn citation_source(&self) -> Arc<Vec<CitationSourceRow>> {
        self.inputs
            .citation_source
            .ready()
            .cloned()
            .or_else(|| self.cached.as_ref().map(|c| Arc::clone(&c.citation_source)))
            .unwrap_or_default()
    }

    fn view(&self, accept_partial: bool) -> EngineView {
        let readiness = self.readiness.state();
        let (snapshot, from_cache) = match readiness {
            ReadinessState::Idle => (SnapshotView::Idle, false),
            ReadinessState::Error => match &self.failure {
                Some(failure) => (SnapshotView::Error(failure.clone()), false),
                None => (SnapshotView::Loading, false),
            },
            ReadinessState::Ready => match &self.current {
                Some(current) => (
                    SnapshotView::Snapshot(Box::new(current.snapshot.clone())),
                    false,
                ),
                None => (SnapshotView::Loading, false),
            },
            ReadinessState::Loading | ReadinessState::PartiallyReady => {
                match (&self.current, &self.cached) {
                    (Some(current), _) if accept_partial => (
                        SnapshotView::Snapshot(Box::new(current.snapshot.clone())),
                        false,
                    ),
                    (_, Some(cached)) => (
                        SnapshotView::Snapshot(Box::new(cached.snapshot.clone())),
                        true,
                    ),
                    _ => (SnapshotView::Loading, false),
                }
            }
        };
        EngineView {
            entity: self.active.clone(),
            generation: self.generation,
            readiness,
            snapshot,
            from_cache,
            rankings_settled: self.inputs.competitor_source.is_settled()
                && self.inputs.citation_source.is_settled(),
        }
    }
}

struct Shared {
    fetcher: Fetcher,
    normalizer: Normalizer,
    config: ManagerConfig,
    state: Mutex<ManagerState>,
    view: watch::Sender<EngineView>,
}

/// Owns the active entity and drives fetch, compute, and publication.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct EntityContextManager {
    shared: Arc<Shared>,
}

impl EntityContextManager {
    #[must_use]
    pub fn new(fetcher: Fetcher, normalizer: Normalizer, config: ManagerConfig) -> Self {
        let (view, _) = watch::channel(EngineView::idle());
        Self {
            shared: Arc::new(Shared {
                fetcher,
                normalizer,
                state: Mutex::new(ManagerState::new(config.cache_ttl)),
                config,
                view,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    /// Requests a switch to `entity`.
    ///
    /// The switch takes effect after the debounce window; a later request
    /// inside the window replaces this one. Requesting the entity that is
    /// already active (and not in error) is a no-op.
    pub async fn set_active_entity(&self, entity: Entity) {
        let mut state = self.shared.state.lock().await;
        if let Some(pending) = state.pending_switch.take() {
            pending.abort();
        }
        let already_active = state.active.as_ref().is_some_and(|a| a.id == entity.id)
            && state.readiness.state() != ReadinessState::Error;
        if already_active {
            tracing::debug!(entity_id = %entity.id, "entity already active");
            return;
        }

        tracing::debug!(entity_id = %entity.id, entity = %entity.name, "entity switch requested");
        let manager = self.clone();
        let debounce = self.shared.config.debounce;
        state.pending_switch = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            manager.activate(entity).await;
        }));
    }

    async fn activate(&self, entity: Entity) {
        let mut state = self.shared.state.lock().await;
        state.pending_switch = None;
        if let Some(entry) = state.cache_entry() {
            state.cache.insert(entry);
        }

        state.generation += 1;
        let generation = state.generation;
        let cached = state.cache.get(entity.id).cloned();
        tracing::info!(
            entity_id = %entity.id,
            entity = %entity.name,
            generation,
            cache_hit = cached.is_some(),
            "activating entity"
        );
        let entity_id = entity.id;
        state.start_generation(entity, cached);
        self.publish(&state);
        drop(state);

        self.spawn_fetches(entity_id, generation);
    }

    /// Discards the active entity's cache entry and refetches everything.
    ///
    /// A switch still inside its debounce window is left alone: it lands
    /// afterwards and supersedes the refresh.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoActiveEntity`] if no entity has been activated.
    pub async fn refresh(&self) -> Result<(), EngineError> {
        let mut state = self.shared.state.lock().await;
        let entity = state.active.clone().ok_or(EngineError::NoActiveEntity)?;
        state.cache.invalidate(entity.id);
        state.generation += 1;
        let generation = state.generation;
        tracing::info!(entity_id = %entity.id, generation, "refreshing entity");
        let entity_id = entity.id;
        state.start_generation(entity, None);
        self.publish(&state);
        drop(state);

        self.spawn_fetches(entity_id, generation);
        Ok(())
    }

    fn spawn_fetches(&self, entity_id: EntityId, generation: u64) {
        let manager = self.clone();
        tokio::spawn(async move {
            let fetcher = &manager.shared.fetcher;
            let result = fetcher.fetch_observations(entity_id).await;
            let domains = result.as_ref().ok().map(|rows| cited_domains(rows));
            manager
                .apply(generation, InputUpdate::Observations(result))
                .await;

            // Relevance lookups are keyed by the domains the observations cite.
            let Some(domains) = domains else { return };
            if !manager.is_current(generation).await {
                return;
            }
            let relevance = fetcher.fetch_relevance(&domains).await;
            manager
                .apply(generation, InputUpdate::Relevance(relevance))
                .await;
        });

        let fetcher = self.shared.fetcher.clone();
        self.spawn_update(generation, async move {
            InputUpdate::Aggregates(fetcher.fetch_aggregates(entity_id).await)
        });
        let fetcher = self.shared.fetcher.clone();
        self.spawn_update(generation, async move {
            InputUpdate::Tags(fetcher.fetch_tags(entity_id).await)
        });
        let fetcher = self.shared.fetcher.clone();
        self.spawn_update(generation, async move {
            InputUpdate::CompetitorSource(fetcher.fetch_competitor_source(entity_id).await)
        });
        let fetcher = self.shared.fetcher.clone();
        self.spawn_update(generation, async move {
            InputUpdate::CitationSource(fetcher.fetch_citation_source(entity_id).await)
        });
    }

    fn spawn_update<F>(&self, generation: u64, fetch: F)
    where
        F: Future<Output = InputUpdate> + Send + 'static,
    {
        let manager = self.clone();
        tokio::spawn(async move {
            let update = fetch.await;
            manager.apply(generation, update).await;
        });
    }

    async fn is_current(&self, generation: u64) -> bool {
        self.shared.state.lock().await.generation == generation
    }

    async fn apply(&self, generation: u64, update: InputUpdate) {
        let dataset = update.dataset();
        let mut state = self.shared.state.lock().await;
        if state.generation != generation {
            tracing::debug!(
                dataset = %dataset,
                generation,
                current = state.generation,
                "dropping result from superseded generation"
            );
            return;
        }
        if state.readiness.state() == ReadinessState::Error {
            return;
        }

        if let Err(failure) = reducer::apply_update(&mut state.inputs, update) {
            tracing::error!(
                entity_id = ?state.active.as_ref().map(|e| e.id),
                dataset = %dataset,
                generation,
                kind = ?failure.kind,
                error = %failure.message,
                "fetch failed for active entity"
            );
            state.fail(failure);
            self.publish(&state);
            return;
        }

        tracing::debug!(dataset = %dataset, generation, "input settled");
        self.recompute(&mut state);
        self.publish(&state);
    }

    fn recompute(&self, state: &mut ManagerState) {
        let Some(entity_id) = state.active.as_ref().map(|e| e.id) else {
            return;
        };
        let computation = state
            .inputs
            .snapshot_inputs(entity_id)
            .map(|inputs| compute_snapshot(&inputs, &self.shared.config.policy));

        let progress = Progress {
            observations: state.inputs.observations.is_settled(),
            aggregates: state.inputs.aggregates.is_settled(),
            fallbacks: computation.as_ref().is_some_and(Computation::is_complete),
        };
        let before = state.readiness.state();
        let readiness = state.readiness.observe(progress);

        if let Some(computation) = computation {
            let complete = computation.is_complete();
            state.current = Some(Current {
                snapshot: computation.snapshot,
                complete,
            });
            if readiness == ReadinessState::Ready {
                state.derived_at = Some(Instant::now());
                state.cached = None;
                if let Some(entry) = state.cache_entry() {
                    state.cache.insert(entry);
                }
            }
        }

        if readiness != before {
            tracing::info!(
                entity_id = %entity_id,
                generation = state.generation,
                readiness = ?readiness,
                "readiness changed"
            );
        }
    }

    fn publish(&self, state: &ManagerState) {
        let view = state.view(self.shared.config.accept_partial);
        self.shared.view.send_if_modified(|published| {
            if *published == view {
                false
            } else {
                *published = view;
                true
            }
        });
    }

    /// Latest published view.
    #[must_use]
    pub fn view(&self) -> EngineView {
        self.shared.view.borrow().clone()
    }

    #[must_use]
    pub fn get_snapshot(&self) -> SnapshotView {
        self.shared.view.borrow().snapshot.clone()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.shared.view.borrow().is_ready()
    }

    /// Receives every published view change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EngineView> {
        self.shared.view.subscribe()
    }

    pub async fn active_entity(&self) -> Option<Entity> {
        self.shared.state.lock().await.active.clone()
    }

    /// Ranked competitors for the active entity.
    ///
    /// Uses the precomputed source when the backend has one, otherwise the
    /// observations loaded so far (or the cached ones being revalidated).
    /// The result is final once [`EngineView::rankings_ready`] holds.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoActiveEntity`] if no entity has been activated.
    pub async fn competitor_ranking(&self) -> Result<Vec<CompetitorRank>, EngineError> {
        let (entity, observations, source) = {
            let state = self.shared.state.lock().await;
            let entity = state.active.clone().ok_or(EngineError::NoActiveEntity)?;
            (
                entity,
                state.ranking_observations(),
                state.competitor_source(),
            )
        };
        Ok(competitor_ranking(
            &self.shared.normalizer,
            &observations,
            &entity.name,
            &source,
        ))
    }

    /// Ranked cited domains for the active entity. Final once
    /// [`EngineView::rankings_ready`] holds.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoActiveEntity`] if no entity has been activated.
    pub async fn citation_ranking(&self) -> Result<Vec<CitationRank>, EngineError> {
        let (observations, source) = {
            let state = self.shared.state.lock().await;
            if state.active.is_none() {
                return Err(EngineError::NoActiveEntity);
            }
            (state.ranking_observations(), state.citation_source())
        };
        Ok(citation_ranking(
            &self.shared.normalizer,
            &observations,
            &source,
        ))
    }

    /// Drops the cached snapshot for `entity_id`. Returns `true` if one existed.
    pub async fn invalidate(&self, entity_id: EntityId) -> bool {
        self.shared.state.lock().await.cache.invalidate(entity_id)
    }

    pub async fn clear_cache(&self) {
        self.shared.state.lock().await.cache.clear();
    }

    pub async fn cache_len(&self) -> usize {
        self.shared.state.lock().await.cache.len()
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
