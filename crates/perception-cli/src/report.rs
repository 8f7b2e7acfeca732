//! Runs the engine once for a single entity and waits for it to settle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use perception_core::{EngineConfig, Entity};
use perception_engine::{EngineView, EntityContextManager, ManagerConfig, SnapshotView};
use perception_metrics::{CitationRank, CompetitorRank, MetricsSnapshot, Normalizer};
use perception_store::{DataStore, Fetcher, FetcherConfig, HttpStore};

use crate::EntityArgs;

/// Builds a manager that activates immediately: a one-shot run has nothing
/// to debounce.
pub(crate) fn build_manager(
    config: &EngineConfig,
    store: Arc<dyn DataStore>,
) -> anyhow::Result<EntityContextManager> {
    let fetcher = Fetcher::new(store, FetcherConfig::from_engine_config(config));
    let normalizer = Normalizer::from_engine_config(config)?;
    Ok(EntityContextManager::new(
        fetcher,
        normalizer,
        ManagerConfig {
            debounce: Duration::ZERO,
            ..ManagerConfig::from_engine_config(config)
        },
    ))
}

/// What a run has to wait for before printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settled {
    Snapshot,
    /// The snapshot plus both precomputed ranking sources.
    Rankings,
}

impl Settled {
    fn reached(self, view: &EngineView) -> bool {
        match self {
            Self::Snapshot => view.is_ready(),
            Self::Rankings => view.rankings_ready(),
        }
    }
}

/// Activates `entity` and waits until `until` is reached or loading failed.
pub(crate) async fn settle(
    manager: &EntityContextManager,
    entity: Entity,
    until: Settled,
    timeout: Duration,
) -> anyhow::Result<EngineView> {
    let mut rx = manager.subscribe();
    let entity_id = entity.id;
    manager.set_active_entity(entity).await;

    let view = tokio::time::timeout(
        timeout,
        rx.wait_for(|v| {
            v.entity.as_ref().is_some_and(|e| e.id == entity_id)
                && (until.reached(v) || matches!(v.snapshot, SnapshotView::Error(_)))
        }),
    )
    .await
    .with_context(|| format!("entity {entity_id} did not settle within {timeout:?}"))?
    .context("engine stopped publishing")?
    .clone();

    if let SnapshotView::Error(failure) = &view.snapshot {
        anyhow::bail!("{} ({:?})", failure.message, failure.kind);
    }
    Ok(view)
}

async fn run(
    config: &EngineConfig,
    args: &EntityArgs,
    until: Settled,
) -> anyhow::Result<EntityContextManager> {
    let store = HttpStore::new(
        &config.store_url,
        config.store_token.as_deref(),
        config.request_timeout_secs,
    )?;
    let manager = build_manager(config, Arc::new(store))?;
    tracing::info!(
        entity_id = %args.entity_id,
        store_url = %config.store_url,
        "loading entity"
    );
    // Every dataset may need its full retry budget.
    let timeout = Duration::from_secs(config.request_timeout_secs)
        .saturating_mul(config.max_retries.saturating_add(1))
        .saturating_mul(2);
    settle(
        &manager,
        Entity::new(args.entity_id, args.entity_name.trim()),
        until,
        timeout,
    )
    .await?;
    Ok(manager)
}

pub(crate) async fn snapshot(
    config: &EngineConfig,
    args: &EntityArgs,
) -> anyhow::Result<MetricsSnapshot> {
    let manager = run(config, args, Settled::Snapshot).await?;
    manager
        .get_snapshot()
        .snapshot()
        .cloned()
        .context("engine reported ready without a snapshot")
}

pub(crate) async fn competitors(
    config: &EngineConfig,
    args: &EntityArgs,
) -> anyhow::Result<Vec<CompetitorRank>> {
    let manager = run(config, args, Settled::Rankings).await?;
    Ok(manager.competitor_ranking().await?)
}

pub(crate) async fn citations(
    config: &EngineConfig,
    args: &EntityArgs,
) -> anyhow::Result<Vec<CitationRank>> {
    let manager = run(config, args, Settled::Rankings).await?;
    Ok(manager.citation_ranking().await?)
}
