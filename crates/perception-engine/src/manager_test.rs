use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use perception_core::{
    AggregateRow, CitationEntry, CitationSourceRow, Observation, PromptMeta, SentimentTag,
    TagSentiment,
};
use perception_metrics::MetricSource;
use perception_store::{
    Dataset, EntityFixture, FetcherConfig, InjectedFailure, MemoryStore, RetryPolicy,
};
use uuid::Uuid;

use super::*;

const A: Uuid = Uuid::from_u128(0xA);
const B: Uuid = Uuid::from_u128(0xB);
const C: Uuid = Uuid::from_u128(0xC);

fn entity(id: Uuid) -> Entity {
    let name = match id.as_u128() {
        0xA => "Acme",
        0xB => "Globex",
        _ => "Initech",
    };
    Entity::new(id, name)
}

fn observation(entity_id: Uuid, n: u128, mentioned: bool, domains: &[&str]) -> Observation {
    Observation {
        id: Uuid::from_u128((entity_id.as_u128() << 32) + n),
        entity_id,
        prompt_id: Uuid::from_u128(1_000 + n),
        model: "gpt-4o".to_owned(),
        collected_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        mentioned,
        citations: domains.iter().map(|d| CitationEntry::from_raw(d)).collect(),
        competitors: Some("Hooli, Acme, Globex".to_owned()),
        prompt: PromptMeta::default(),
    }
}

fn aggregate(entity_id: Uuid) -> AggregateRow {
    AggregateRow {
        entity_id,
        period_start: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        total_themes: 10,
        positive_themes: 7,
        negative_themes: 1,
        neutral_themes: 2,
        total_citations: 10,
        valid_citations: 8,
        relevance_score: Some(80.0),
    }
}

/// `count` observations, half of them mentioning the entity, with a
/// complete aggregate so nothing needs a fallback.
fn aggregated_fixture(entity_id: Uuid, count: u128) -> EntityFixture {
    EntityFixture {
        observations: (1..=count)
            .map(|n| observation(entity_id, n, n % 2 == 0, &["forbes.com"]))
            .collect(),
        aggregates: vec![aggregate(entity_id)],
        ..EntityFixture::default()
    }
}

/// Raw-only fixture: sentiment and relevance have to be derived.
fn raw_fixture(entity_id: Uuid) -> EntityFixture {
    let observations: Vec<_> = (1..=4)
        .map(|n| observation(entity_id, n, true, &["forbes.com"]))
        .collect();
    let tags = observations
        .iter()
        .map(|o| SentimentTag {
            observation_id: o.id,
            sentiment: TagSentiment::Positive,
        })
        .collect();
    EntityFixture {
        observations,
        tags,
        ..EntityFixture::default()
    }
}

async fn setup(config: ManagerConfig) -> (Arc<MemoryStore>, EntityContextManager) {
    let store = Arc::new(MemoryStore::new());
    store.put_entity(A, aggregated_fixture(A, 3)).await;
    store.put_entity(B, aggregated_fixture(B, 5)).await;
    store.put_entity(C, aggregated_fixture(C, 7)).await;
    store.put_relevance("forbes.com", 0.9).await;

    let fetcher = Fetcher::new(
        store.clone(),
        FetcherConfig {
            page_size: 100,
            max_pages: 10,
            retry: RetryPolicy {
                max_retries: 1,
                backoff_base_ms: 0,
            },
        },
    );
    let manager = EntityContextManager::new(fetcher, Normalizer::default(), config);
    (store, manager)
}

async fn wait_for(
    manager: &EntityContextManager,
    predicate: impl Fn(&EngineView) -> bool,
) -> EngineView {
    let mut rx = manager.subscribe();
    let wait = async {
        loop {
            {
                let view = rx.borrow_and_update();
                if predicate(&view) {
                    return view.clone();
                }
            }
            rx.changed().await.expect("manager dropped");
        }
    };
    tokio::time::timeout(Duration::from_secs(120), wait)
        .await
        .expect("view never matched")
}

async fn ready_for(manager: &EntityContextManager, id: Uuid) -> EngineView {
    wait_for(manager, |v| {
        v.is_ready() && v.entity.as_ref().is_some_and(|e| e.id == id)
    })
    .await
}

fn snapshot_of(view: &EngineView) -> &MetricsSnapshot {
    view.snapshot.snapshot().expect("view carries a snapshot")
}

#[tokio::test(start_paused = true)]
async fn switch_waits_for_debounce_then_becomes_ready() {
    let (_store, manager) = setup(ManagerConfig::default()).await;
    assert_eq!(manager.get_snapshot(), SnapshotView::Idle);

    manager.set_active_entity(entity(A)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(manager.view().generation, 0);

    let view = ready_for(&manager, A).await;
    let snapshot = snapshot_of(&view);
    assert_eq!(view.generation, 1);
    assert!(!view.from_cache);
    assert_eq!(snapshot.entity_id, A);
    assert_eq!(snapshot.observation_count, 3);
    assert_eq!(snapshot.sentiment.source, MetricSource::Aggregate);
    assert!(manager.is_ready());
}

#[tokio::test(start_paused = true)]
async fn rapid_switches_only_fetch_the_last_entity() {
    let (store, manager) = setup(ManagerConfig::default()).await;

    manager.set_active_entity(entity(A)).await;
    manager.set_active_entity(entity(B)).await;
    manager.set_active_entity(entity(C)).await;

    let view = ready_for(&manager, C).await;
    assert_eq!(snapshot_of(&view).observation_count, 7);
    assert_eq!(view.generation, 1);
    assert_eq!(store.call_count(Dataset::Aggregates).await, 1);
}

#[tokio::test(start_paused = true)]
async fn reselecting_the_active_entity_is_a_no_op() {
    let (store, manager) = setup(ManagerConfig::default()).await;
    manager.set_active_entity(entity(A)).await;
    ready_for(&manager, A).await;

    manager.set_active_entity(entity(A)).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(manager.view().generation, 1);
    assert_eq!(store.call_count(Dataset::Aggregates).await, 1);
}

#[tokio::test(start_paused = true)]
async fn late_results_for_a_previous_entity_are_dropped() {
    let (store, manager) = setup(ManagerConfig::default()).await;
    store.set_latency(A, Duration::from_secs(5)).await;

    manager.set_active_entity(entity(A)).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    manager.set_active_entity(entity(B)).await;

    let view = wait_for(&manager, |v| {
        v.rankings_ready() && v.entity.as_ref().is_some_and(|e| e.id == B)
    })
    .await;
    assert_eq!(snapshot_of(&view).entity_id, B);

    // Let A's slow fetches land.
    tokio::time::sleep(Duration::from_secs(10)).await;
    let after = manager.view();
    assert_eq!(after, view);
    assert_eq!(snapshot_of(&after).observation_count, 5);
    // Only B ever completed, so only B is cached.
    assert_eq!(manager.cache_len().await, 1);
    assert!(!manager.invalidate(A).await);
}

#[tokio::test(start_paused = true)]
async fn cached_snapshot_is_served_while_revalidating() {
    let (store, manager) = setup(ManagerConfig::default()).await;
    manager.set_active_entity(entity(A)).await;
    let first = ready_for(&manager, A).await;
    manager.set_active_entity(entity(B)).await;
    ready_for(&manager, B).await;

    store.set_latency(A, Duration::from_secs(5)).await;
    manager.set_active_entity(entity(A)).await;
    let revalidating = wait_for(&manager, |v| {
        v.entity.as_ref().is_some_and(|e| e.id == A)
    })
    .await;
    assert!(revalidating.from_cache);
    assert_eq!(revalidating.readiness, ReadinessState::PartiallyReady);
    assert_eq!(
        snapshot_of(&revalidating).fingerprint(),
        snapshot_of(&first).fingerprint()
    );
    assert!(!manager.is_ready());

    let fresh = ready_for(&manager, A).await;
    assert!(!fresh.from_cache);
    assert_eq!(
        snapshot_of(&fresh).fingerprint(),
        snapshot_of(&first).fingerprint()
    );
}

#[tokio::test(start_paused = true)]
async fn expired_cache_entry_is_not_served() {
    let (store, manager) = setup(ManagerConfig::default()).await;
    manager.set_active_entity(entity(A)).await;
    ready_for(&manager, A).await;
    manager.set_active_entity(entity(B)).await;
    ready_for(&manager, B).await;

    tokio::time::advance(Duration::from_secs(301)).await;
    store.set_latency(A, Duration::from_secs(5)).await;
    manager.set_active_entity(entity(A)).await;
    let view = wait_for(&manager, |v| {
        v.entity.as_ref().is_some_and(|e| e.id == A)
    })
    .await;
    assert!(!view.from_cache);
    assert_eq!(view.readiness, ReadinessState::Loading);
    assert_eq!(view.snapshot, SnapshotView::Loading);
}

#[tokio::test(start_paused = true)]
async fn refresh_bypasses_cache_and_is_idempotent() {
    let (store, manager) = setup(ManagerConfig::default()).await;
    manager.set_active_entity(entity(A)).await;
    let first = ready_for(&manager, A).await;
    let calls = store.call_count(Dataset::Aggregates).await;

    manager.refresh().await.unwrap();
    assert_eq!(manager.get_snapshot(), SnapshotView::Loading);
    let second = wait_for(&manager, |v| v.generation == 2 && v.is_ready()).await;

    manager.refresh().await.unwrap();
    let third = wait_for(&manager, |v| v.generation == 3 && v.is_ready()).await;

    let fingerprint = snapshot_of(&first).fingerprint();
    assert_eq!(snapshot_of(&second).fingerprint(), fingerprint);
    assert_eq!(snapshot_of(&third).fingerprint(), fingerprint);
    assert_eq!(store.call_count(Dataset::Aggregates).await, calls + 2);
}

#[tokio::test(start_paused = true)]
async fn refresh_without_active_entity_is_rejected() {
    let (_store, manager) = setup(ManagerConfig::default()).await;
    assert!(matches!(
        manager.refresh().await,
        Err(EngineError::NoActiveEntity)
    ));
    assert!(matches!(
        manager.competitor_ranking().await,
        Err(EngineError::NoActiveEntity)
    ));
}

#[tokio::test(start_paused = true)]
async fn expired_session_publishes_an_error() {
    let (store, manager) = setup(ManagerConfig::default()).await;
    store
        .inject_failure(Some(A), Dataset::Observations, InjectedFailure::AuthExpired, 1)
        .await;

    manager.set_active_entity(entity(A)).await;
    let view = wait_for(&manager, |v| v.readiness == ReadinessState::Error).await;
    let SnapshotView::Error(failure) = &view.snapshot else {
        panic!("expected an error view, got {:?}", view.snapshot);
    };
    assert_eq!(failure.kind, FailureKind::AuthExpired);
    assert_eq!(failure.dataset, Dataset::Observations);
    assert!(!manager.is_ready());
}

#[tokio::test(start_paused = true)]
async fn permission_denied_on_one_entity_does_not_block_another() {
    let (store, manager) = setup(ManagerConfig::default()).await;
    store
        .inject_failure(
            Some(A),
            Dataset::Aggregates,
            InjectedFailure::PermissionDenied,
            1,
        )
        .await;

    manager.set_active_entity(entity(A)).await;
    let failed = wait_for(&manager, |v| v.readiness == ReadinessState::Error).await;
    assert!(matches!(
        failed.snapshot,
        SnapshotView::Error(EngineFailure {
            kind: FailureKind::PermissionDenied,
            ..
        })
    ));

    manager.set_active_entity(entity(B)).await;
    let view = ready_for(&manager, B).await;
    assert_eq!(snapshot_of(&view).entity_id, B);
}

#[tokio::test(start_paused = true)]
async fn pending_tags_hold_readiness_at_partial() {
    let (store, manager) = setup(ManagerConfig::default()).await;
    store.put_entity(A, raw_fixture(A)).await;
    store
        .set_dataset_latency(Dataset::Tags, Duration::from_secs(5))
        .await;

    manager.set_active_entity(entity(A)).await;
    let partial = wait_for(&manager, |v| {
        v.readiness == ReadinessState::PartiallyReady
    })
    .await;
    assert_eq!(partial.snapshot, SnapshotView::Loading);

    let view = ready_for(&manager, A).await;
    let snapshot = snapshot_of(&view);
    assert_eq!(snapshot.sentiment.source, MetricSource::Derived);
    assert!((snapshot.sentiment.ratio - 1.0).abs() < f64::EPSILON);
    assert_eq!(snapshot.relevance.source, MetricSource::Derived);
}

#[tokio::test(start_paused = true)]
async fn accept_partial_publishes_pending_metrics() {
    let config = ManagerConfig {
        accept_partial: true,
        ..ManagerConfig::default()
    };
    let (store, manager) = setup(config).await;
    store.put_entity(A, raw_fixture(A)).await;
    store
        .set_dataset_latency(Dataset::Tags, Duration::from_secs(5))
        .await;

    manager.set_active_entity(entity(A)).await;
    let partial = wait_for(&manager, |v| {
        v.readiness == ReadinessState::PartiallyReady && v.snapshot.snapshot().is_some()
    })
    .await;
    let snapshot = snapshot_of(&partial);
    assert!(snapshot.is_partial());
    assert_eq!(snapshot.sentiment.source, MetricSource::Pending);
    assert!(!partial.from_cache);

    ready_for(&manager, A).await;
}

#[tokio::test(start_paused = true)]
async fn unavailable_tags_degrade_to_neutral_default() {
    let (store, manager) = setup(ManagerConfig::default()).await;
    store.put_entity(A, raw_fixture(A)).await;
    store
        .inject_failure(None, Dataset::Tags, InjectedFailure::Transient, 10)
        .await;

    manager.set_active_entity(entity(A)).await;
    let view = ready_for(&manager, A).await;
    let sentiment = &snapshot_of(&view).sentiment;
    assert!(!sentiment.has_data);
    assert_eq!(sentiment.source, MetricSource::Default);
    assert!((sentiment.ratio - 0.5).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn rankings_prefer_precomputed_sources() {
    let (store, manager) = setup(ManagerConfig::default()).await;
    let mut fixture = aggregated_fixture(A, 3);
    fixture.citation_source = vec![
        CitationSourceRow {
            domain: "wired.com".to_owned(),
            count: 2,
        },
        CitationSourceRow {
            domain: "forbes.com".to_owned(),
            count: 9,
        },
    ];
    store.put_entity(A, fixture).await;

    manager.set_active_entity(entity(A)).await;
    wait_for(&manager, EngineView::rankings_ready).await;

    let competitors = manager.competitor_ranking().await.unwrap();
    let names: Vec<_> = competitors.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Hooli", "Globex"]);
    assert_eq!(competitors[0].count, 3);

    let citations = manager.citation_ranking().await.unwrap();
    assert_eq!(citations[0].domain, "forbes.com");
    assert_eq!(citations[0].count, 9);
    assert_eq!(citations.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn rankings_are_final_only_once_their_sources_settle() {
    let (store, manager) = setup(ManagerConfig::default()).await;
    let mut fixture = aggregated_fixture(A, 3);
    fixture.citation_source = vec![CitationSourceRow {
        domain: "wired.com".to_owned(),
        count: 9,
    }];
    store.put_entity(A, fixture).await;
    store
        .set_dataset_latency(Dataset::CitationSource, Duration::from_secs(5))
        .await;

    manager.set_active_entity(entity(A)).await;
    let ready = ready_for(&manager, A).await;
    assert!(!ready.rankings_settled);
    assert!(!ready.rankings_ready());

    let settled = wait_for(&manager, EngineView::rankings_ready).await;
    assert_eq!(settled.snapshot, ready.snapshot);
    let citations = manager.citation_ranking().await.unwrap();
    assert_eq!(citations.len(), 1);
    assert_eq!(citations[0].domain, "wired.com");
    assert_eq!(citations[0].count, 9);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(manager.citation_ranking().await.unwrap(), citations);
}

#[tokio::test(start_paused = true)]
async fn ready_snapshot_waits_for_tags_behind_the_sentiment_trend() {
    let (store, manager) = setup(ManagerConfig::default()).await;
    let mut fixture = aggregated_fixture(A, 4);
    let day_two = Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap();
    for obs in &mut fixture.observations[2..] {
        obs.collected_at = day_two;
    }
    fixture.tags = fixture
        .observations
        .iter()
        .map(|o| SentimentTag {
            observation_id: o.id,
            sentiment: if o.collected_at == day_two {
                TagSentiment::Positive
            } else {
                TagSentiment::Negative
            },
        })
        .collect();
    store.put_entity(A, fixture).await;
    store
        .set_dataset_latency(Dataset::Tags, Duration::from_secs(5))
        .await;

    manager.set_active_entity(entity(A)).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(manager.view().readiness, ReadinessState::PartiallyReady);
    assert!(!manager.is_ready());

    let at_ready = ready_for(&manager, A).await;
    let snapshot = snapshot_of(&at_ready);
    assert_eq!(snapshot.sentiment.source, MetricSource::Aggregate);
    assert_eq!(snapshot.trends.sentiment.previous, Some(0.0));
    assert!((snapshot.trends.sentiment.current - 1.0).abs() < f64::EPSILON);

    tokio::time::sleep(Duration::from_secs(10)).await;
    let later = manager.view();
    assert_eq!(later.snapshot, at_ready.snapshot);
    assert_eq!(later.generation, at_ready.generation);
}

#[tokio::test(start_paused = true)]
async fn pending_switch_survives_a_refresh_of_the_current_entity() {
    let (store, manager) = setup(ManagerConfig::default()).await;
    manager.set_active_entity(entity(A)).await;
    ready_for(&manager, A).await;

    store.set_latency(A, Duration::from_secs(1)).await;
    manager.set_active_entity(entity(B)).await;
    manager.refresh().await.unwrap();
    assert_eq!(manager.view().generation, 2);
    assert_eq!(manager.active_entity().await.map(|e| e.id), Some(A));

    let view = wait_for(&manager, |v| {
        v.rankings_ready() && v.entity.as_ref().is_some_and(|e| e.id == B)
    })
    .await;
    assert_eq!(view.generation, 3);
    assert_eq!(snapshot_of(&view).observation_count, 5);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(manager.view(), view);
    // The refresh dropped A's entry and its results were superseded.
    assert!(!manager.invalidate(A).await);
}

#[tokio::test(start_paused = true)]
async fn late_results_never_leak_into_a_cached_snapshot() {
    let (store, manager) = setup(ManagerConfig::default()).await;
    manager.set_active_entity(entity(A)).await;
    ready_for(&manager, A).await;
    manager.set_active_entity(entity(B)).await;
    let b_ready = ready_for(&manager, B).await;

    store.set_latency(A, Duration::from_secs(5)).await;
    store.set_latency(B, Duration::from_secs(20)).await;
    manager.set_active_entity(entity(A)).await;
    wait_for(&manager, |v| v.entity.as_ref().is_some_and(|e| e.id == A)).await;
    manager.set_active_entity(entity(B)).await;
    let serving = wait_for(&manager, |v| {
        v.from_cache && v.entity.as_ref().is_some_and(|e| e.id == B)
    })
    .await;
    assert_eq!(serving.snapshot, b_ready.snapshot);

    // A's fetches finish while B's cached snapshot is on screen.
    tokio::time::sleep(Duration::from_secs(6)).await;
    let during = manager.view();
    assert_eq!(during, serving);
    let snapshot = snapshot_of(&during);
    assert_eq!(snapshot.entity_id, B);
    assert_eq!(snapshot.observation_count, 5);

    let fresh = ready_for(&manager, B).await;
    assert!(!fresh.from_cache);
    assert_eq!(snapshot_of(&fresh).entity_id, B);
    assert_eq!(snapshot_of(&fresh).observation_count, 5);
}

#[tokio::test(start_paused = true)]
async fn cache_can_be_invalidated_and_cleared() {
    let (_store, manager) = setup(ManagerConfig::default()).await;
    manager.set_active_entity(entity(A)).await;
    ready_for(&manager, A).await;
    manager.set_active_entity(entity(B)).await;
    ready_for(&manager, B).await;
    assert_eq!(manager.cache_len().await, 2);

    assert!(manager.invalidate(A).await);
    assert_eq!(manager.cache_len().await, 1);
    manager.clear_cache().await;
    assert_eq!(manager.cache_len().await, 0);
}
