//! Per-entity snapshot cache with a fixed TTL.
//!
//! Entries are keyed by entity id and only ever returned for that id.
//! Expired entries are evicted when they are read.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use perception_core::{CitationSourceRow, CompetitorSourceRow, EntityId, Observation};
use perception_metrics::MetricsSnapshot;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub entity_id: EntityId,
    pub observations: Arc<Vec<Observation>>,
    pub snapshot: MetricsSnapshot,
    pub competitor_source: Arc<Vec<CompetitorSourceRow>>,
    pub citation_source: Arc<Vec<CitationSourceRow>>,
    /// When the snapshot was derived; the TTL counts from here.
    pub derived_at: Instant,
}

#[derive(Debug)]
pub struct SnapshotCache {
    ttl: Duration,
    entries: HashMap<EntityId, CacheEntry>,
}

impl SnapshotCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the entry for `entity_id` if it is younger than the TTL.
    pub fn get(&mut self, entity_id: EntityId) -> Option<&CacheEntry> {
        let expired = self
            .entries
            .get(&entity_id)
            .is_some_and(|entry| entry.derived_at.elapsed() >= self.ttl);
        if expired {
            tracing::debug!(entity_id = %entity_id, "cache entry expired");
            self.entries.remove(&entity_id);
            return None;
        }
        self.entries.get(&entity_id)
    }

    pub fn insert(&mut self, entry: CacheEntry) {
        self.entries.insert(entry.entity_id, entry);
    }

    /// Returns `true` if an entry was removed.
    pub fn invalidate(&mut self, entity_id: EntityId) -> bool {
        self.entries.remove(&entity_id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of live entries; expired entries are evicted first.
    pub fn len(&mut self) -> usize {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| entry.derived_at.elapsed() < ttl);
        self.entries.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }
}
