//! Entity context management for the perception metrics engine.
//!
//! [`EntityContextManager`] owns the active entity. Switching is debounced;
//! each switch starts a new fetch generation, and results tagged with an
//! older generation are dropped before they touch state. Every input that
//! arrives is folded in by the [`reducer`] and the snapshot is recomputed
//! from scratch, so the published view always reflects the latest state of
//! all inputs. Completed snapshots are cached per entity with a TTL and
//! served immediately on the next switch while a background refresh runs.

pub mod cache;
pub mod error;
pub mod manager;
pub mod readiness;
pub mod reducer;
pub mod view;

pub use cache::{CacheEntry, SnapshotCache};
pub use error::EngineError;
pub use manager::{EntityContextManager, ManagerConfig};
pub use readiness::{Progress, ReadinessState, ReadinessTracker};
pub use view::{EngineFailure, EngineView, FailureKind, SnapshotView};
