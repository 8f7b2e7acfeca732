//! What the engine publishes to callers.

use perception_core::Entity;
use perception_metrics::MetricsSnapshot;
use perception_store::{Dataset, StoreError};
use serde::Serialize;

use crate::error::EngineError;
use crate::readiness::ReadinessState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transient failure that survived every retry.
    FetchFailed,
    /// Credentials expired; the caller must re-authenticate.
    AuthExpired,
    /// The entity (or dataset) is not readable by this caller.
    PermissionDenied,
    /// Malformed response or a pagination runaway.
    InvalidResponse,
}

impl FailureKind {
    #[must_use]
    pub fn of(error: &StoreError) -> Self {
        match error {
            StoreError::AuthExpired => Self::AuthExpired,
            StoreError::PermissionDenied { .. } => Self::PermissionDenied,
            StoreError::Http(_) | StoreError::FetchFailed { .. } => Self::FetchFailed,
            StoreError::UnexpectedStatus { .. }
            | StoreError::Deserialize { .. }
            | StoreError::PaginationLimit { .. }
            | StoreError::InvalidBaseUrl { .. } => Self::InvalidResponse,
        }
    }
}

/// A fatal fetch failure for the active entity, in publishable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineFailure {
    pub kind: FailureKind,
    pub dataset: Dataset,
    pub message: String,
}

impl EngineFailure {
    #[must_use]
    pub fn from_store(dataset: Dataset, error: StoreError) -> Self {
        let kind = FailureKind::of(&error);
        let error = EngineError::Fetch {
            dataset,
            source: error,
        };
        Self {
            kind,
            dataset,
            message: error.to_string(),
        }
    }
}

/// Result of `get_snapshot`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum SnapshotView {
    /// No entity has been activated yet.
    Idle,
    Loading,
    Snapshot(Box<MetricsSnapshot>),
    Error(EngineFailure),
}

impl SnapshotView {
    #[must_use]
    pub fn snapshot(&self) -> Option<&MetricsSnapshot> {
        match self {
            Self::Snapshot(snapshot) => Some(snapshot.as_ref()),
            Self::Idle | Self::Loading | Self::Error(_) => None,
        }
    }
}

/// Everything published on each state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineView {
    pub entity: Option<Entity>,
    pub generation: u64,
    pub readiness: ReadinessState,
    pub snapshot: SnapshotView,
    /// The snapshot is a cached one being revalidated.
    pub from_cache: bool,
    /// Both precomputed ranking sources have settled for this generation.
    /// Until then the ranking getters count the observations instead.
    pub rankings_settled: bool,
}

impl EngineView {
    #[must_use]
    pub fn idle() -> Self {
        Self {
            entity: None,
            generation: 0,
            readiness: ReadinessState::Idle,
            snapshot: SnapshotView::Idle,
            from_cache: false,
            rankings_settled: false,
        }
    }

    /// The canonical "metrics calculating" flag is the negation of this.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.readiness == ReadinessState::Ready
    }

    /// Ready, and the rankings will not change for this generation.
    #[must_use]
    pub fn rankings_ready(&self) -> bool {
        self.is_ready() && self.rankings_settled
    }
}
