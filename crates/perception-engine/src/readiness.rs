//! Per-entity readiness state machine.
//!
//! ```text
//! Idle -> Loading -> PartiallyReady -> Ready
//!   \________\____________\____________\___> Error
//! ```
//!
//! `Ready` requires settled observations, settled aggregates, and every
//! auxiliary dataset a fallback depends on. Within one generation the state
//! only moves forward; a new generation starts over with [`ReadinessTracker::begin`].

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessState {
    Idle,
    Loading,
    PartiallyReady,
    Ready,
    Error,
}

/// Which inputs have settled for the current generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub observations: bool,
    pub aggregates: bool,
    /// Auxiliary datasets needed by a falling-back metric family.
    pub fallbacks: bool,
}

#[derive(Debug, Clone)]
pub struct ReadinessTracker {
    state: ReadinessState,
}

impl Default for ReadinessTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ReadinessState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> ReadinessState {
        self.state
    }

    /// Starts a new generation. A cached snapshot being revalidated counts
    /// as partially ready.
    pub fn begin(&mut self, serving_cache: bool) -> ReadinessState {
        self.state = if serving_cache {
            ReadinessState::PartiallyReady
        } else {
            ReadinessState::Loading
        };
        self.state
    }

    pub fn observe(&mut self, progress: Progress) -> ReadinessState {
        if matches!(self.state, ReadinessState::Idle | ReadinessState::Error) {
            return self.state;
        }
        let next = match progress {
            Progress {
                observations: true,
                aggregates: true,
                fallbacks: true,
            } => ReadinessState::Ready,
            Progress {
                observations: true,
                aggregates: true,
                fallbacks: false,
            } => ReadinessState::PartiallyReady,
            _ => ReadinessState::Loading,
        };
        self.state = self.state.max(next);
        self.state
    }

    pub fn fail(&mut self) -> ReadinessState {
        self.state = ReadinessState::Error;
        self.state
    }
}
