//! Folds fetch results into the current generation's inputs.
//!
//! Failure classification lives here:
//!
//! - observations: any error is fatal for the entity.
//! - aggregates: terminal errors are fatal; a transient failure that
//!   survived retries is treated as "not yet computed" so metrics fall back.
//! - auxiliary datasets: an expired session is fatal; anything else marks
//!   the dataset unavailable and the dependent metric degrades to its
//!   neutral default.

use std::sync::Arc;

use perception_core::{
    AggregateRow, CitationSourceRow, CompetitorSourceRow, EntityId, Observation, RelevanceEntry,
    SentimentTag,
};
use perception_metrics::{Input, SnapshotInputs};
use perception_store::{Dataset, StoreError};

use crate::error::EngineError;
use crate::view::EngineFailure;

#[derive(Debug, Clone, Default)]
pub struct EntityInputs {
    pub observations: Input<Arc<Vec<Observation>>>,
    pub aggregates: Input<Vec<AggregateRow>>,
    pub tags: Input<Vec<SentimentTag>>,
    pub relevance: Input<Vec<RelevanceEntry>>,
    pub competitor_source: Input<Arc<Vec<CompetitorSourceRow>>>,
    pub citation_source: Input<Arc<Vec<CitationSourceRow>>>,
}

impl EntityInputs {
    /// Borrowed inputs for the aggregator, once observations and
    /// aggregates have both settled.
    #[must_use]
    pub fn snapshot_inputs(&self, entity_id: EntityId) -> Option<SnapshotInputs<'_>> {
        let observations = self.observations.ready()?;
        let aggregates: &[AggregateRow] = match &self.aggregates {
            Input::Pending => return None,
            Input::Ready(rows) => rows,
            Input::Unavailable => &[],
        };
        Some(SnapshotInputs {
            entity_id,
            observations,
            aggregates,
            tags: self.tags.as_deref(),
            relevance: self.relevance.as_deref(),
        })
    }
}

#[derive(Debug)]
pub enum InputUpdate {
    Observations(Result<Vec<Observation>, StoreError>),
    Aggregates(Result<Vec<AggregateRow>, StoreError>),
    Tags(Result<Vec<SentimentTag>, StoreError>),
    Relevance(Result<Vec<RelevanceEntry>, StoreError>),
    CompetitorSource(Result<Vec<CompetitorSourceRow>, StoreError>),
    CitationSource(Result<Vec<CitationSourceRow>, StoreError>),
}

impl InputUpdate {
    #[must_use]
    pub fn dataset(&self) -> Dataset {
        match self {
            Self::Observations(_) => Dataset::Observations,
            Self::Aggregates(_) => Dataset::Aggregates,
            Self::Tags(_) => Dataset::Tags,
            Self::Relevance(_) => Dataset::Relevance,
            Self::CompetitorSource(_) => Dataset::CompetitorSource,
            Self::CitationSource(_) => Dataset::CitationSource,
        }
    }
}

/// Applies one update.
///
/// # Errors
///
/// Returns the failure to publish when the update is fatal for the entity.
pub fn apply_update(inputs: &mut EntityInputs, update: InputUpdate) -> Result<(), EngineFailure> {
    let dataset = update.dataset();
    match update {
        InputUpdate::Observations(result) => {
            let rows = result.map_err(|e| EngineFailure::from_store(dataset, e))?;
            inputs.observations = Input::Ready(Arc::new(rows));
        }
        InputUpdate::Aggregates(result) => {
            inputs.aggregates = match result {
                Ok(rows) => Input::Ready(rows),
                Err(e) if e.is_terminal() => return Err(EngineFailure::from_store(dataset, e)),
                Err(e) => {
                    degrade(dataset, &e);
                    Input::Ready(Vec::new())
                }
            };
        }
        InputUpdate::Tags(result) => inputs.tags = auxiliary(dataset, result)?,
        InputUpdate::Relevance(result) => inputs.relevance = auxiliary(dataset, result)?,
        InputUpdate::CompetitorSource(result) => {
            inputs.competitor_source = auxiliary(dataset, result.map(Arc::new))?;
        }
        InputUpdate::CitationSource(result) => {
            inputs.citation_source = auxiliary(dataset, result.map(Arc::new))?;
        }
    }
    Ok(())
}

fn auxiliary<T>(dataset: Dataset, result: Result<T, StoreError>) -> Result<Input<T>, EngineFailure> {
    match result {
        Ok(rows) => Ok(Input::Ready(rows)),
        Err(e @ StoreError::AuthExpired) => Err(EngineFailure::from_store(dataset, e)),
        Err(e) => {
            degrade(dataset, &e);
            Ok(Input::Unavailable)
        }
    }
}

fn degrade(dataset: Dataset, error: &StoreError) {
    tracing::warn!(
        dataset = %dataset,
        error = %error,
        "{}",
        EngineError::PartialDataUnavailable { dataset }
    );
}
