use perception_store::{Dataset, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no active entity")]
    NoActiveEntity,

    #[error("fetching {dataset} failed: {source}")]
    Fetch {
        dataset: Dataset,
        #[source]
        source: StoreError,
    },

    /// A metric family degrades to its neutral default. Logged, never
    /// published as an error.
    #[error("{dataset} unavailable, dependent metrics fall back to defaults")]
    PartialDataUnavailable { dataset: Dataset },
}
