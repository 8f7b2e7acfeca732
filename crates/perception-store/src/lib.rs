//! Data access for the perception engine.
//!
//! [`DataStore`] is the collaborator interface to the backend that holds
//! observations, aggregate rows, and auxiliary datasets. [`HttpStore`] talks
//! to a REST backend; [`MemoryStore`] keeps everything in process. The
//! [`Fetcher`] layers retry, pagination, and extended-subset merging on top
//! of any store.

pub mod error;
pub mod fetcher;
pub mod http;
pub mod memory;
pub mod paginator;
pub mod retry;
pub mod store;

pub use error::StoreError;
pub use fetcher::{Fetcher, FetcherConfig};
pub use http::HttpStore;
pub use memory::{EntityFixture, InjectedFailure, MemoryStore};
pub use paginator::{fetch_all_pages, merge_extended};
pub use retry::RetryPolicy;
pub use store::{DataStore, Dataset};
