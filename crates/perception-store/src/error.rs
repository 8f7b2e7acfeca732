use thiserror::Error;

/// Errors returned by data store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transient backend failure (5xx, 429, injected outage).
    #[error("fetch failed for {context}: {reason}")]
    FetchFailed { context: String, reason: String },

    /// Credentials are no longer valid; re-authentication is required upstream.
    #[error("authentication expired")]
    AuthExpired,

    /// The caller may not read this resource.
    #[error("permission denied for {resource}")]
    PermissionDenied { resource: String },

    /// A non-retriable, non-auth HTTP status.
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("pagination limit reached for {context}: exceeded {max_pages} pages")]
    PaginationLimit { context: String, max_pages: usize },

    #[error("invalid base URL '{base_url}': {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}

impl StoreError {
    /// Returns `true` for errors that are worth retrying after a back-off delay.
    ///
    /// **Retriable:** [`StoreError::FetchFailed`], and [`StoreError::Http`]
    /// when the failure is a timeout, a connection error, or a 5xx status.
    ///
    /// Everything else is a hard stop: retrying will not change the outcome.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            StoreError::FetchFailed { .. } => true,
            StoreError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            StoreError::AuthExpired
            | StoreError::PermissionDenied { .. }
            | StoreError::UnexpectedStatus { .. }
            | StoreError::Deserialize { .. }
            | StoreError::PaginationLimit { .. }
            | StoreError::InvalidBaseUrl { .. } => false,
        }
    }

    /// Auth and permission failures: surfaced immediately, never retried.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StoreError::AuthExpired | StoreError::PermissionDenied { .. }
        )
    }
}
