use chrono::{DateTime, Utc};
use thiserror::Error;

use trendscout_core::Platform;

/// Errors returned by the source fetchers.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Credentials missing or rejected. Fatal for this source; never retried.
    #[error("{platform} authentication failed: {reason}")]
    Auth { platform: Platform, reason: String },

    /// A rolling-window ceiling is saturated; try again after the wait.
    #[error("{platform} rate limited (retry after {retry_after_secs}s)")]
    RateLimited {
        platform: Platform,
        retry_after_secs: u64,
    },

    /// The hard period quota is spent; blocked until the provider reset.
    #[error("{platform} quota exhausted until {reset_at}")]
    QuotaExhausted {
        platform: Platform,
        reset_at: DateTime<Utc>,
    },

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A non-2xx status outside the specifically handled ones.
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Cursor-pagination guard against cycling cursors.
    #[error("pagination limit reached for {platform}: exceeded {max_pages} pages")]
    PaginationLimit { platform: Platform, max_pages: usize },
}
