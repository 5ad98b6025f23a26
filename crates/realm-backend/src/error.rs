//! Error types for the backend data service.
//!
//! Every backend operation returns [`BackendError`]. Callers treat the
//! variants as opaque apart from [`BackendError::NotFound`], which stands
//! for "the query matched no row" and replaces comparisons against the
//! backend's own no-rows code.

/// PostgREST code for "JSON object requested, but zero or multiple rows".
pub const NO_ROWS_CODE: &str = "PGRST116";

/// Errors that can occur talking to the backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// A single-row query matched nothing.
    #[error("no row found in {table}")]
    NotFound {
        /// Queried table.
        table: String,
    },

    /// The backend rejected the request.
    #[error("backend returned {status}: {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Backend error code, when provided.
        code: Option<String>,
        /// Human-readable message.
        message: String,
    },

    /// Authentication failed or no session is available.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The request did not reach the backend or the response was cut off.
    #[error("transport error: {0}")]
    Transport(String),

    /// A row could not be decoded into the expected record.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The client is not configured.
    #[error("configuration error: {0}")]
    Config(String),

    /// A remote procedure failed.
    #[error("remote procedure {name} failed: {message}")]
    Rpc {
        /// Procedure name.
        name: String,
        /// Failure message.
        message: String,
    },
}

impl BackendError {
    /// Whether this is [`BackendError::NotFound`].
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}
