//! Error types for the application shell.
//!
//! [`AppError`] covers start-up and the shell's own persistence. Errors
//! raised by user gestures stay [`ServiceError`]s so the view modules can
//! show them inline.

use std::path::PathBuf;

use realm_services::ServiceError;

/// Top-level error of the application shell.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: realm_core::ConfigError,
    },

    /// The backend could not be built.
    #[error("backend error: {source}")]
    Backend {
        /// The underlying backend error.
        #[from]
        source: realm_backend::BackendError,
    },

    /// A service call made by the shell itself failed.
    #[error("service error: {source}")]
    Service {
        /// The underlying service error.
        #[from]
        source: ServiceError,
    },

    /// The preferences file could not be read or written.
    #[error("preferences at {}: {source}", path.display())]
    Preferences {
        /// File involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The preferences file is not a JSON object of strings.
    #[error("preferences at {} are malformed: {source}", path.display())]
    PreferencesFormat {
        /// File involved.
        path: PathBuf,
        /// The underlying decode error.
        source: serde_json::Error,
    },

    /// Bootstrap was called outside a tokio runtime.
    #[error("no tokio runtime: {message}")]
    Runtime {
        /// Description of the failure.
        message: String,
    },

    /// A view module failed to start and cannot be used.
    #[error("module `{name}` is not running")]
    ModuleUnavailable {
        /// Registration name.
        name: String,
    },

    /// Logging could not be initialized.
    #[error("tracing error: {message}")]
    Tracing {
        /// Description of the failure.
        message: String,
    },
}
