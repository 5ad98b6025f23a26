//! Backend data service client for the Collectible Realm.
//!
//! The realm keeps its records in a hosted Postgres exposed through
//! PostgREST, with GoTrue handling accounts. This crate wraps that service
//! behind [`Backend`], an enum over two implementations:
//!
//! - [`RestBackend`] talks HTTP to a configured project.
//! - [`MemoryBackend`] keeps everything in process, for tests and for the
//!   shell when no project is configured.
//!
//! Rows travel as [`serde_json::Value`]; the `*_as` helpers decode them into
//! the records of `realm-types`.

pub mod auth;
pub mod error;
pub mod memory;
pub mod query;
pub mod rest;

use realm_core::config::BackendConfig;
use realm_types::Session;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

pub use auth::{AuthChange, AuthResponse};
pub use error::BackendError;
pub use memory::MemoryBackend;
pub use query::Query;
pub use rest::RestBackend;

// ---------------------------------------------------------------------------
// Unified backend enum
// ---------------------------------------------------------------------------

/// The backend data service.
///
/// Enum dispatch keeps the async methods usable without boxing.
#[derive(Debug)]
pub enum Backend {
    /// In-process tables.
    Memory(MemoryBackend),
    /// PostgREST and GoTrue over HTTP.
    Rest(RestBackend),
}

impl Backend {
    /// Build the HTTP backend from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Config`] when credentials are missing.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        RestBackend::new(config).map(Self::Rest)
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Rest(_) => "rest",
        }
    }

    /// The in-memory backend, when that is what this is.
    pub const fn as_memory(&self) -> Option<&MemoryBackend> {
        match self {
            Self::Memory(memory) => Some(memory),
            Self::Rest(_) => None,
        }
    }

    /// Rows matching `query`.
    pub async fn select(&self, query: &Query) -> Result<Vec<Value>, BackendError> {
        match self {
            Self::Memory(backend) => backend.select(query),
            Self::Rest(backend) => backend.select(query).await,
        }
    }

    /// Exactly one row matching `query`.
    ///
    /// # Errors
    ///
    /// [`BackendError::NotFound`] when nothing matches.
    pub async fn single(&self, query: &Query) -> Result<Value, BackendError> {
        self.maybe_single(query)
            .await?
            .ok_or_else(|| BackendError::NotFound {
                table: query.table.clone(),
            })
    }

    /// At most one row matching `query`.
    pub async fn maybe_single(&self, query: &Query) -> Result<Option<Value>, BackendError> {
        match self {
            Self::Memory(backend) => backend.maybe_single(query),
            Self::Rest(backend) => {
                let mut rows = backend.select(query).await?;
                if rows.len() > 1 {
                    return Err(BackendError::Api {
                        status: 406,
                        code: Some(error::NO_ROWS_CODE.to_owned()),
                        message: format!("JSON object requested, {} rows returned", rows.len()),
                    });
                }
                Ok(rows.pop())
            }
        }
    }

    /// Insert `row` and return it as stored.
    pub async fn insert(&self, query: &Query, row: Value) -> Result<Value, BackendError> {
        match self {
            Self::Memory(backend) => backend.insert(query, row),
            Self::Rest(backend) => backend.insert(query, row).await,
        }
    }

    /// Apply `changes` to every row matching the query's filters.
    pub async fn update(&self, query: &Query, changes: Value) -> Result<Vec<Value>, BackendError> {
        match self {
            Self::Memory(backend) => backend.update(query, changes),
            Self::Rest(backend) => backend.update(query, changes).await,
        }
    }

    /// Insert `row` or merge it into the row sharing its conflict column.
    pub async fn upsert(&self, query: &Query, row: Value) -> Result<Value, BackendError> {
        match self {
            Self::Memory(backend) => backend.upsert(query, row),
            Self::Rest(backend) => backend.upsert(query, row).await,
        }
    }

    /// Call a remote procedure.
    pub async fn rpc(&self, name: &str, args: &Value) -> Result<Value, BackendError> {
        match self {
            Self::Memory(backend) => backend.rpc(name, args),
            Self::Rest(backend) => backend.rpc(name, args).await,
        }
    }

    /// The current session, if signed in.
    pub fn session(&self) -> Option<Session> {
        match self {
            Self::Memory(backend) => backend.session(),
            Self::Rest(backend) => backend.session(),
        }
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, BackendError> {
        match self {
            Self::Memory(backend) => backend.sign_in(email, password),
            Self::Rest(backend) => backend.sign_in(email, password).await,
        }
    }

    /// Register an account with profile metadata.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<AuthResponse, BackendError> {
        match self {
            Self::Memory(backend) => backend.sign_up(email, password, metadata),
            Self::Rest(backend) => backend.sign_up(email, password, metadata).await,
        }
    }

    /// End the current session.
    pub async fn sign_out(&self) -> Result<(), BackendError> {
        match self {
            Self::Memory(backend) => {
                backend.sign_out();
                Ok(())
            }
            Self::Rest(backend) => backend.sign_out().await,
        }
    }

    /// Receiver of auth changes made after this call.
    pub fn auth_changes(&self) -> broadcast::Receiver<AuthChange> {
        match self {
            Self::Memory(backend) => backend.auth_changes(),
            Self::Rest(backend) => backend.auth_changes(),
        }
    }

    // -----------------------------------------------------------------------
    // Typed helpers
    // -----------------------------------------------------------------------

    /// [`Backend::select`] decoded into `T`.
    pub async fn select_as<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, BackendError> {
        decode_rows(self.select(query).await?)
    }

    /// [`Backend::single`] decoded into `T`.
    pub async fn single_as<T: DeserializeOwned>(&self, query: &Query) -> Result<T, BackendError> {
        decode(self.single(query).await?)
    }

    /// [`Backend::maybe_single`] decoded into `T`.
    pub async fn maybe_single_as<T: DeserializeOwned>(
        &self,
        query: &Query,
    ) -> Result<Option<T>, BackendError> {
        self.maybe_single(query).await?.map(decode).transpose()
    }

    /// [`Backend::insert`] decoded into `T`.
    pub async fn insert_as<T: DeserializeOwned>(
        &self,
        query: &Query,
        row: Value,
    ) -> Result<T, BackendError> {
        decode(self.insert(query, row).await?)
    }

    /// [`Backend::update`] decoded into `T`.
    pub async fn update_as<T: DeserializeOwned>(
        &self,
        query: &Query,
        changes: Value,
    ) -> Result<Vec<T>, BackendError> {
        decode_rows(self.update(query, changes).await?)
    }

    /// [`Backend::upsert`] decoded into `T`.
    pub async fn upsert_as<T: DeserializeOwned>(
        &self,
        query: &Query,
        row: Value,
    ) -> Result<T, BackendError> {
        decode(self.upsert(query, row).await?)
    }
}

/// Decode one row.
pub fn decode<T: DeserializeOwned>(row: Value) -> Result<T, BackendError> {
    Ok(serde_json::from_value(row)?)
}

/// Decode a list of rows.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, BackendError> {
    rows.into_iter().map(decode).collect()
}
