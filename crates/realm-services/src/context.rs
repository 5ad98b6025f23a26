//! The explicit context every service is built from.

use std::sync::Arc;

use realm_backend::{Backend, BackendError};
use realm_core::{AppConfig, RealmBus, RealmStore};
use realm_types::{BackendFailure, RealmEvent};

use crate::error::ServiceError;

/// Store, bus, backend and configuration shared by the services.
///
/// Cloning is cheap; every field is a shared handle.
#[derive(Clone)]
pub struct ServiceContext {
    /// Application state.
    pub store: RealmStore,
    /// Cross-component events.
    pub events: RealmBus,
    /// Backend data service.
    pub backend: Arc<Backend>,
    /// Application configuration.
    pub config: Arc<AppConfig>,
}

impl ServiceContext {
    /// Bundle the shared handles.
    pub const fn new(
        store: RealmStore,
        events: RealmBus,
        backend: Arc<Backend>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            events,
            backend,
            config,
        }
    }

    /// Like [`fail`], and also publish `backend:error`.
    pub(crate) fn report(
        &self,
        scope: &'static str,
        action: &'static str,
        message: &'static str,
        error: BackendError,
    ) -> ServiceError {
        let failure = error.to_string();
        tracing::error!(scope, action, error = %failure, "{message}");
        self.events.publish(&RealmEvent::BackendError(BackendFailure {
            scope: scope.to_owned(),
            action: action.to_owned(),
            error: failure,
        }));
        ServiceError::Backend(error)
    }
}

/// Log a failed backend call and convert it for the caller.
pub(crate) fn fail(
    scope: &'static str,
    action: &'static str,
    message: &'static str,
    error: BackendError,
) -> ServiceError {
    tracing::error!(scope, action, error = %error, "{message}");
    ServiceError::Backend(error)
}

impl core::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}
