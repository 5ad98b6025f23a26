//! Connectivity tracking.
//!
//! The connection state lives in `ui.connection`. Every update stamps
//! `last_updated` and publishes the new state on `network:status`. Besides
//! explicit calls, the service follows `session:changed` (connected or
//! auth-only) and `backend:error` (error).

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use realm_backend::{Backend, Query};
use realm_core::{RealmBus, RealmStore, Subscription};
use realm_types::{events, AppStatePatch, ConnectionState, ConnectionStatus, RealmEvent};
use tokio::task::JoinHandle;

const SCOPE: &str = "network";

/// Tracks browser-level connectivity and backend reachability.
#[derive(Clone)]
pub struct NetworkService {
    store: RealmStore,
    events: RealmBus,
    backend: Option<Arc<Backend>>,
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
}

impl core::fmt::Debug for NetworkService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NetworkService")
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .finish_non_exhaustive()
    }
}

impl NetworkService {
    /// Create the service and start following session and error events.
    ///
    /// Without a backend, probes are skipped and report `unknown`.
    pub fn new(store: RealmStore, events: RealmBus, backend: Option<Arc<Backend>>) -> Self {
        let service = Self {
            store,
            events,
            backend,
            subscriptions: Arc::default(),
        };

        let on_session = service.clone();
        let session = service.events.on(events::SESSION_CHANGED, move |event| {
            if let RealmEvent::SessionChanged(session) = event {
                let status = if session.is_some() {
                    ConnectionStatus::Connected
                } else {
                    ConnectionStatus::AuthOnly
                };
                on_session.update(|c| c.backend = status, "network:backend_session");
            }
            Ok(())
        });

        let on_error = service.clone();
        let error = service.events.on(events::BACKEND_ERROR, move |_| {
            on_error.update(|c| c.backend = ConnectionStatus::Error, "network:backend_error");
            Ok(())
        });

        service
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([session, error]);
        service
    }

    /// Stop following session and error events.
    pub fn detach(&self) {
        let subscriptions =
            std::mem::take(&mut *self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner));
        for subscription in subscriptions {
            subscription.cancel();
        }
    }

    fn update(&self, apply: impl FnOnce(&mut ConnectionState), context: &'static str) {
        self.store.update(
            |state| {
                let mut connection = state.ui.connection.clone();
                apply(&mut connection);
                connection.last_updated = Utc::now();
                AppStatePatch::new().ui(state.ui.with_connection(connection))
            },
            context,
        );
        let connection = self.store.state().ui.connection.clone();
        self.events.publish(&RealmEvent::NetworkStatus(connection));
    }

    /// Record the initial online flag, then probe the backend.
    pub async fn init(&self, online: bool) -> bool {
        self.update(|c| c.online = online, "network:init");
        self.ping().await
    }

    /// Record a connectivity change. Going offline also marks the backend
    /// offline.
    pub fn set_online(&self, online: bool) {
        if online {
            self.update(|c| c.online = true, "network:online");
        } else {
            self.update(
                |c| {
                    c.online = false;
                    c.backend = ConnectionStatus::Offline;
                },
                "network:offline",
            );
        }
    }

    /// Probe the backend's health row. Returns whether it answered.
    pub async fn ping(&self) -> bool {
        let Some(backend) = self.backend.as_ref() else {
            tracing::debug!(scope = SCOPE, "Backend not available for health checks");
            self.update(|c| c.backend = ConnectionStatus::Unknown, "network:ping_skipped");
            return false;
        };

        self.update(|c| c.backend = ConnectionStatus::Checking, "network:ping_start");
        let probe = Query::table("app_health").select("status").eq("id", 1);
        match backend.maybe_single(&probe).await {
            Ok(_) => {
                self.update(|c| c.backend = ConnectionStatus::Connected, "network:ping_success");
                true
            }
            Err(error) => {
                tracing::warn!(scope = SCOPE, error = %error, "Backend health check failed");
                self.update(|c| c.backend = ConnectionStatus::Error, "network:ping_error");
                self.events
                    .publish(&RealmEvent::NetworkProbeFailed(error.to_string()));
                false
            }
        }
    }

    /// Probe every `interval` until the task is aborted. The first probe
    /// runs one interval from now.
    pub fn spawn_probe(&self, interval: Duration) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                service.ping().await;
            }
        })
    }
}
