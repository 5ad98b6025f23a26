//! The application context handed to every view module.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use realm_core::{AppConfig, LogHistory, RealmBus, RealmStore};
use realm_services::{ServiceError, Services};
use realm_types::{UserId, View};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::preferences::Preferences;
use crate::surface::{Region, RenderFrame, Surface};

/// Everything a view module may use.
///
/// Cloning is cheap; every field is a shared handle.
#[derive(Clone)]
pub struct AppContext {
    /// Application state.
    pub store: RealmStore,
    /// Cross-component events.
    pub events: RealmBus,
    /// Domain services.
    pub services: Services,
    /// Configuration.
    pub config: Arc<AppConfig>,
    /// Where frames are drawn.
    pub surface: Arc<dyn Surface>,
    /// Client-local preferences.
    pub preferences: Preferences,
    /// Recent log events.
    pub history: LogHistory,
    runtime: Handle,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl core::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppContext")
            .field("services", &self.services)
            .field("preferences", &self.preferences)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Bundle the shared handles. Background work is spawned on `runtime`.
    pub fn new(
        services: Services,
        surface: Arc<dyn Surface>,
        preferences: Preferences,
        history: LogHistory,
        runtime: Handle,
    ) -> Self {
        let shared = &services.context;
        Self {
            store: shared.store.clone(),
            events: shared.events.clone(),
            config: Arc::clone(&shared.config),
            services,
            surface,
            preferences,
            history,
            runtime,
            tasks: Arc::default(),
        }
    }

    /// Id of the signed-in user.
    pub fn user_id(&self) -> Option<UserId> {
        self.store.state().user_id()
    }

    /// Id of the signed-in user, or [`ServiceError::NotSignedIn`].
    pub fn require_user(&self) -> Result<UserId, ServiceError> {
        self.user_id().ok_or(ServiceError::NotSignedIn)
    }

    /// Whether `view` is the one on screen.
    pub fn is_active(&self, view: View) -> bool {
        self.store.state().ui.active_view == view
    }

    /// Draw `frame` in the main region.
    pub fn render(&self, frame: &RenderFrame) {
        self.surface.render(Region::Main, frame);
    }

    /// Run `task` in the background. Failures are logged.
    ///
    /// Bus handlers are synchronous; anything that needs the backend goes
    /// through here.
    pub fn spawn<F>(&self, action: &'static str, task: F)
    where
        F: Future<Output = Result<(), ServiceError>> + Send + 'static,
    {
        let handle = self.runtime.spawn(async move {
            if let Err(error) = task.await {
                tracing::warn!(scope = "app", action, error = %error, "Background task failed");
            }
        });
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    /// Wait until every background task, including tasks spawned by
    /// other background tasks, has finished.
    pub async fn settle(&self) {
        loop {
            let pending =
                std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
            if pending.is_empty() {
                return;
            }
            for task in pending {
                if let Err(error) = task.await {
                    tracing::error!(scope = "app", error = %error, "Background task aborted");
                }
            }
        }
    }
}
