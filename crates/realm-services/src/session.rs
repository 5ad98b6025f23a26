//! Auth session lifecycle.
//!
//! The backend broadcasts every auth change; [`SessionService::hydrate`]
//! mirrors the current session into the store and keeps following the
//! broadcast, republishing each change as `session:changed`.

use realm_backend::AuthResponse;
use realm_types::{AppStatePatch, RealmEvent, Session};
use serde_json::{Map, Value};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::context::ServiceContext;
use crate::error::ServiceError;
use crate::forms::CredentialsForm;

const SCOPE: &str = "auth";

/// Signs users in and out and mirrors the session into the store.
#[derive(Debug, Clone)]
pub struct SessionService {
    ctx: ServiceContext,
}

impl SessionService {
    /// Create the service.
    pub const fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Publish the current session, then follow auth changes.
    ///
    /// Must be called inside a tokio runtime. The returned task runs until
    /// the backend's auth channel closes.
    pub fn hydrate(&self) -> JoinHandle<()> {
        // Subscribe first so no change slips in between.
        let mut changes = self.ctx.backend.auth_changes();

        if let Some(session) = self.ctx.backend.session() {
            self.apply(Some(session), "session:init");
        }

        let service = self.clone();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        tracing::debug!(scope = SCOPE, event = ?change.event, "Auth state changed");
                        service.apply(change.session, "session:update");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(scope = SCOPE, skipped, "Auth listener lagged");
                        service.apply(service.ctx.backend.session(), "session:update");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn apply(&self, session: Option<Session>, context: &'static str) {
        self.ctx
            .store
            .patch(AppStatePatch::new().session(session.clone()), context);
        self.ctx.events.publish(&RealmEvent::SessionChanged(session));
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, ServiceError> {
        let form = CredentialsForm::parse(email, password)?;
        let response = self.ctx.backend.sign_in(&form.email, &form.password).await?;
        tracing::info!(scope = SCOPE, user_id = %response.user.id, "Signed in user");
        Ok(response)
    }

    /// Register a new account with profile metadata.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<AuthResponse, ServiceError> {
        let form = CredentialsForm::parse(email, password)?;
        let response = self
            .ctx
            .backend
            .sign_up(&form.email, &form.password, metadata)
            .await?;
        tracing::info!(scope = SCOPE, user_id = %response.user.id, "Registered user");
        Ok(response)
    }

    /// Sign out, reset the store, and publish the signed-out session.
    pub async fn sign_out(&self) -> Result<(), ServiceError> {
        self.ctx.backend.sign_out().await?;
        self.ctx.store.reset();
        self.ctx.events.publish(&RealmEvent::SessionChanged(None));
        Ok(())
    }
}
