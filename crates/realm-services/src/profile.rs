//! User profiles.

use realm_backend::Query;
use realm_types::{AppStatePatch, Profile, RealmEvent, UserId};

use crate::context::ServiceContext;
use crate::error::ServiceError;

const SCOPE: &str = "profiles";
const TABLE: &str = "user_profiles";

/// Loads and saves the signed-in user's profile.
#[derive(Debug, Clone)]
pub struct ProfileService {
    ctx: ServiceContext,
}

impl ProfileService {
    /// Create the service.
    pub const fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Load the profile of `user_id` into the store.
    pub async fn load_profile(&self, user_id: UserId) -> Result<Profile, ServiceError> {
        let query = Query::table(TABLE).eq("user_id", user_id);
        let profile: Profile = self
            .ctx
            .backend
            .single_as(&query)
            .await
            .map_err(|e| self.ctx.report(SCOPE, "load_profile", "Failed to load profile", e))?;
        self.ctx
            .store
            .patch(AppStatePatch::new().profile(Some(profile.clone())), "profile:loaded");
        Ok(profile)
    }

    /// Insert or update `profile`, keyed by user.
    pub async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, ServiceError> {
        let query = Query::table(TABLE).on_conflict("user_id");
        let saved: Profile = self
            .ctx
            .backend
            .upsert_as(&query, serde_json::to_value(profile)?)
            .await
            .map_err(|e| self.ctx.report(SCOPE, "upsert_profile", "Failed to upsert profile", e))?;
        self.ctx
            .store
            .patch(AppStatePatch::new().profile(Some(saved.clone())), "profile:updated");
        self.ctx
            .events
            .publish(&RealmEvent::ProfileUpdated(saved.clone()));
        Ok(saved)
    }
}
