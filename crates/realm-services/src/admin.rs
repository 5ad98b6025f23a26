//! Redemption code administration.

use chrono::Utc;
use realm_backend::{BackendError, Query};
use realm_types::{AppStatePatch, CodeId, RealmEvent, RedemptionCode};
use serde_json::json;

use crate::context::{ServiceContext, fail};
use crate::error::ServiceError;
use crate::forms::NewCodeForm;

const SCOPE: &str = "admin";
const TABLE: &str = "redemption_codes";

/// Lists, creates and deactivates redemption codes.
#[derive(Debug, Clone)]
pub struct AdminService {
    ctx: ServiceContext,
}

impl AdminService {
    /// Create the service.
    pub const fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Load every code, newest first.
    pub async fn load_redemption_codes(&self) -> Result<Vec<RedemptionCode>, ServiceError> {
        let query = Query::table(TABLE).order("created_at", false);
        let codes: Vec<RedemptionCode> = self
            .ctx
            .backend
            .select_as(&query)
            .await
            .map_err(|e| fail(SCOPE, "load_redemption_codes", "Failed to load redemption codes", e))?;
        self.ctx
            .store
            .patch(AppStatePatch::new().admin_codes(codes.clone()), "admin:codes");
        Ok(codes)
    }

    /// Create a code from `form`, then reload the list.
    pub async fn create_redemption_code(
        &self,
        form: NewCodeForm,
    ) -> Result<RedemptionCode, ServiceError> {
        let form = form.normalized()?;
        let row = json!({
            "code": form.code,
            "rarity": form.rarity,
            "max_redemptions": form.max_redemptions,
            "expires_at": form.expires_at,
            "reward_gold": form.reward_gold,
            "reward_gems": form.reward_gems,
            "reward_collectible_id": form.reward_collectible_id,
            "metadata": form.metadata,
            "is_active": true,
            "created_at": Utc::now(),
        });
        let code: RedemptionCode = self
            .ctx
            .backend
            .insert_as(&Query::table(TABLE), row)
            .await
            .map_err(|e| fail(SCOPE, "create_redemption_code", "Failed to create redemption code", e))?;
        self.ctx
            .events
            .publish(&RealmEvent::AdminCodeCreated(code.clone()));
        tracing::info!(scope = SCOPE, code = %code.code, "Created redemption code");
        self.load_redemption_codes().await?;
        Ok(code)
    }

    /// Deactivate `code_id`, then reload the list.
    pub async fn deactivate_code(&self, code_id: CodeId) -> Result<RedemptionCode, ServiceError> {
        let query = Query::table(TABLE).eq("id", code_id);
        let code = self
            .ctx
            .backend
            .update_as::<RedemptionCode>(&query, json!({ "is_active": false }))
            .await
            .and_then(|rows| {
                rows.into_iter().next().ok_or_else(|| BackendError::NotFound {
                    table: TABLE.to_owned(),
                })
            })
            .map_err(|e| fail(SCOPE, "deactivate_code", "Failed to deactivate code", e))?;
        self.load_redemption_codes().await?;
        Ok(code)
    }
}
