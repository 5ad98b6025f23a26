//! The user's collection and code redemption.

use std::sync::Arc;

use realm_backend::Query;
use realm_types::{
    AppStatePatch, OwnedCollectible, RealmEvent, RedeemReward, UserCollectibleRow, UserId,
};
use serde_json::{Value, json};

use crate::context::{ServiceContext, fail};
use crate::error::ServiceError;

const SCOPE: &str = "collectibles";

/// Remote procedure that validates a code and grants its rewards.
pub const REDEEM_RPC: &str = "redeem_collectible_code";

/// Loads owned collectibles and redeems codes.
#[derive(Debug, Clone)]
pub struct CollectiblesService {
    ctx: ServiceContext,
}

impl CollectiblesService {
    /// Create the service.
    pub const fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Load the collection of `user_id`, newest first.
    ///
    /// Without a user the collection is cleared.
    pub async fn load_collectibles(
        &self,
        user_id: Option<UserId>,
    ) -> Result<Vec<OwnedCollectible>, ServiceError> {
        let Some(user_id) = user_id else {
            self.ctx
                .store
                .patch(AppStatePatch::new().collectibles(Vec::new()), "collectibles:cleared");
            return Ok(Vec::new());
        };

        let query = Query::table("user_collectibles")
            .select("*, collectible:collectibles(*)")
            .eq("user_id", user_id)
            .order("acquired_at", false);
        let rows: Vec<UserCollectibleRow> = self
            .ctx
            .backend
            .select_as(&query)
            .await
            .map_err(|e| fail(SCOPE, "load_collectibles", "Failed to load collectibles", e))?;

        let owned: Vec<OwnedCollectible> = rows
            .into_iter()
            .filter_map(|row| {
                let acquisition_id = row.id;
                let owned = OwnedCollectible::from_row(row);
                if owned.is_none() {
                    tracing::warn!(
                        scope = SCOPE,
                        acquisition_id = %acquisition_id,
                        "Skipping collectible row without a catalogue entry"
                    );
                }
                owned
            })
            .collect();
        self.ctx
            .store
            .patch(AppStatePatch::new().collectibles(owned.clone()), "collectibles:loaded");
        self.ctx
            .events
            .publish(&RealmEvent::CollectiblesLoaded(Arc::new(owned.clone())));
        Ok(owned)
    }

    /// Redeem an already normalized `code` and reload the collection.
    pub async fn redeem_code(
        &self,
        code: &str,
        user_id: UserId,
    ) -> Result<RedeemReward, ServiceError> {
        let args = json!({ "p_code": code, "p_user_id": user_id });
        let raw = self
            .ctx
            .backend
            .rpc(REDEEM_RPC, &args)
            .await
            .map_err(|e| fail(SCOPE, "redeem_code", "Failed to redeem code", e))?;
        let reward: RedeemReward = match raw {
            Value::Null => RedeemReward::default(),
            other => serde_json::from_value(other)?,
        };
        self.ctx
            .events
            .publish(&RealmEvent::RedeemSuccess(reward.clone()));
        self.load_collectibles(Some(user_id)).await?;
        Ok(reward)
    }
}
