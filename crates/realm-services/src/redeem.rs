//! Code redemption with currency rewards.

use realm_types::{LedgerEntryType, RealmEvent, RedeemReward, UserId};

use crate::collectibles::CollectiblesService;
use crate::context::ServiceContext;
use crate::economy::{BalanceDelta, EconomyService, LedgerReason};
use crate::error::ServiceError;
use crate::forms::RedeemForm;

/// Redeems codes and credits their currency rewards.
#[derive(Debug, Clone)]
pub struct RedeemService {
    ctx: ServiceContext,
    collectibles: CollectiblesService,
    economy: EconomyService,
}

impl RedeemService {
    /// Create the service.
    pub const fn new(
        ctx: ServiceContext,
        collectibles: CollectiblesService,
        economy: EconomyService,
    ) -> Self {
        Self {
            ctx,
            collectibles,
            economy,
        }
    }

    /// Normalize `code`, redeem it for `user_id`, and credit any currency.
    ///
    /// Malformed codes are rejected before the backend is called.
    pub async fn redeem(&self, user_id: UserId, code: &str) -> Result<RedeemReward, ServiceError> {
        let form = RedeemForm::parse(code)?;
        let reward = self.collectibles.redeem_code(&form.code, user_id).await?;

        if let Some(currency) = reward.currency_rewards {
            self.economy
                .adjust_balance(
                    user_id,
                    BalanceDelta {
                        gold: currency.gold.unwrap_or(0),
                        gems: currency.gems.unwrap_or(0),
                    },
                    LedgerReason {
                        entry_type: LedgerEntryType::RedeemReward,
                        description: Some(format!("Reward from code {}", form.code)),
                        reference_id: None,
                    },
                )
                .await?;
        }

        self.ctx
            .events
            .publish(&RealmEvent::RedeemCompleted(reward.clone()));
        Ok(reward)
    }
}
