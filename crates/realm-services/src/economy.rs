//! Wallets, the currency ledger, and every balance change.
//!
//! Balances are read, adjusted and written back without a transaction:
//! concurrent adjustments for the same user race and the last write wins.
//! Each adjustment appends a ledger entry after the wallet write.

use chrono::{Duration, Utc};
use realm_backend::{BackendError, Query};
use realm_core::time;
use realm_types::{
    AppStatePatch, LedgerEntry, LedgerEntryType, ListingId, NewLedgerEntry, Rarity, RealmEvent,
    UserId, Wallet,
};
use serde_json::json;
use uuid::Uuid;

use crate::context::{ServiceContext, fail};
use crate::error::ServiceError;

const SCOPE: &str = "economy";
const WALLETS: &str = "wallets";
const LEDGER: &str = "economy_ledger";

/// Ledger rows loaded when no limit is given.
pub const DEFAULT_LEDGER_LIMIT: usize = 25;

/// Description of the daily stipend ledger entry.
pub const STIPEND_DESCRIPTION: &str = "Daily realm stipend";

/// Signed change to both currencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceDelta {
    /// Gold to add (negative to spend).
    pub gold: i64,
    /// Gems to add (negative to spend).
    pub gems: i64,
}

/// Why a balance changed, as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerReason {
    /// Ledger category.
    pub entry_type: LedgerEntryType,
    /// Human-readable description.
    pub description: Option<String>,
    /// Related record, e.g. the listing bought.
    pub reference_id: Option<Uuid>,
}

impl Default for LedgerReason {
    fn default() -> Self {
        Self {
            entry_type: LedgerEntryType::Adjustment,
            description: None,
            reference_id: None,
        }
    }
}

/// Result of a stipend claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StipendOutcome {
    /// The stipend was credited.
    Granted(Wallet),
    /// The previous stipend is too recent.
    AlreadyClaimed {
        /// Time until the next claim.
        remaining: Duration,
        /// `remaining` in whole hours, rounded up.
        hours_remaining: i64,
    },
}

/// Costs of a marketplace purchase. Signs are ignored; both are charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseCost {
    /// Gold price.
    pub gold: i64,
    /// Gem price.
    pub gems: i64,
    /// Listing bought.
    pub listing_id: ListingId,
}

/// Wallet and ledger operations.
#[derive(Debug, Clone)]
pub struct EconomyService {
    ctx: ServiceContext,
}

impl EconomyService {
    /// Create the service.
    pub const fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Load the wallet of `user_id`, creating an empty one on first use.
    pub async fn load_wallet(&self, user_id: UserId) -> Result<Wallet, ServiceError> {
        let query = Query::table(WALLETS).eq("user_id", user_id);
        match self.ctx.backend.single_as::<Wallet>(&query).await {
            Ok(wallet) => {
                self.ctx
                    .store
                    .patch(AppStatePatch::new().wallet(Some(wallet.clone())), "wallet:loaded");
                Ok(wallet)
            }
            Err(BackendError::NotFound { .. }) => {
                let created: Wallet = self
                    .ctx
                    .backend
                    .insert_as(
                        &Query::table(WALLETS),
                        json!({ "user_id": user_id, "gold_balance": 0, "gem_balance": 0 }),
                    )
                    .await
                    .map_err(|e| fail(SCOPE, "create_wallet", "Failed to create wallet", e))?;
                self.ctx
                    .store
                    .patch(AppStatePatch::new().wallet(Some(created.clone())), "wallet:created");
                Ok(created)
            }
            Err(e) => Err(fail(SCOPE, "load_wallet", "Failed to load wallet", e)),
        }
    }

    /// Load the `limit` most recent ledger entries of `user_id`.
    pub async fn load_ledger(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, ServiceError> {
        let query = Query::table(LEDGER)
            .eq("user_id", user_id)
            .order("occurred_at", false)
            .limit(limit);
        let entries: Vec<LedgerEntry> = self
            .ctx
            .backend
            .select_as(&query)
            .await
            .map_err(|e| fail(SCOPE, "load_ledger", "Failed to load ledger", e))?;
        self.ctx
            .store
            .patch(AppStatePatch::new().ledger(entries.clone()), "ledger:loaded");
        Ok(entries)
    }

    /// Append `entry` to the ledger and publish it.
    pub async fn record_ledger_entry(
        &self,
        entry: &NewLedgerEntry,
    ) -> Result<LedgerEntry, ServiceError> {
        let recorded: LedgerEntry = self
            .ctx
            .backend
            .insert_as(&Query::table(LEDGER), serde_json::to_value(entry)?)
            .await
            .map_err(|e| fail(SCOPE, "record_ledger_entry", "Failed to record ledger entry", e))?;
        self.ctx
            .events
            .publish(&RealmEvent::LedgerEntry(recorded.clone()));
        Ok(recorded)
    }

    /// Credit the daily stipend unless one was granted within the
    /// configured interval.
    ///
    /// `wallet` is loaded when not supplied.
    pub async fn grant_daily_stipend(
        &self,
        user_id: UserId,
        wallet: Option<Wallet>,
    ) -> Result<StipendOutcome, ServiceError> {
        let rules = &self.ctx.config.economy;
        let wallet = match wallet {
            Some(wallet) => wallet,
            None => self.load_wallet(user_id).await?,
        };

        let now = Utc::now();
        if let Some(last) = wallet.last_stipend_at {
            let window =
                Duration::try_hours(rules.stipend_interval_hours).unwrap_or(Duration::MAX);
            if let Some(remaining) = time::remaining_in_window(last, window, now) {
                return Ok(StipendOutcome::AlreadyClaimed {
                    remaining,
                    hours_remaining: time::hours_ceil(remaining),
                });
            }
        }

        let changes = json!({
            "gold_balance": wallet.gold_balance.saturating_add(rules.stipend_gold_amount),
            "gem_balance": wallet.gem_balance.saturating_add(rules.stipend_gem_amount),
            "last_stipend_at": now,
        });
        let updated = self
            .write_wallet(&wallet, changes)
            .await
            .map_err(|e| fail(SCOPE, "grant_stipend", "Failed to grant stipend", e))?;

        self.record_ledger_entry(&NewLedgerEntry {
            user_id,
            entry_type: LedgerEntryType::Stipend,
            delta_gold: rules.stipend_gold_amount,
            delta_gems: rules.stipend_gem_amount,
            description: Some(STIPEND_DESCRIPTION.to_owned()),
            reference_id: None,
            occurred_at: now,
        })
        .await?;

        self.ctx
            .store
            .patch(AppStatePatch::new().wallet(Some(updated.clone())), "wallet:stipend");
        tracing::info!(scope = SCOPE, user_id = %user_id, "Granted daily stipend");
        Ok(StipendOutcome::Granted(updated))
    }

    /// Apply `delta` to the wallet of `user_id` and record it.
    pub async fn adjust_balance(
        &self,
        user_id: UserId,
        delta: BalanceDelta,
        reason: LedgerReason,
    ) -> Result<Wallet, ServiceError> {
        let wallet = self.load_wallet(user_id).await?;
        let changes = json!({
            "gold_balance": wallet.gold_balance.saturating_add(delta.gold),
            "gem_balance": wallet.gem_balance.saturating_add(delta.gems),
        });
        let updated = self
            .write_wallet(&wallet, changes)
            .await
            .map_err(|e| fail(SCOPE, "adjust_balance", "Failed to adjust balance", e))?;

        self.record_ledger_entry(&NewLedgerEntry {
            user_id,
            entry_type: reason.entry_type,
            delta_gold: delta.gold,
            delta_gems: delta.gems,
            description: reason.description,
            reference_id: reason.reference_id,
            occurred_at: Utc::now(),
        })
        .await?;

        self.ctx
            .store
            .patch(AppStatePatch::new().wallet(Some(updated.clone())), "wallet:adjusted");
        Ok(updated)
    }

    /// Credit the conversion reward for one duplicate of `rarity`.
    pub async fn convert_duplicate(
        &self,
        user_id: UserId,
        rarity: Rarity,
    ) -> Result<Wallet, ServiceError> {
        let reward = self.ctx.config.economy.conversion_for(rarity);
        self.adjust_balance(
            user_id,
            BalanceDelta {
                gold: reward.gold,
                gems: reward.gems,
            },
            LedgerReason {
                entry_type: LedgerEntryType::Conversion,
                description: Some(format!("Converted duplicate ({})", rarity.as_str())),
                reference_id: None,
            },
        )
        .await
    }

    /// Charge `user_id` for a marketplace purchase.
    pub async fn apply_marketplace_purchase(
        &self,
        user_id: UserId,
        cost: PurchaseCost,
    ) -> Result<Wallet, ServiceError> {
        self.adjust_balance(
            user_id,
            BalanceDelta {
                gold: charge(cost.gold),
                gems: charge(cost.gems),
            },
            LedgerReason {
                entry_type: LedgerEntryType::MarketplacePurchase,
                description: Some("Marketplace purchase".to_owned()),
                reference_id: Some(cost.listing_id.into_inner()),
            },
        )
        .await
    }

    async fn write_wallet(
        &self,
        wallet: &Wallet,
        changes: serde_json::Value,
    ) -> Result<Wallet, BackendError> {
        let query = Query::table(WALLETS).eq("id", wallet.id);
        self.ctx
            .backend
            .update_as::<Wallet>(&query, changes)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound {
                table: WALLETS.to_owned(),
            })
    }
}

/// A price as a debit.
const fn charge(price: i64) -> i64 {
    0_i64.saturating_sub(price.saturating_abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices_become_debits_regardless_of_sign() {
        assert_eq!(charge(120), -120);
        assert_eq!(charge(-7), -7);
        assert_eq!(charge(0), 0);
        assert_eq!(charge(i64::MIN), i64::MIN.saturating_add(1));
    }

    #[test]
    fn default_reason_is_a_plain_adjustment() {
        let reason = LedgerReason::default();
        assert_eq!(reason.entry_type, LedgerEntryType::Adjustment);
        assert!(reason.description.is_none());
    }
}
