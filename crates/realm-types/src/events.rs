//! Bus channel names and their payloads.
//!
//! Channel names are part of the contract between services and modules and
//! must not change. [`RealmEvent`] pairs every channel with a typed payload;
//! [`RealmEvent::name`] yields the channel it is published on.

use std::sync::Arc;

use serde::Serialize;

use crate::enums::View;
use crate::ids::{ListingId, QuestId, UserId};
use crate::state::ConnectionState;
use crate::structs::{
    LedgerEntry, OwnedCollectible, Profile, RedeemReward, RedemptionCode, Session,
};

/// Auth session appeared, changed, or went away.
pub const SESSION_CHANGED: &str = "session:changed";
/// The active view changed.
pub const VIEW_CHANGED: &str = "view:changed";
/// Wallet and ledger should be reloaded.
pub const ECONOMY_REFRESH: &str = "economy:refresh";
/// A code was redeemed and its rewards credited.
pub const REDEEM_COMPLETED: &str = "redeem:completed";
/// The redeem RPC succeeded (before currency rewards are credited).
pub const REDEEM_SUCCESS: &str = "redeem:success";
/// A quest reached its target.
pub const QUEST_COMPLETED: &str = "quest:completed";
/// A listing was bought.
pub const MARKETPLACE_PURCHASED: &str = "marketplace:purchased";
/// An admin created a redemption code.
pub const ADMIN_CODE_CREATED: &str = "admin:codeCreated";
/// Connection state changed.
pub const NETWORK_STATUS: &str = "network:status";
/// A health probe failed.
pub const NETWORK_PROBE_FAILED: &str = "network:backend_error";
/// A backend operation failed.
pub const BACKEND_ERROR: &str = "backend:error";
/// The user's collectibles were reloaded.
pub const COLLECTIBLES_LOADED: &str = "collectibles:loaded";
/// A ledger entry was recorded.
pub const LEDGER_ENTRY: &str = "ledger:entry";
/// The user's profile was saved.
pub const PROFILE_UPDATED: &str = "profile:updated";

/// Generic failure signal published on [`BACKEND_ERROR`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendFailure {
    /// Service that issued the operation (`marketplace`, `engagement`, ...).
    pub scope: String,
    /// Operation name (`load_marketplace`, `complete_quest`, ...).
    pub action: String,
    /// Rendered error.
    pub error: String,
}

/// Payload of [`QUEST_COMPLETED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestCompletion {
    /// The completed assignment.
    pub quest_id: QuestId,
    /// Quest title.
    pub title: String,
    /// Gold credited.
    pub reward_gold: i64,
    /// Gems credited.
    pub reward_gems: i64,
}

/// Every event that crosses component boundaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum RealmEvent {
    /// See [`SESSION_CHANGED`]. `None` means signed out.
    SessionChanged(Option<Session>),
    /// See [`VIEW_CHANGED`].
    ViewChanged(View),
    /// See [`ECONOMY_REFRESH`].
    EconomyRefresh,
    /// See [`REDEEM_COMPLETED`].
    RedeemCompleted(RedeemReward),
    /// See [`REDEEM_SUCCESS`].
    RedeemSuccess(RedeemReward),
    /// See [`QUEST_COMPLETED`].
    QuestCompleted(QuestCompletion),
    /// See [`MARKETPLACE_PURCHASED`].
    MarketplacePurchased {
        /// The listing bought.
        listing_id: ListingId,
        /// The buyer.
        buyer_id: UserId,
    },
    /// See [`ADMIN_CODE_CREATED`].
    AdminCodeCreated(RedemptionCode),
    /// See [`NETWORK_STATUS`].
    NetworkStatus(ConnectionState),
    /// See [`NETWORK_PROBE_FAILED`].
    NetworkProbeFailed(String),
    /// See [`BACKEND_ERROR`].
    BackendError(BackendFailure),
    /// See [`COLLECTIBLES_LOADED`].
    CollectiblesLoaded(Arc<Vec<OwnedCollectible>>),
    /// See [`LEDGER_ENTRY`].
    LedgerEntry(LedgerEntry),
    /// See [`PROFILE_UPDATED`].
    ProfileUpdated(Profile),
}

impl RealmEvent {
    /// The channel this event is published on.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SessionChanged(_) => SESSION_CHANGED,
            Self::ViewChanged(_) => VIEW_CHANGED,
            Self::EconomyRefresh => ECONOMY_REFRESH,
            Self::RedeemCompleted(_) => REDEEM_COMPLETED,
            Self::RedeemSuccess(_) => REDEEM_SUCCESS,
            Self::QuestCompleted(_) => QUEST_COMPLETED,
            Self::MarketplacePurchased { .. } => MARKETPLACE_PURCHASED,
            Self::AdminCodeCreated(_) => ADMIN_CODE_CREATED,
            Self::NetworkStatus(_) => NETWORK_STATUS,
            Self::NetworkProbeFailed(_) => NETWORK_PROBE_FAILED,
            Self::BackendError(_) => BACKEND_ERROR,
            Self::CollectiblesLoaded(_) => COLLECTIBLES_LOADED,
            Self::LedgerEntry(_) => LEDGER_ENTRY,
            Self::ProfileUpdated(_) => PROFILE_UPDATED,
        }
    }
}
