//! Domain records decoded from backend rows.
//!
//! Field names follow the backend's column names so rows decode directly
//! with `serde`. Joined relations (`collectible:collectibles(*)` and the
//! like) appear as nested optional records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::enums::{LedgerEntryType, ListingStatus, Rarity, ToastLevel};
use crate::ids::{
    AchievementId, AcquisitionId, CodeId, CollectibleId, LedgerEntryId, ListingId,
    QuestDefinitionId, QuestId, SeasonalEventId, ShowcaseId, UserId, WalletId,
};

// ---------------------------------------------------------------------------
// Session and profile
// ---------------------------------------------------------------------------

/// The authenticated user attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct User {
    /// User id issued by the auth service.
    pub id: UserId,
    /// Sign-in email, when the provider exposes one.
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form metadata supplied at sign-up.
    #[serde(default)]
    pub user_metadata: BTreeMap<String, serde_json::Value>,
}

/// An auth session handed off by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Session {
    /// Bearer token for data requests.
    pub access_token: String,
    /// Token used to obtain a new access token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) at which the access token expires.
    #[serde(default)]
    pub expires_at: Option<i64>,
    /// The signed-in user.
    pub user: User,
}

impl Session {
    /// Convenience accessor for the signed-in user's id.
    pub const fn user_id(&self) -> UserId {
        self.user.id
    }
}

/// A user's public profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Profile {
    /// Owning user.
    pub user_id: UserId,
    /// Display name.
    pub username: String,
    /// Cosmetic title shown next to the name.
    #[serde(default)]
    pub flair_title: Option<String>,
    /// Avatar image.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Whether the user may use the admin console.
    #[serde(default)]
    pub is_admin: bool,
    /// Last modification time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Collectibles
// ---------------------------------------------------------------------------

/// A collectible as defined in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CollectibleDefinition {
    /// Catalogue id.
    pub id: CollectibleId,
    /// Display name.
    pub name: String,
    /// Rarity tier.
    pub rarity: Rarity,
    /// Flavour text.
    #[serde(default)]
    pub lore: Option<String>,
    /// Artwork.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Set the collectible belongs to.
    #[serde(default)]
    pub series: Option<String>,
}

/// A `user_collectibles` row joined with its catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UserCollectibleRow {
    /// Acquisition id.
    pub id: AcquisitionId,
    /// Owner.
    pub user_id: UserId,
    /// When the user obtained it.
    pub acquired_at: DateTime<Utc>,
    /// Joined catalogue entry.
    #[serde(default)]
    pub collectible: Option<CollectibleDefinition>,
}

/// A collectible held by the signed-in user, flattened for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct OwnedCollectible {
    /// Catalogue id.
    pub id: CollectibleId,
    /// Display name.
    pub name: String,
    /// Rarity tier.
    pub rarity: Rarity,
    /// Flavour text.
    pub lore: Option<String>,
    /// Artwork.
    pub image_url: Option<String>,
    /// This particular copy.
    pub acquisition_id: AcquisitionId,
    /// When this copy was obtained.
    pub acquired_at: DateTime<Utc>,
    /// Title-cased rarity.
    pub rarity_label: String,
}

impl OwnedCollectible {
    /// Flatten a joined row. Rows whose catalogue entry is missing yield `None`.
    pub fn from_row(row: UserCollectibleRow) -> Option<Self> {
        let definition = row.collectible?;
        Some(Self {
            id: definition.id,
            name: definition.name,
            rarity: definition.rarity,
            lore: definition.lore,
            image_url: definition.image_url,
            acquisition_id: row.id,
            acquired_at: row.acquired_at,
            rarity_label: definition.rarity.label().to_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Economy
// ---------------------------------------------------------------------------

/// A user's currency balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Wallet {
    /// Wallet row id.
    pub id: WalletId,
    /// Owner.
    pub user_id: UserId,
    /// Realm gold.
    #[serde(default)]
    pub gold_balance: i64,
    /// Stellar gems.
    #[serde(default)]
    pub gem_balance: i64,
    /// Last time the daily stipend was granted.
    #[serde(default)]
    pub last_stipend_at: Option<DateTime<Utc>>,
}

/// A stored economy ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LedgerEntry {
    /// Entry id.
    pub id: LedgerEntryId,
    /// Affected user.
    pub user_id: UserId,
    /// Cause of the movement.
    #[serde(rename = "type")]
    pub entry_type: LedgerEntryType,
    /// Gold moved (negative for debits).
    #[serde(default)]
    pub delta_gold: i64,
    /// Gems moved (negative for debits).
    #[serde(default)]
    pub delta_gems: i64,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Related row (listing, quest, ...).
    #[serde(default)]
    pub reference_id: Option<Uuid>,
    /// When the movement happened.
    pub occurred_at: DateTime<Utc>,
}

/// A ledger entry about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLedgerEntry {
    /// Affected user.
    pub user_id: UserId,
    /// Cause of the movement.
    #[serde(rename = "type")]
    pub entry_type: LedgerEntryType,
    /// Gold moved.
    pub delta_gold: i64,
    /// Gems moved.
    pub delta_gems: i64,
    /// Human-readable description.
    pub description: Option<String>,
    /// Related row.
    pub reference_id: Option<Uuid>,
    /// When the movement happened.
    pub occurred_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Engagement
// ---------------------------------------------------------------------------

/// An achievement definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AchievementDefinition {
    /// Definition id.
    pub id: AchievementId,
    /// Title.
    pub title: String,
    /// What it takes to earn it.
    #[serde(default)]
    pub description: Option<String>,
    /// Badge icon.
    #[serde(default)]
    pub icon: Option<String>,
}

/// An achievement earned by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UserAchievement {
    /// Row id.
    pub id: AchievementId,
    /// When it was earned.
    pub earned_at: DateTime<Utc>,
    /// Joined definition.
    #[serde(default)]
    pub achievement: Option<AchievementDefinition>,
}

/// A daily quest definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct QuestDefinition {
    /// Definition id.
    pub id: QuestDefinitionId,
    /// Title.
    pub title: String,
    /// Objective text.
    #[serde(default)]
    pub description: Option<String>,
    /// Progress needed to complete.
    pub target_amount: i64,
    /// Gold reward.
    #[serde(default)]
    pub reward_gold: Option<i64>,
    /// Gem reward.
    #[serde(default)]
    pub reward_gems: Option<i64>,
}

/// A quest assigned to the user for the current day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UserQuest {
    /// Assignment id.
    pub id: QuestId,
    /// Assignee.
    pub user_id: UserId,
    /// Progress so far.
    #[serde(default)]
    pub progress: i64,
    /// Whether the assignment is still in the active set.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Completion time, once completed.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// When the assignment lapses.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Joined definition. Present on every read the client performs.
    #[serde(default)]
    pub quest: Option<QuestDefinition>,
}

impl UserQuest {
    /// Progress as a whole percentage of the target, clamped to `0..=100`.
    pub fn percent_complete(&self) -> u8 {
        let Some(target) = self.quest.as_ref().map(|q| q.target_amount) else {
            return 0;
        };
        if target <= 0 {
            return 100;
        }
        let scaled = self.progress.clamp(0, target).saturating_mul(100);
        let percent = scaled.checked_div(target).unwrap_or(0);
        u8::try_from(percent).unwrap_or(100)
    }

    /// Whether the quest has been completed.
    pub const fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

const fn default_true() -> bool {
    true
}

/// A limited-time seasonal event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SeasonalEvent {
    /// Event id.
    pub id: SeasonalEventId,
    /// Title.
    pub name: String,
    /// Teaser text.
    #[serde(default)]
    pub description: Option<String>,
    /// Start.
    pub starts_at: DateTime<Utc>,
    /// End.
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    /// Whether the event is currently promoted.
    #[serde(default)]
    pub is_active: bool,
}

// ---------------------------------------------------------------------------
// Marketplace
// ---------------------------------------------------------------------------

/// Public details of a listing's seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SellerSummary {
    /// Display name.
    pub username: String,
    /// Cosmetic title.
    #[serde(default)]
    pub flair_title: Option<String>,
}

/// A marketplace listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MarketplaceListing {
    /// Listing id.
    pub id: ListingId,
    /// Seller.
    pub seller_id: UserId,
    /// Buyer, once sold.
    #[serde(default)]
    pub buyer_id: Option<UserId>,
    /// Collectible on offer.
    pub collectible_id: CollectibleId,
    /// Asking price in gold.
    #[serde(default)]
    pub price_gold: i64,
    /// Asking price in gems.
    #[serde(default)]
    pub price_gems: i64,
    /// Lifecycle state.
    #[serde(default)]
    pub status: ListingStatus,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Optional expiry.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Sale time.
    #[serde(default)]
    pub sold_at: Option<DateTime<Utc>>,
    /// Joined catalogue entry.
    #[serde(default)]
    pub collectible: Option<CollectibleDefinition>,
    /// Joined seller profile.
    #[serde(default)]
    pub seller: Option<SellerSummary>,
}

/// A condensed listing suggested to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MarketplaceSuggestion {
    /// Listing id.
    pub id: ListingId,
    /// Collectible name, or `Collectible` when unknown.
    pub title: String,
    /// Rarity, when known.
    pub rarity: Option<Rarity>,
    /// Price in gold.
    pub price_gold: i64,
    /// Price in gems.
    pub price_gems: i64,
    /// Seller name, or `Collector` when unknown.
    pub seller: String,
}

impl MarketplaceSuggestion {
    /// Condense a listing for the suggestions rail.
    pub fn from_listing(listing: &MarketplaceListing) -> Self {
        Self {
            id: listing.id,
            title: listing
                .collectible
                .as_ref()
                .map_or_else(|| "Collectible".to_owned(), |c| c.name.clone()),
            rarity: listing.collectible.as_ref().map(|c| c.rarity),
            price_gold: listing.price_gold,
            price_gems: listing.price_gems,
            seller: listing
                .seller
                .as_ref()
                .map_or_else(|| "Collector".to_owned(), |s| s.username.clone()),
        }
    }
}

/// A curated showcase entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ShowcaseEntry {
    /// Entry id.
    pub id: ShowcaseId,
    /// Sort key, lowest first.
    #[serde(default)]
    pub priority: i32,
    /// Curator's headline.
    #[serde(default)]
    pub headline: Option<String>,
    /// Joined catalogue entry.
    #[serde(default)]
    pub collectible: Option<CollectibleDefinition>,
}

// ---------------------------------------------------------------------------
// Redemption
// ---------------------------------------------------------------------------

/// A redemption code managed from the admin console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RedemptionCode {
    /// Code id.
    pub id: CodeId,
    /// The code users type.
    pub code: String,
    /// Rarity of the granted collectible.
    #[serde(default)]
    pub rarity: Option<Rarity>,
    /// Redemption cap.
    #[serde(default)]
    pub max_redemptions: Option<i64>,
    /// Redemptions so far.
    #[serde(default)]
    pub redemption_count: i64,
    /// Optional expiry.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Gold granted.
    #[serde(default)]
    pub reward_gold: i64,
    /// Gems granted.
    #[serde(default)]
    pub reward_gems: i64,
    /// Collectible granted.
    #[serde(default)]
    pub reward_collectible_id: Option<CollectibleId>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Whether the code can still be redeemed.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Currency granted alongside a redeemed collectible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CurrencyRewards {
    /// Gold granted.
    #[serde(default)]
    pub gold: Option<i64>,
    /// Gems granted.
    #[serde(default)]
    pub gems: Option<i64>,
}

/// Result of redeeming a code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RedeemReward {
    /// Collectible granted, if any.
    #[serde(default)]
    pub collectible: Option<CollectibleDefinition>,
    /// Currency granted, if any.
    #[serde(default)]
    pub currency_rewards: Option<CurrencyRewards>,
}

// ---------------------------------------------------------------------------
// UI
// ---------------------------------------------------------------------------

/// A transient notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Toast {
    /// Toast id.
    pub id: Uuid,
    /// Severity.
    pub level: ToastLevel,
    /// Text.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quest(progress: i64, target: i64) -> UserQuest {
        UserQuest {
            id: QuestId::new(),
            user_id: UserId::new(),
            progress,
            is_active: true,
            completed_at: None,
            expires_at: None,
            quest: Some(QuestDefinition {
                id: QuestDefinitionId::new(),
                title: "Trade twice".to_owned(),
                description: None,
                target_amount: target,
                reward_gold: Some(50),
                reward_gems: None,
            }),
        }
    }

    #[test]
    fn percent_complete_is_clamped() {
        assert_eq!(quest(0, 3).percent_complete(), 0);
        assert_eq!(quest(1, 3).percent_complete(), 33);
        assert_eq!(quest(5, 3).percent_complete(), 100);
        assert_eq!(quest(-2, 3).percent_complete(), 0);
    }

    #[test]
    fn owned_collectible_requires_catalogue_entry() {
        let row = UserCollectibleRow {
            id: AcquisitionId::new(),
            user_id: UserId::new(),
            acquired_at: Utc::now(),
            collectible: None,
        };
        assert!(OwnedCollectible::from_row(row).is_none());
    }

    #[test]
    fn owned_collectible_carries_rarity_label() {
        let row = UserCollectibleRow {
            id: AcquisitionId::new(),
            user_id: UserId::new(),
            acquired_at: Utc::now(),
            collectible: Some(CollectibleDefinition {
                id: CollectibleId::new(),
                name: "Aurora Wyrm".to_owned(),
                rarity: Rarity::Epic,
                lore: None,
                image_url: None,
                series: None,
            }),
        };
        let owned = OwnedCollectible::from_row(row);
        assert_eq!(owned.map(|c| c.rarity_label), Some("Epic".to_owned()));
    }

    #[test]
    fn ledger_entry_decodes_type_column() {
        let json = serde_json::json!({
            "id": LedgerEntryId::new(),
            "user_id": UserId::new(),
            "type": "quest_reward",
            "delta_gold": 120,
            "occurred_at": "2026-01-05T10:00:00Z"
        });
        let entry: Result<LedgerEntry, _> = serde_json::from_value(json);
        assert_eq!(entry.ok().map(|e| e.entry_type), Some(LedgerEntryType::QuestReward));
    }

    #[test]
    fn suggestion_falls_back_to_placeholders() {
        let listing = MarketplaceListing {
            id: ListingId::new(),
            seller_id: UserId::new(),
            buyer_id: None,
            collectible_id: CollectibleId::new(),
            price_gold: 10,
            price_gems: 0,
            status: ListingStatus::Active,
            created_at: None,
            expires_at: None,
            sold_at: None,
            collectible: None,
            seller: None,
        };
        let suggestion = MarketplaceSuggestion::from_listing(&listing);
        assert_eq!(suggestion.title, "Collectible");
        assert_eq!(suggestion.seller, "Collector");
    }
}
