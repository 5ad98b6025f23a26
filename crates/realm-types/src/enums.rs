//! Enumeration types shared by the store, services, and view modules.
//!
//! Wire representations match the backend's column values (lowercase,
//! snake case) and the browser's view names.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Collectibles
// ---------------------------------------------------------------------------

/// Rarity tier of a collectible, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Rarity {
    /// Most frequently dropped tier.
    Common,
    /// Slightly scarcer than common.
    Uncommon,
    /// Scarce.
    Rare,
    /// Very scarce.
    Epic,
    /// Event-level drops.
    Legendary,
    /// The rarest tier.
    Mythic,
}

impl Rarity {
    /// Every rarity in ascending order.
    pub const ALL: [Self; 6] = [
        Self::Common,
        Self::Uncommon,
        Self::Rare,
        Self::Epic,
        Self::Legendary,
        Self::Mythic,
    ];

    /// Wire value, as stored in the backend.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
            Self::Mythic => "mythic",
        }
    }

    /// Title-cased label shown next to a collectible.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Common => "Common",
            Self::Uncommon => "Uncommon",
            Self::Rare => "Rare",
            Self::Epic => "Epic",
            Self::Legendary => "Legendary",
            Self::Mythic => "Mythic",
        }
    }

    /// Parse a wire value. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|rarity| rarity.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl core::fmt::Display for Rarity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Navigation and presentation
// ---------------------------------------------------------------------------

/// A top-level view of the shell. Exactly one view is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum View {
    /// Wallet, quests, achievements and seasonal events at a glance.
    #[default]
    Dashboard,
    /// The user's collectibles.
    Collection,
    /// Code redemption form.
    Redeem,
    /// Player-to-player trading.
    Marketplace,
    /// Daily quest log.
    Quests,
    /// Redemption code administration.
    Admin,
}

impl View {
    /// Every view in navigation order.
    pub const ALL: [Self; 6] = [
        Self::Dashboard,
        Self::Collection,
        Self::Redeem,
        Self::Marketplace,
        Self::Quests,
        Self::Admin,
    ];

    /// Navigation key (`data-nav` value in the browser).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Collection => "collection",
            Self::Redeem => "redeem",
            Self::Marketplace => "marketplace",
            Self::Quests => "quests",
            Self::Admin => "admin",
        }
    }

    /// Parse a navigation key.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|view| view.as_str() == value.trim())
    }
}

impl core::fmt::Display for View {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Colour theme of the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Theme {
    /// Light theme (default).
    #[default]
    Light,
    /// Dark theme.
    Dark,
}

impl Theme {
    /// The other theme.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    /// Persisted value.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Read a persisted value. Anything other than `dark` is light.
    pub fn from_persisted(value: Option<&str>) -> Self {
        match value {
            Some("dark") => Self::Dark,
            _ => Self::Light,
        }
    }
}

/// Severity of a toast notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ToastLevel {
    /// Informational.
    Info,
    /// Something went well.
    Success,
    /// Something failed.
    Error,
}

// ---------------------------------------------------------------------------
// Connectivity
// ---------------------------------------------------------------------------

/// Reachability of the backend as shown by the status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum ConnectionStatus {
    /// Last probe or session change succeeded.
    Connected,
    /// A health probe is in flight.
    #[default]
    Checking,
    /// The last probe or a backend call failed.
    Error,
    /// The device reported it is offline.
    Offline,
    /// No backend client is configured, so nothing can be probed.
    Unknown,
    /// The backend is reachable but nobody is signed in.
    AuthOnly,
}

impl ConnectionStatus {
    /// Wire value used by the status indicator.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Checking => "checking",
            Self::Error => "error",
            Self::Offline => "offline",
            Self::Unknown => "unknown",
            Self::AuthOnly => "auth-only",
        }
    }
}

// ---------------------------------------------------------------------------
// Economy and marketplace
// ---------------------------------------------------------------------------

/// Cause of a wallet movement recorded in the economy ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum LedgerEntryType {
    /// Daily realm stipend.
    Stipend,
    /// Generic balance adjustment.
    Adjustment,
    /// A duplicate collectible converted into currency.
    Conversion,
    /// Payment for a marketplace listing.
    MarketplacePurchase,
    /// Reward for completing a quest.
    QuestReward,
    /// Currency granted by a redemption code.
    RedeemReward,
}

/// Lifecycle of a marketplace listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ListingStatus {
    /// Open for purchase.
    #[default]
    Active,
    /// Bought by another user.
    Sold,
    /// Withdrawn by the seller.
    Cancelled,
    /// Passed its expiry date.
    Expired,
}

impl ListingStatus {
    /// Wire value used in backend filters.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Sold => "sold",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

/// Kind of auth state change reported by the auth service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum AuthEvent {
    /// A user signed in.
    SignedIn,
    /// The user signed out.
    SignedOut,
    /// The access token was refreshed.
    TokenRefreshed,
    /// The user's account details changed.
    UserUpdated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rarity_round_trips_through_wire_value() {
        for rarity in Rarity::ALL {
            assert_eq!(Rarity::parse(rarity.as_str()), Some(rarity));
        }
        assert_eq!(Rarity::parse(" Legendary "), Some(Rarity::Legendary));
        assert_eq!(Rarity::parse("shiny"), None);
    }

    #[test]
    fn rarity_is_ordered_by_scarcity() {
        assert!(Rarity::Common < Rarity::Mythic);
        assert!(Rarity::Rare < Rarity::Epic);
    }

    #[test]
    fn connection_status_uses_kebab_case() {
        let json = serde_json::to_string(&ConnectionStatus::AuthOnly).unwrap_or_default();
        assert_eq!(json, "\"auth-only\"");
        assert_eq!(ConnectionStatus::AuthOnly.as_str(), "auth-only");
    }

    #[test]
    fn theme_defaults_to_light_for_unknown_values() {
        assert_eq!(Theme::from_persisted(Some("dark")), Theme::Dark);
        assert_eq!(Theme::from_persisted(Some("solarized")), Theme::Light);
        assert_eq!(Theme::from_persisted(None), Theme::Light);
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
    }

    #[test]
    fn ledger_entry_type_matches_backend_values() {
        let json = serde_json::to_string(&LedgerEntryType::MarketplacePurchase).unwrap_or_default();
        assert_eq!(json, "\"marketplace_purchase\"");
    }

    #[test]
    fn view_parses_navigation_keys() {
        assert_eq!(View::parse("marketplace"), Some(View::Marketplace));
        assert_eq!(View::parse("settings"), None);
    }
}
