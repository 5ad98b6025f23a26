//! Shared type definitions for the Collectible Realm client.
//!
//! This crate is the single source of truth for the records the client
//! exchanges with its backend, the application state shape held by the
//! store, and the events published on the bus. Record types flow to
//! `TypeScript` via `ts-rs` for the browser view layer.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for every backend row
//! - [`enums`] -- Rarity, views, theme, connection status, ledger types
//! - [`structs`] -- Backend records (wallets, quests, listings, codes, ...)
//! - [`state`] -- [`AppState`] and its shallow-merge [`AppStatePatch`]
//! - [`events`] -- Bus channel names and [`RealmEvent`] payloads

pub mod enums;
pub mod events;
pub mod ids;
pub mod state;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{
    AuthEvent, ConnectionStatus, LedgerEntryType, ListingStatus, Rarity, Theme, ToastLevel, View,
};
pub use events::{BackendFailure, QuestCompletion, RealmEvent};
pub use ids::{
    AchievementId, AcquisitionId, CodeId, CollectibleId, LedgerEntryId, ListingId,
    QuestDefinitionId, QuestId, SeasonalEventId, ShowcaseId, UserId, WalletId,
};
pub use state::{AppState, AppStatePatch, ConnectionState, UiState};
pub use structs::{
    AchievementDefinition, CollectibleDefinition, CurrencyRewards, LedgerEntry,
    MarketplaceListing, MarketplaceSuggestion, NewLedgerEntry, OwnedCollectible, Profile,
    QuestDefinition, RedeemReward, RedemptionCode, SeasonalEvent, SellerSummary, Session,
    ShowcaseEntry, Toast, User, UserAchievement, UserCollectibleRow, UserQuest, Wallet,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the browser view layer.

    #[test]
    fn export_bindings() {
        // ts-rs writes bindings for types with #[ts(export)] to the
        // `bindings/` directory relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::UserId::export_all();
        let _ = crate::ids::CollectibleId::export_all();
        let _ = crate::ids::AcquisitionId::export_all();
        let _ = crate::ids::ListingId::export_all();
        let _ = crate::ids::QuestId::export_all();
        let _ = crate::ids::CodeId::export_all();

        // Enums
        let _ = crate::enums::Rarity::export_all();
        let _ = crate::enums::View::export_all();
        let _ = crate::enums::Theme::export_all();
        let _ = crate::enums::ConnectionStatus::export_all();
        let _ = crate::enums::LedgerEntryType::export_all();
        let _ = crate::enums::ListingStatus::export_all();

        // Records
        let _ = crate::structs::Session::export_all();
        let _ = crate::structs::Profile::export_all();
        let _ = crate::structs::OwnedCollectible::export_all();
        let _ = crate::structs::Wallet::export_all();
        let _ = crate::structs::LedgerEntry::export_all();
        let _ = crate::structs::UserAchievement::export_all();
        let _ = crate::structs::UserQuest::export_all();
        let _ = crate::structs::SeasonalEvent::export_all();
        let _ = crate::structs::MarketplaceListing::export_all();
        let _ = crate::structs::MarketplaceSuggestion::export_all();
        let _ = crate::structs::ShowcaseEntry::export_all();
        let _ = crate::structs::RedemptionCode::export_all();
        let _ = crate::structs::RedeemReward::export_all();
        let _ = crate::structs::Toast::export_all();
    }
}
