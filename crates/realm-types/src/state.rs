//! The application state shape shared by the store and the view modules.
//!
//! The top-level keys are the contract between services (the only
//! writers) and modules (the only readers). Collections are held behind
//! [`Arc`] so that keys untouched by a patch are shared, by reference,
//! between consecutive snapshots.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::enums::{ConnectionStatus, Theme, View};
use crate::ids::UserId;
use crate::structs::{
    LedgerEntry, MarketplaceListing, MarketplaceSuggestion, OwnedCollectible, Profile,
    RedemptionCode, SeasonalEvent, Session, ShowcaseEntry, Toast, UserAchievement, UserQuest,
    Wallet,
};

/// Connectivity details shown by the status indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    /// Whether the device reports network connectivity.
    pub online: bool,
    /// Reachability of the backend.
    pub backend: ConnectionStatus,
    /// Last time any connection field changed.
    pub last_updated: DateTime<Utc>,
}

/// Presentation state of the shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiState {
    /// The view currently shown.
    pub active_view: View,
    /// Colour theme.
    pub theme: Theme,
    /// Pending notifications.
    pub toasts: Arc<Vec<Toast>>,
    /// Connectivity.
    pub connection: ConnectionState,
}

impl UiState {
    /// Copy with a different active view.
    #[must_use]
    pub fn with_view(&self, active_view: View) -> Self {
        Self {
            active_view,
            ..self.clone()
        }
    }

    /// Copy with a different theme.
    #[must_use]
    pub fn with_theme(&self, theme: Theme) -> Self {
        Self {
            theme,
            ..self.clone()
        }
    }

    /// Copy with a different connection block.
    #[must_use]
    pub fn with_connection(&self, connection: ConnectionState) -> Self {
        Self {
            connection,
            ..self.clone()
        }
    }
}

/// A complete snapshot of the client state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppState {
    /// Current auth session, absent when signed out.
    pub session: Option<Session>,
    /// Signed-in user's profile.
    pub profile: Option<Profile>,
    /// Collectibles held by the user, newest first.
    pub collectibles: Arc<Vec<OwnedCollectible>>,
    /// The user's balances.
    pub wallet: Option<Wallet>,
    /// Recent economy ledger entries, newest first.
    pub ledger: Arc<Vec<LedgerEntry>>,
    /// Earned achievements, newest first.
    pub achievements: Arc<Vec<UserAchievement>>,
    /// Active daily quests, soonest expiry first.
    pub quests: Arc<Vec<UserQuest>>,
    /// Active seasonal events.
    pub seasonal_events: Arc<Vec<SeasonalEvent>>,
    /// Active marketplace listings, newest first.
    pub marketplace_listings: Arc<Vec<MarketplaceListing>>,
    /// Listings suggested to the user.
    pub marketplace_suggestions: Arc<Vec<MarketplaceSuggestion>>,
    /// Curated showcase.
    pub marketplace_showcase: Arc<Vec<ShowcaseEntry>>,
    /// Redemption codes (admin console).
    pub admin_codes: Arc<Vec<RedemptionCode>>,
    /// Presentation state.
    pub ui: UiState,
}

impl AppState {
    /// The state a fresh client starts from.
    pub fn initial(online: bool, now: DateTime<Utc>) -> Self {
        Self {
            session: None,
            profile: None,
            collectibles: Arc::default(),
            wallet: None,
            ledger: Arc::default(),
            achievements: Arc::default(),
            quests: Arc::default(),
            seasonal_events: Arc::default(),
            marketplace_listings: Arc::default(),
            marketplace_suggestions: Arc::default(),
            marketplace_showcase: Arc::default(),
            admin_codes: Arc::default(),
            ui: UiState {
                active_view: View::Dashboard,
                theme: Theme::Light,
                toasts: Arc::default(),
                connection: ConnectionState {
                    online,
                    backend: ConnectionStatus::Checking,
                    last_updated: now,
                },
            },
        }
    }

    /// Id of the signed-in user, if any.
    pub fn user_id(&self) -> Option<UserId> {
        self.session.as_ref().map(Session::user_id)
    }

    /// Shallow merge: every key present in `patch` replaces the current
    /// value wholesale. Nested values are never merged.
    #[must_use]
    pub fn merged(&self, patch: AppStatePatch) -> Self {
        let current = self.clone();
        Self {
            session: patch.session.unwrap_or(current.session),
            profile: patch.profile.unwrap_or(current.profile),
            collectibles: patch.collectibles.unwrap_or(current.collectibles),
            wallet: patch.wallet.unwrap_or(current.wallet),
            ledger: patch.ledger.unwrap_or(current.ledger),
            achievements: patch.achievements.unwrap_or(current.achievements),
            quests: patch.quests.unwrap_or(current.quests),
            seasonal_events: patch.seasonal_events.unwrap_or(current.seasonal_events),
            marketplace_listings: patch
                .marketplace_listings
                .unwrap_or(current.marketplace_listings),
            marketplace_suggestions: patch
                .marketplace_suggestions
                .unwrap_or(current.marketplace_suggestions),
            marketplace_showcase: patch
                .marketplace_showcase
                .unwrap_or(current.marketplace_showcase),
            admin_codes: patch.admin_codes.unwrap_or(current.admin_codes),
            ui: patch.ui.unwrap_or(current.ui),
        }
    }
}

/// A partial [`AppState`]: one optional slot per top-level key.
///
/// Optional keys (`session`, `profile`, `wallet`) use a nested `Option` so
/// that a patch can clear them: `Some(None)` clears, `None` leaves alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppStatePatch {
    /// Replacement session.
    pub session: Option<Option<Session>>,
    /// Replacement profile.
    pub profile: Option<Option<Profile>>,
    /// Replacement collectibles.
    pub collectibles: Option<Arc<Vec<OwnedCollectible>>>,
    /// Replacement wallet.
    pub wallet: Option<Option<Wallet>>,
    /// Replacement ledger.
    pub ledger: Option<Arc<Vec<LedgerEntry>>>,
    /// Replacement achievements.
    pub achievements: Option<Arc<Vec<UserAchievement>>>,
    /// Replacement quests.
    pub quests: Option<Arc<Vec<UserQuest>>>,
    /// Replacement seasonal events.
    pub seasonal_events: Option<Arc<Vec<SeasonalEvent>>>,
    /// Replacement listings.
    pub marketplace_listings: Option<Arc<Vec<MarketplaceListing>>>,
    /// Replacement suggestions.
    pub marketplace_suggestions: Option<Arc<Vec<MarketplaceSuggestion>>>,
    /// Replacement showcase.
    pub marketplace_showcase: Option<Arc<Vec<ShowcaseEntry>>>,
    /// Replacement admin codes.
    pub admin_codes: Option<Arc<Vec<RedemptionCode>>>,
    /// Replacement UI block.
    pub ui: Option<UiState>,
}

impl AppStatePatch {
    /// An empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear the session.
    #[must_use]
    pub fn session(mut self, session: Option<Session>) -> Self {
        self.session = Some(session);
        self
    }

    /// Set or clear the profile.
    #[must_use]
    pub fn profile(mut self, profile: Option<Profile>) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Replace the collectibles.
    #[must_use]
    pub fn collectibles(mut self, collectibles: Vec<OwnedCollectible>) -> Self {
        self.collectibles = Some(Arc::new(collectibles));
        self
    }

    /// Set or clear the wallet.
    #[must_use]
    pub fn wallet(mut self, wallet: Option<Wallet>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    /// Replace the ledger.
    #[must_use]
    pub fn ledger(mut self, ledger: Vec<LedgerEntry>) -> Self {
        self.ledger = Some(Arc::new(ledger));
        self
    }

    /// Replace the achievements.
    #[must_use]
    pub fn achievements(mut self, achievements: Vec<UserAchievement>) -> Self {
        self.achievements = Some(Arc::new(achievements));
        self
    }

    /// Replace the quests.
    #[must_use]
    pub fn quests(mut self, quests: Vec<UserQuest>) -> Self {
        self.quests = Some(Arc::new(quests));
        self
    }

    /// Replace the seasonal events.
    #[must_use]
    pub fn seasonal_events(mut self, events: Vec<SeasonalEvent>) -> Self {
        self.seasonal_events = Some(Arc::new(events));
        self
    }

    /// Replace the listings.
    #[must_use]
    pub fn marketplace_listings(mut self, listings: Vec<MarketplaceListing>) -> Self {
        self.marketplace_listings = Some(Arc::new(listings));
        self
    }

    /// Replace the suggestions.
    #[must_use]
    pub fn marketplace_suggestions(mut self, suggestions: Vec<MarketplaceSuggestion>) -> Self {
        self.marketplace_suggestions = Some(Arc::new(suggestions));
        self
    }

    /// Replace the showcase.
    #[must_use]
    pub fn marketplace_showcase(mut self, showcase: Vec<ShowcaseEntry>) -> Self {
        self.marketplace_showcase = Some(Arc::new(showcase));
        self
    }

    /// Replace the admin codes.
    #[must_use]
    pub fn admin_codes(mut self, codes: Vec<RedemptionCode>) -> Self {
        self.admin_codes = Some(Arc::new(codes));
        self
    }

    /// Replace the UI block.
    #[must_use]
    pub fn ui(mut self, ui: UiState) -> Self {
        self.ui = Some(ui);
        self
    }

    /// The patch applied when the user signs out: every user-owned key is
    /// cleared, catalogue-wide keys are left alone.
    pub fn signed_out() -> Self {
        Self::new()
            .profile(None)
            .collectibles(Vec::new())
            .wallet(None)
            .ledger(Vec::new())
            .achievements(Vec::new())
            .quests(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::WalletId;

    fn wallet(gold: i64) -> Wallet {
        Wallet {
            id: WalletId::new(),
            user_id: UserId::new(),
            gold_balance: gold,
            gem_balance: 0,
            last_stipend_at: None,
        }
    }

    #[test]
    fn merge_replaces_only_present_keys() {
        let state = AppState::initial(true, Utc::now());
        let next = state.merged(AppStatePatch::new().wallet(Some(wallet(100))));
        assert_eq!(next.wallet.as_ref().map(|w| w.gold_balance), Some(100));
        assert!(Arc::ptr_eq(&state.collectibles, &next.collectibles));
        assert_eq!(state.ui, next.ui);
    }

    #[test]
    fn merge_can_clear_optional_keys() {
        let state =
            AppState::initial(true, Utc::now()).merged(AppStatePatch::new().wallet(Some(wallet(5))));
        let cleared = state.merged(AppStatePatch::new().wallet(None));
        assert!(cleared.wallet.is_none());
    }

    #[test]
    fn signed_out_patch_keeps_catalogue_keys() {
        let patch = AppStatePatch::signed_out();
        assert!(patch.marketplace_listings.is_none());
        assert!(patch.seasonal_events.is_none());
        assert_eq!(patch.wallet, Some(None));
    }

    #[test]
    fn ui_helpers_only_touch_their_field() {
        let ui = AppState::initial(false, Utc::now()).ui;
        let next = ui.with_view(View::Quests);
        assert_eq!(next.active_view, View::Quests);
        assert_eq!(next.theme, ui.theme);
        assert!(!next.connection.online);
    }
}
