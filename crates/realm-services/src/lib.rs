//! Domain services of the Collectible Realm client.
//!
//! Services are the only writers of application state. Each one wraps
//! backend calls, patches the store with a named context, and publishes
//! cross-component events on the bus. Failures are logged with a scope and
//! action, surfaced to the caller as [`ServiceError`], and (for the
//! user-facing flows) announced on `backend:error`.
//!
//! # Modules
//!
//! - [`session`] -- sign in/up/out and session hydration
//! - [`profile`] -- user profiles
//! - [`collectibles`] -- the collection and code redemption
//! - [`economy`] -- wallets, ledger, stipend, conversions, purchases
//! - [`marketplace`] -- listings, purchases, suggestions, showcase
//! - [`engagement`] -- achievements, daily quests, seasonal events
//! - [`redeem`] -- redemption with currency rewards
//! - [`admin`] -- redemption code administration
//! - [`network`] -- connectivity and backend health
//! - [`forms`] -- validated user input

pub mod admin;
pub mod collectibles;
pub mod context;
pub mod economy;
pub mod engagement;
pub mod error;
pub mod forms;
pub mod marketplace;
pub mod network;
pub mod profile;
pub mod redeem;
pub mod session;

pub use admin::AdminService;
pub use collectibles::CollectiblesService;
pub use context::ServiceContext;
pub use economy::{BalanceDelta, EconomyService, LedgerReason, PurchaseCost, StipendOutcome};
pub use engagement::EngagementService;
pub use error::ServiceError;
pub use forms::{CredentialsForm, ListingForm, NewCodeForm, RedeemForm};
pub use marketplace::{MarketplaceService, MarketplaceSnapshot};
pub use network::NetworkService;
pub use profile::ProfileService;
pub use redeem::RedeemService;
pub use session::SessionService;

use std::sync::Arc;

/// Every service, wired to one shared context.
#[derive(Debug, Clone)]
pub struct Services {
    /// Shared handles the services were built from.
    pub context: ServiceContext,
    /// Auth session.
    pub session: SessionService,
    /// Profiles.
    pub profile: ProfileService,
    /// Collection.
    pub collectibles: CollectiblesService,
    /// Wallets and ledger.
    pub economy: EconomyService,
    /// Marketplace.
    pub marketplace: MarketplaceService,
    /// Achievements, quests, seasonal events.
    pub engagement: EngagementService,
    /// Code redemption.
    pub redeem: RedeemService,
    /// Code administration.
    pub admin: AdminService,
    /// Connectivity.
    pub network: NetworkService,
}

impl Services {
    /// Build every service from `context`.
    ///
    /// The network service starts following bus events immediately.
    pub fn new(context: ServiceContext) -> Self {
        let economy = EconomyService::new(context.clone());
        let collectibles = CollectiblesService::new(context.clone());
        Self {
            session: SessionService::new(context.clone()),
            profile: ProfileService::new(context.clone()),
            marketplace: MarketplaceService::new(context.clone(), economy.clone()),
            engagement: EngagementService::new(context.clone(), economy.clone()),
            redeem: RedeemService::new(context.clone(), collectibles.clone(), economy.clone()),
            admin: AdminService::new(context.clone()),
            network: NetworkService::new(
                context.store.clone(),
                context.events.clone(),
                Some(Arc::clone(&context.backend)),
            ),
            collectibles,
            economy,
            context,
        }
    }
}
