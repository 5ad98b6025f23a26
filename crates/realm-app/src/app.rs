//! Application bootstrap.
//!
//! [`App::bootstrap`] builds the store, bus and services, wires the
//! session and economy reactions, registers and initializes the view
//! modules, and finally starts following the auth session.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc};
use realm_backend::Backend;
use realm_core::{AppConfig, InitReport, LogHistory, Module, ModuleRegistry, RealmBus, RealmStore};
use realm_services::{ServiceContext, ServiceError, Services};
use realm_types::{events, AppState, AppStatePatch, RealmEvent, UserId};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::context::AppContext;
use crate::error::AppError;
use crate::modules::{
    self, AdminModule, CollectionModule, DashboardModule, LayoutModule, MarketplaceModule,
    NavigationModule, QuestModule, RedeemModule,
};
use crate::preferences::Preferences;
use crate::surface::{FooterFrame, Region, RenderFrame, Surface};

/// Ledger entries shown on the dashboard.
pub const LEDGER_PAGE: usize = 10;

/// A running client.
pub struct App {
    context: AppContext,
    registry: ModuleRegistry<AppContext>,
    report: InitReport,
    session_task: JoinHandle<()>,
    probe_task: Option<JoinHandle<()>>,
}

impl core::fmt::Debug for App {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("App")
            .field("modules", &self.registry.names())
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl App {
    /// Build and start the client.
    ///
    /// Must be called inside a tokio runtime. Module failures do not abort
    /// start-up; they are recorded in [`App::report`].
    pub async fn bootstrap(
        config: AppConfig,
        backend: Backend,
        surface: Arc<dyn Surface>,
        preferences: Preferences,
        history: LogHistory,
    ) -> Result<Self, AppError> {
        let runtime = Handle::try_current().map_err(|e| AppError::Runtime {
            message: e.to_string(),
        })?;

        let store = RealmStore::new(AppState::initial(true, Utc::now()));
        let events = RealmBus::new();
        let services = Services::new(ServiceContext::new(
            store,
            events,
            Arc::new(backend),
            Arc::new(config),
        ));
        let context = AppContext::new(services, surface, preferences, history, runtime);
        tracing::info!(
            scope = "app",
            backend = context.services.context.backend.name(),
            version = %context.config.app_version,
            "Starting client"
        );

        context.surface.render(
            Region::Footer,
            &RenderFrame::Footer(FooterFrame {
                year: Utc::now().year(),
                version: context.config.app_version.clone(),
            }),
        );

        wire_session(&context);
        wire_economy(&context);

        context.services.network.init(true).await;
        let interval = context.config.network.probe_interval_secs;
        let probe_task = (interval > 0)
            .then(|| context.services.network.spawn_probe(Duration::from_secs(interval)));

        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry);
        let report = registry.init_all(&context).await;
        if report.is_clean() {
            tracing::info!(scope = "app", modules = report.initialized.len(), "Modules initialized");
        } else {
            tracing::warn!(scope = "app", failed = report.failed.len(), "Some modules failed to start");
        }

        let session_task = context.services.session.hydrate();

        Ok(Self {
            context,
            registry,
            report,
            session_task,
            probe_task,
        })
    }

    /// Shared handles.
    pub const fn context(&self) -> &AppContext {
        &self.context
    }

    /// Outcome of module start-up.
    pub const fn report(&self) -> &InitReport {
        &self.report
    }

    /// Module registry.
    pub const fn registry(&self) -> &ModuleRegistry<AppContext> {
        &self.registry
    }

    /// Current state snapshot.
    pub fn state(&self) -> Arc<AppState> {
        self.context.store.state()
    }

    /// Wait for background loads to finish.
    pub async fn settle(&self) {
        self.context.settle().await;
    }

    /// Stop following the session and the connectivity probe.
    pub fn shutdown(&self) {
        self.session_task.abort();
        if let Some(probe) = &self.probe_task {
            probe.abort();
        }
        self.context.services.network.detach();
        tracing::info!(scope = "app", "Client stopped");
    }

    fn module<T: Module>(&self, name: &str) -> Result<Arc<T>, AppError> {
        self.registry.get(name).ok_or_else(|| AppError::ModuleUnavailable {
            name: name.to_owned(),
        })
    }

    /// The layout module.
    pub fn layout(&self) -> Result<Arc<LayoutModule>, AppError> {
        self.module("layout")
    }

    /// The navigation module.
    pub fn navigation(&self) -> Result<Arc<NavigationModule>, AppError> {
        self.module("navigation")
    }

    /// The dashboard module.
    pub fn dashboard(&self) -> Result<Arc<DashboardModule>, AppError> {
        self.module("dashboard")
    }

    /// The collection module.
    pub fn collection(&self) -> Result<Arc<CollectionModule>, AppError> {
        self.module("collection")
    }

    /// The redeem module.
    pub fn redeem(&self) -> Result<Arc<RedeemModule>, AppError> {
        self.module("redeem")
    }

    /// The marketplace module.
    pub fn marketplace(&self) -> Result<Arc<MarketplaceModule>, AppError> {
        self.module("marketplace")
    }

    /// The quest module.
    pub fn quests(&self) -> Result<Arc<QuestModule>, AppError> {
        self.module("quests")
    }

    /// The admin module.
    pub fn admin(&self) -> Result<Arc<AdminModule>, AppError> {
        self.module("admin")
    }
}

/// Load everything for a new session, clear it all on sign-out.
fn wire_session(ctx: &AppContext) {
    let app = ctx.clone();
    ctx.events.on(events::SESSION_CHANGED, move |event| {
        let RealmEvent::SessionChanged(session) = event else {
            return Ok(());
        };
        match session {
            None => app.store.patch(AppStatePatch::signed_out(), "session:cleared"),
            Some(session) => {
                let services = app.services.clone();
                let user_id = session.user_id();
                app.spawn("load_session", load_session(services, user_id));
            }
        }
        Ok(())
    });
}

/// Reload the wallet and ledger when something moved currency.
fn wire_economy(ctx: &AppContext) {
    let app = ctx.clone();
    ctx.events.on(events::ECONOMY_REFRESH, move |_| {
        let Some(user_id) = app.user_id() else {
            return Ok(());
        };
        let economy = app.services.economy.clone();
        app.spawn("refresh_economy", async move {
            economy.load_wallet(user_id).await?;
            economy.load_ledger(user_id, LEDGER_PAGE).await?;
            Ok(())
        });
        Ok(())
    });
}

async fn load_session(services: Services, user_id: UserId) -> Result<(), ServiceError> {
    let (
        profile,
        collectibles,
        wallet,
        ledger,
        achievements,
        quests,
        seasonal,
        market,
        showcase,
        codes,
    ) = futures::join!(
        services.profile.load_profile(user_id),
        services.collectibles.load_collectibles(Some(user_id)),
        services.economy.load_wallet(user_id),
        services.economy.load_ledger(user_id, LEDGER_PAGE),
        services.engagement.load_achievements(user_id),
        services.engagement.ensure_quests(user_id),
        services.engagement.load_seasonal_spotlights(),
        services.marketplace.load_marketplace(Some(user_id)),
        services.marketplace.load_curated_showcase(),
        services.admin.load_redemption_codes(),
    );
    let failures = [
        ("load_profile", profile.err()),
        ("load_collectibles", collectibles.err()),
        ("load_wallet", wallet.err()),
        ("load_ledger", ledger.err()),
        ("load_achievements", achievements.err()),
        ("ensure_quests", quests.err()),
        ("load_seasonal_spotlights", seasonal.err()),
        ("load_marketplace", market.err()),
        ("load_curated_showcase", showcase.err()),
        ("load_redemption_codes", codes.err()),
    ];
    let mut failed = 0_usize;
    for (action, error) in failures {
        if let Some(error) = error {
            failed = failed.saturating_add(1);
            tracing::warn!(scope = "app", action, error = %error, "Session load step failed");
        }
    }
    tracing::info!(scope = "app", user_id = %user_id, failed, "Session data loaded");
    Ok(())
}
