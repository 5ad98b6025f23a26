//! View modules, one per region of the shell.
//!
//! Every module is built by a factory from the [`AppContext`], subscribes
//! to the store and bus in its constructor, and draws only while its view
//! is active. Gestures are plain methods returning the service result, so
//! the caller decides how to show failures.

pub mod admin;
pub mod collection;
pub mod dashboard;
pub mod layout;
pub mod marketplace;
pub mod navigation;
pub mod quests;
pub mod redeem;

pub use admin::AdminModule;
pub use collection::CollectionModule;
pub use dashboard::DashboardModule;
pub use layout::LayoutModule;
pub use marketplace::MarketplaceModule;
pub use navigation::NavigationModule;
pub use quests::QuestModule;
pub use redeem::RedeemModule;

use std::sync::Arc;

use realm_core::ModuleRegistry;
use realm_types::{events, AppState, RealmEvent, View};

use crate::context::AppContext;

/// Registration names in start-up order.
pub const MODULE_ORDER: [&str; 8] = [
    "layout",
    "navigation",
    "dashboard",
    "collection",
    "redeem",
    "marketplace",
    "quests",
    "admin",
];

/// Register every view module in start-up order.
pub fn register_all(registry: &mut ModuleRegistry<AppContext>) {
    registry.register("layout", LayoutModule::new);
    registry.register("navigation", NavigationModule::new);
    registry.register("dashboard", DashboardModule::new);
    registry.register("collection", CollectionModule::new);
    registry.register("redeem", RedeemModule::new);
    registry.register("marketplace", MarketplaceModule::new);
    registry.register("quests", QuestModule::new);
    registry.register("admin", AdminModule::new);
}

/// Redraw with `draw` on every state change while `view` is active, and
/// whenever navigation switches to `view`.
pub(crate) fn bind_view<F>(ctx: &AppContext, view: View, draw: F)
where
    F: Fn(&AppContext, &AppState) + Send + Sync + 'static,
{
    let draw = Arc::new(draw);

    let on_change = ctx.clone();
    let redraw = Arc::clone(&draw);
    ctx.store.subscribe(move |change| {
        if on_change.is_active(view) {
            redraw(&on_change, &change.state);
        }
        Ok(())
    });

    let on_view = ctx.clone();
    ctx.events.on(events::VIEW_CHANGED, move |event| {
        if matches!(event, RealmEvent::ViewChanged(target) if *target == view) {
            draw(&on_view, &on_view.store.state());
        }
        Ok(())
    });
}
