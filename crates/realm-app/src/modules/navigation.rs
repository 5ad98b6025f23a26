//! Switching between views.

use futures::future::BoxFuture;
use realm_core::Module;
use realm_services::ServiceError;
use realm_types::{AppStatePatch, RealmEvent, View};

use crate::context::AppContext;

/// Owns `ui.active_view`.
#[derive(Debug)]
pub struct NavigationModule {
    ctx: AppContext,
}

impl NavigationModule {
    /// Create the module.
    pub fn new(ctx: &AppContext) -> anyhow::Result<Self> {
        Ok(Self { ctx: ctx.clone() })
    }

    /// Show `view` and announce it.
    pub fn navigate(&self, view: View) {
        self.ctx.store.update(
            |state| AppStatePatch::new().ui(state.ui.with_view(view)),
            "ui:view",
        );
        self.ctx.events.publish(&RealmEvent::ViewChanged(view));
    }

    /// Show the view named `key`.
    pub fn navigate_to(&self, key: &str) -> Result<View, ServiceError> {
        let view = View::parse(key)
            .ok_or_else(|| ServiceError::InvalidInput(format!("unknown view `{}`", key.trim())))?;
        self.navigate(view);
        Ok(view)
    }
}

impl Module for NavigationModule {
    fn init(&self) -> Option<BoxFuture<'_, anyhow::Result<()>>> {
        Some(Box::pin(async move {
            let current = self.ctx.store.state().ui.active_view;
            self.ctx.events.publish(&RealmEvent::ViewChanged(current));
            Ok(())
        }))
    }
}
