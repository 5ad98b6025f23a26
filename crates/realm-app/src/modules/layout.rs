//! Shell chrome: theme, signed-out placeholder and status pill.

use futures::future::BoxFuture;
use realm_core::Module;
use realm_types::{events, AppStatePatch, RealmEvent, Theme};

use crate::context::AppContext;
use crate::error::AppError;
use crate::surface::{RenderFrame, SIGNED_OUT_MESSAGE};

/// Theme handling and the signed-out placeholder.
#[derive(Debug)]
pub struct LayoutModule {
    ctx: AppContext,
}

impl LayoutModule {
    /// Subscribe to session state.
    pub fn new(ctx: &AppContext) -> anyhow::Result<Self> {
        let placeholder = ctx.clone();
        ctx.store.subscribe(move |change| {
            if change.state.session.is_none() {
                placeholder.render(&RenderFrame::SignedOut {
                    message: SIGNED_OUT_MESSAGE.to_owned(),
                });
            }
            Ok(())
        });

        let pill = ctx.clone();
        ctx.events.on(events::SESSION_CHANGED, move |event| {
            if let RealmEvent::SessionChanged(session) = event {
                let connected = session.is_some();
                let label = if connected { "Connected" } else { "Disconnected" };
                pill.surface.set_status_pill(label, connected);
            }
            Ok(())
        });

        Ok(Self { ctx: ctx.clone() })
    }

    fn apply_theme(&self, theme: Theme) {
        self.ctx.store.update(
            |state| AppStatePatch::new().ui(state.ui.with_theme(theme)),
            "ui:theme",
        );
        self.ctx.surface.set_theme(theme);
    }

    /// Switch between light and dark, persisting the choice.
    pub fn toggle_theme(&self) -> Result<Theme, AppError> {
        let next = self.ctx.store.state().ui.theme.toggled();
        self.ctx.preferences.set_theme(next)?;
        self.apply_theme(next);
        Ok(next)
    }
}

impl Module for LayoutModule {
    fn init(&self) -> Option<BoxFuture<'_, anyhow::Result<()>>> {
        Some(Box::pin(async move {
            self.apply_theme(self.ctx.preferences.theme());
            Ok(())
        }))
    }
}
