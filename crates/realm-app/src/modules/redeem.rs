//! The redeem form.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use realm_core::Module;
use realm_types::{RealmEvent, View};

use crate::context::AppContext;
use crate::modules::bind_view;
use crate::surface::{RedeemFeedback, RedeemFrame, RenderFrame};

/// Code redemption with inline feedback.
#[derive(Debug)]
pub struct RedeemModule {
    ctx: AppContext,
    feedback: Arc<Mutex<Option<RedeemFeedback>>>,
}

impl RedeemModule {
    /// Subscribe to navigation.
    pub fn new(ctx: &AppContext) -> anyhow::Result<Self> {
        let feedback: Arc<Mutex<Option<RedeemFeedback>>> = Arc::default();
        let shared = Arc::clone(&feedback);
        bind_view(ctx, View::Redeem, move |ctx, _| draw(ctx, &shared));
        Ok(Self {
            ctx: ctx.clone(),
            feedback,
        })
    }

    /// Redeem `code` for the signed-in user.
    ///
    /// Never fails: the outcome is returned and shown under the form.
    pub async fn submit(&self, code: &str) -> RedeemFeedback {
        let feedback = match self.ctx.user_id() {
            None => RedeemFeedback::SignedOut,
            Some(user_id) => match self.ctx.services.redeem.redeem(user_id, code).await {
                Ok(reward) => {
                    self.ctx.events.publish(&RealmEvent::EconomyRefresh);
                    let name = reward
                        .collectible
                        .map_or_else(|| "Reward delivered.".to_owned(), |c| c.name);
                    RedeemFeedback::Success(format!("Success! {name}"))
                }
                Err(error) => RedeemFeedback::Failure(error.to_string()),
            },
        };

        *self.feedback.lock().unwrap_or_else(PoisonError::into_inner) = Some(feedback.clone());
        if self.ctx.is_active(View::Redeem) {
            draw(&self.ctx, &self.feedback);
        }
        feedback
    }
}

impl Module for RedeemModule {
    fn init(&self) -> Option<BoxFuture<'_, anyhow::Result<()>>> {
        Some(Box::pin(async move {
            if self.ctx.is_active(View::Redeem) {
                draw(&self.ctx, &self.feedback);
            }
            Ok(())
        }))
    }
}

fn draw(ctx: &AppContext, feedback: &Mutex<Option<RedeemFeedback>>) {
    let feedback = feedback
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    ctx.render(&RenderFrame::Redeem(RedeemFrame { feedback }));
}
