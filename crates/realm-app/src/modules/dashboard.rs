//! Wallet, quests, achievements and seasonal events at a glance.

use futures::future::BoxFuture;
use realm_core::config::UiCopy;
use realm_core::Module;
use realm_services::{ServiceError, StipendOutcome};
use realm_types::{AppState, RealmEvent, View};
use serde_json::Value;

use crate::context::AppContext;
use crate::modules::bind_view;
use crate::surface::{AchievementCard, DashboardFrame, QuestCard, RenderFrame, SeasonalCard};

/// The landing view.
#[derive(Debug)]
pub struct DashboardModule {
    ctx: AppContext,
}

impl DashboardModule {
    /// Subscribe to state and navigation.
    pub fn new(ctx: &AppContext) -> anyhow::Result<Self> {
        bind_view(ctx, View::Dashboard, draw);
        Ok(Self { ctx: ctx.clone() })
    }

    /// Claim the daily stipend, then ask for an economy refresh.
    pub async fn claim_stipend(&self) -> Result<StipendOutcome, ServiceError> {
        let user_id = self.ctx.require_user()?;
        let wallet = self.ctx.store.state().wallet.clone();
        let outcome = self
            .ctx
            .services
            .economy
            .grant_daily_stipend(user_id, wallet)
            .await?;
        self.ctx.events.publish(&RealmEvent::EconomyRefresh);
        Ok(outcome)
    }

    /// Top up the active quests.
    pub async fn refresh_quests(&self) -> Result<Value, ServiceError> {
        let user_id = self.ctx.require_user()?;
        self.ctx.services.engagement.ensure_quests(user_id).await
    }
}

impl Module for DashboardModule {
    fn init(&self) -> Option<BoxFuture<'_, anyhow::Result<()>>> {
        Some(Box::pin(async move {
            if self.ctx.is_active(View::Dashboard) {
                draw(&self.ctx, &self.ctx.store.state());
            }
            Ok(())
        }))
    }
}

fn draw(ctx: &AppContext, state: &AppState) {
    ctx.render(&RenderFrame::Dashboard(dashboard_frame(state, &ctx.config.ui_copy)));
}

/// Build the dashboard from `state`.
pub fn dashboard_frame(state: &AppState, copy: &UiCopy) -> DashboardFrame {
    let (gold, gems) = state
        .wallet
        .as_ref()
        .map_or((0, 0), |w| (w.gold_balance, w.gem_balance));
    DashboardFrame {
        welcome_title: copy.welcome_title.clone(),
        welcome_subtitle: copy.welcome_subtitle.clone(),
        display_name: state
            .profile
            .as_ref()
            .map_or_else(|| "Adventurer".to_owned(), |p| p.username.clone()),
        gold,
        gems,
        collection_power: state.collectibles.len(),
        quest_momentum: state.quests.iter().filter(|q| !q.is_completed()).count(),
        quests: state.quests.iter().map(QuestCard::from_quest).collect(),
        achievements: state
            .achievements
            .iter()
            .filter_map(|earned| earned.achievement.as_ref())
            .map(|a| AchievementCard {
                title: a.title.clone(),
                description: a.description.clone().unwrap_or_default(),
                icon: a.icon.clone().unwrap_or_else(|| "🏆".to_owned()),
            })
            .collect(),
        seasonal: state
            .seasonal_events
            .iter()
            .map(|e| SeasonalCard {
                name: e.name.clone(),
                description: e.description.clone().unwrap_or_default(),
                starts_at: e.starts_at,
                ends_at: e.ends_at,
            })
            .collect(),
    }
}
