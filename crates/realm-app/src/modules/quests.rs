//! The quest log.

use futures::future::BoxFuture;
use realm_core::Module;
use realm_services::ServiceError;
use realm_types::{AppState, QuestId, RealmEvent, UserQuest, View};

use crate::context::AppContext;
use crate::modules::bind_view;
use crate::surface::{QuestCard, QuestLogFrame, RenderFrame};

/// Quest progress tracking.
#[derive(Debug)]
pub struct QuestModule {
    ctx: AppContext,
}

impl QuestModule {
    /// Subscribe to state and navigation.
    pub fn new(ctx: &AppContext) -> anyhow::Result<Self> {
        bind_view(ctx, View::Quests, draw);
        Ok(Self { ctx: ctx.clone() })
    }

    /// Advance `quest_id` by one step.
    pub async fn progress(&self, quest_id: QuestId) -> Result<UserQuest, ServiceError> {
        let user_id = self.ctx.require_user()?;
        let current = self
            .ctx
            .store
            .state()
            .quests
            .iter()
            .find(|quest| quest.id == quest_id)
            .map(|quest| quest.progress)
            .ok_or_else(|| ServiceError::InvalidInput(format!("unknown quest {quest_id}")))?;
        let quest = self
            .ctx
            .services
            .engagement
            .record_quest_progress(user_id, quest_id, current.saturating_add(1))
            .await?;
        self.ctx.events.publish(&RealmEvent::EconomyRefresh);
        Ok(quest)
    }
}

impl Module for QuestModule {
    fn init(&self) -> Option<BoxFuture<'_, anyhow::Result<()>>> {
        Some(Box::pin(async move {
            if self.ctx.is_active(View::Quests) {
                draw(&self.ctx, &self.ctx.store.state());
            }
            Ok(())
        }))
    }
}

fn draw(ctx: &AppContext, state: &AppState) {
    ctx.render(&RenderFrame::Quests(quest_log_frame(state)));
}

/// Build the quest log from `state`.
pub fn quest_log_frame(state: &AppState) -> QuestLogFrame {
    QuestLogFrame {
        quests: state.quests.iter().map(QuestCard::from_quest).collect(),
    }
}
