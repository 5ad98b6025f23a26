//! Achievements, daily quests and seasonal events.
//!
//! Each loader short-circuits to an empty result when its feature flag is
//! off, without touching the store.

use chrono::Utc;
use realm_backend::{BackendError, Query};
use realm_types::{
    AppStatePatch, LedgerEntryType, QuestCompletion, QuestDefinition, QuestId, RealmEvent,
    SeasonalEvent, UserAchievement, UserId, UserQuest,
};
use serde_json::{Value, json};

use crate::context::ServiceContext;
use crate::economy::{BalanceDelta, EconomyService, LedgerReason};
use crate::error::ServiceError;

const SCOPE: &str = "engagement";
const QUESTS: &str = "user_daily_quests";
const QUEST_SELECT: &str = "*, quest:daily_quest_definitions(*)";

/// Remote procedure that tops up a user's active quests.
pub const ENSURE_QUESTS_RPC: &str = "ensure_daily_quests";

/// Engagement loops around the collection.
#[derive(Debug, Clone)]
pub struct EngagementService {
    ctx: ServiceContext,
    economy: EconomyService,
}

impl EngagementService {
    /// Create the service. Quest rewards are credited through `economy`.
    pub const fn new(ctx: ServiceContext, economy: EconomyService) -> Self {
        Self { ctx, economy }
    }

    /// Load earned achievements, newest first.
    pub async fn load_achievements(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserAchievement>, ServiceError> {
        if !self.ctx.config.features.achievements {
            return Ok(Vec::new());
        }
        let query = Query::table("user_achievements")
            .select("*, achievement:achievements(*)")
            .eq("user_id", user_id)
            .order("earned_at", false);
        let achievements: Vec<UserAchievement> = self
            .ctx
            .backend
            .select_as(&query)
            .await
            .map_err(|e| self.ctx.report(SCOPE, "load_achievements", "Failed to load achievements", e))?;
        self.ctx.store.patch(
            AppStatePatch::new().achievements(achievements.clone()),
            "achievements:loaded",
        );
        Ok(achievements)
    }

    /// Load active quests, soonest to expire first.
    pub async fn load_quests(&self, user_id: UserId) -> Result<Vec<UserQuest>, ServiceError> {
        if !self.ctx.config.features.quests {
            return Ok(Vec::new());
        }
        let query = Query::table(QUESTS)
            .select(QUEST_SELECT)
            .eq("user_id", user_id)
            .eq("is_active", true)
            .order("expires_at", true);
        let quests: Vec<UserQuest> = self
            .ctx
            .backend
            .select_as(&query)
            .await
            .map_err(|e| self.ctx.report(SCOPE, "load_quests", "Failed to load quests", e))?;
        self.ctx
            .store
            .patch(AppStatePatch::new().quests(quests.clone()), "quests:loaded");
        Ok(quests)
    }

    /// Store `progress` on a quest, completing it once the target is
    /// reached, then reload the quest log.
    pub async fn record_quest_progress(
        &self,
        user_id: UserId,
        quest_id: QuestId,
        progress: i64,
    ) -> Result<UserQuest, ServiceError> {
        let query = Query::table(QUESTS)
            .select(QUEST_SELECT)
            .eq("user_id", user_id)
            .eq("id", quest_id);
        let quest: UserQuest = self
            .ctx
            .backend
            .update_as::<UserQuest>(&query, json!({ "progress": progress, "updated_at": Utc::now() }))
            .await
            .and_then(|rows| first(rows, QUESTS))
            .map_err(|e| {
                self.ctx
                    .report(SCOPE, "record_quest_progress", "Failed to update quest progress", e)
            })?;

        let reached = quest
            .quest
            .as_ref()
            .filter(|definition| quest.progress >= definition.target_amount && !quest.is_completed());
        if let Some(definition) = reached {
            self.complete_quest(user_id, quest_id, definition).await?;
        }
        self.load_quests(user_id).await?;
        Ok(quest)
    }

    /// Mark a quest complete and credit its rewards.
    pub async fn complete_quest(
        &self,
        user_id: UserId,
        quest_id: QuestId,
        definition: &QuestDefinition,
    ) -> Result<UserQuest, ServiceError> {
        let query = Query::table(QUESTS).eq("id", quest_id).eq("user_id", user_id);
        let completed: UserQuest = self
            .ctx
            .backend
            .update_as::<UserQuest>(
                &query,
                json!({ "completed_at": Utc::now(), "progress": definition.target_amount }),
            )
            .await
            .and_then(|rows| first(rows, QUESTS))
            .map_err(|e| self.ctx.report(SCOPE, "complete_quest", "Failed to complete quest", e))?;

        let reward_gold = definition.reward_gold.unwrap_or(0);
        let reward_gems = definition.reward_gems.unwrap_or(0);
        self.economy
            .adjust_balance(
                user_id,
                BalanceDelta {
                    gold: reward_gold,
                    gems: reward_gems,
                },
                LedgerReason {
                    entry_type: LedgerEntryType::QuestReward,
                    description: Some(format!("Completed quest: {}", definition.title)),
                    reference_id: None,
                },
            )
            .await?;

        self.ctx
            .events
            .publish(&RealmEvent::QuestCompleted(QuestCompletion {
                quest_id,
                title: definition.title.clone(),
                reward_gold,
                reward_gems,
            }));
        tracing::info!(scope = SCOPE, quest = %definition.title, "Quest completed");
        Ok(completed)
    }

    /// Load active seasonal events in start order.
    pub async fn load_seasonal_spotlights(&self) -> Result<Vec<SeasonalEvent>, ServiceError> {
        if !self.ctx.config.features.seasonal_events {
            return Ok(Vec::new());
        }
        let query = Query::table("seasonal_events")
            .eq("is_active", true)
            .order("starts_at", true);
        let events: Vec<SeasonalEvent> = self
            .ctx
            .backend
            .select_as(&query)
            .await
            .map_err(|e| {
                self.ctx
                    .report(SCOPE, "load_seasonal_spotlights", "Failed to load seasonal events", e)
            })?;
        self.ctx
            .store
            .patch(AppStatePatch::new().seasonal_events(events.clone()), "seasonal:loaded");
        Ok(events)
    }

    /// Ask the backend to assign quests up to the configured maximum, then
    /// reload the quest log. Returns the procedure's result.
    pub async fn ensure_quests(&self, user_id: UserId) -> Result<Value, ServiceError> {
        if !self.ctx.config.features.quests {
            return Ok(Value::Array(Vec::new()));
        }
        let args = json!({
            "p_user_id": user_id,
            "p_max_active": self.ctx.config.quests.max_active_quests,
        });
        let result = self
            .ctx
            .backend
            .rpc(ENSURE_QUESTS_RPC, &args)
            .await
            .map_err(|e| self.ctx.report(SCOPE, "ensure_quests", "Failed to ensure quests", e))?;
        self.load_quests(user_id).await?;
        Ok(result)
    }
}

fn first<T>(rows: Vec<T>, table: &str) -> Result<T, BackendError> {
    rows.into_iter().next().ok_or_else(|| BackendError::NotFound {
        table: table.to_owned(),
    })
}
