//! Redemption code administration.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use realm_core::Module;
use realm_services::{NewCodeForm, ServiceError};
use realm_types::{AppState, CodeId, Rarity, RedemptionCode, View};

use crate::context::AppContext;
use crate::modules::bind_view;
use crate::surface::{AdminFrame, CodeRow, RenderFrame};

/// The admin console.
#[derive(Debug)]
pub struct AdminModule {
    ctx: AppContext,
    notice: Arc<Mutex<Option<String>>>,
}

impl AdminModule {
    /// Subscribe to state and navigation.
    pub fn new(ctx: &AppContext) -> anyhow::Result<Self> {
        let notice: Arc<Mutex<Option<String>>> = Arc::default();
        let shared = Arc::clone(&notice);
        bind_view(ctx, View::Admin, move |ctx, state| {
            draw(ctx, state, current(&shared));
        });
        Ok(Self {
            ctx: ctx.clone(),
            notice,
        })
    }

    /// Create a code from `form`.
    ///
    /// The outcome is also kept as the form's notice.
    pub async fn submit_code(&self, form: NewCodeForm) -> Result<RedemptionCode, ServiceError> {
        let result = match self.ctx.require_user() {
            Ok(_) => self.ctx.services.admin.create_redemption_code(form).await,
            Err(e) => Err(e),
        };
        let notice = match &result {
            Ok(code) => format!("Created code {}", code.code),
            Err(e) => e.to_string(),
        };
        self.set_notice(notice);
        result
    }

    /// Create a code from a JSON form body.
    pub async fn submit_json(&self, raw: &str) -> Result<RedemptionCode, ServiceError> {
        match NewCodeForm::from_json(raw) {
            Ok(form) => self.submit_code(form).await,
            Err(e) => {
                self.set_notice(e.to_string());
                Err(e)
            }
        }
    }

    /// Deactivate `code_id`.
    pub async fn deactivate(&self, code_id: CodeId) -> Result<RedemptionCode, ServiceError> {
        self.ctx.require_user()?;
        self.ctx.services.admin.deactivate_code(code_id).await
    }

    /// Message shown under the form.
    pub fn notice(&self) -> Option<String> {
        current(&self.notice)
    }

    fn set_notice(&self, notice: String) {
        *self.notice.lock().unwrap_or_else(PoisonError::into_inner) = Some(notice);
        if self.ctx.is_active(View::Admin) {
            draw(&self.ctx, &self.ctx.store.state(), self.notice());
        }
    }
}

impl Module for AdminModule {
    fn init(&self) -> Option<BoxFuture<'_, anyhow::Result<()>>> {
        Some(Box::pin(async move {
            if self.ctx.is_active(View::Admin) {
                draw(&self.ctx, &self.ctx.store.state(), self.notice());
            }
            Ok(())
        }))
    }
}

fn current(notice: &Mutex<Option<String>>) -> Option<String> {
    notice.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

fn draw(ctx: &AppContext, state: &AppState, notice: Option<String>) {
    ctx.render(&RenderFrame::Admin(admin_frame(state, notice)));
}

fn code_row(code: &RedemptionCode) -> CodeRow {
    let cap = code
        .max_redemptions
        .map_or_else(|| "∞".to_owned(), |cap| cap.to_string());
    CodeRow {
        id: code.id,
        code: code.code.clone(),
        rarity: code.rarity,
        redemptions: format!("{}/{cap}", code.redemption_count),
        expires_at: code.expires_at,
        reward_gold: code.reward_gold,
        reward_gems: code.reward_gems,
        active: code.is_active,
    }
}

/// Build the admin console from `state`.
pub fn admin_frame(state: &AppState, notice: Option<String>) -> AdminFrame {
    AdminFrame {
        codes: state.admin_codes.iter().map(code_row).collect(),
        rarities: Rarity::ALL.to_vec(),
        notice,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use realm_types::AppStatePatch;
    use serde_json::json;

    use super::*;

    fn code(cap: Option<i64>, count: i64) -> RedemptionCode {
        RedemptionCode {
            id: CodeId::new(),
            code: "FROST-1".into(),
            rarity: Some(Rarity::Epic),
            max_redemptions: cap,
            redemption_count: count,
            expires_at: None,
            reward_gold: 50,
            reward_gems: 0,
            reward_collectible_id: None,
            metadata: json!({}),
            is_active: true,
            created_at: None,
        }
    }

    #[test]
    fn redemptions_show_the_cap_or_infinity() {
        let state = AppState::initial(true, Utc::now())
            .merged(AppStatePatch::new().admin_codes(vec![code(Some(10), 3), code(None, 7)]));
        let frame = admin_frame(&state, Some("Created code FROST-1".into()));
        let counts: Vec<&str> = frame.codes.iter().map(|c| c.redemptions.as_str()).collect();
        assert_eq!(counts, ["3/10", "7/∞"]);
        assert_eq!(frame.rarities.len(), Rarity::ALL.len());
        assert_eq!(frame.notice.as_deref(), Some("Created code FROST-1"));
    }
}
