//! Bootstrap and view-module flows against the demo realm.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::missing_panics_doc
)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use realm_app::demo::{demo_backend, DEMO_CODE, DEMO_EMAIL, DEMO_PASSWORD};
use realm_app::modules::MODULE_ORDER;
use realm_app::shell::{self, Command, Reply};
use realm_app::surface::{RedeemFeedback, SIGNED_OUT_MESSAGE};
use realm_app::{App, Preferences, RecordingSurface, Region, RenderFrame};
use realm_backend::{Backend, MemoryBackend};
use realm_core::{AppConfig, LogHistory};
use realm_types::{events, AppState, RealmEvent, Theme, View};

struct Harness {
    app: App,
    memory: MemoryBackend,
    surface: RecordingSurface,
}

fn quiet_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.network.probe_interval_secs = 0;
    config
}

async fn start_with(preferences: Preferences) -> Harness {
    let memory = demo_backend();
    let surface = RecordingSurface::new();
    let app = App::bootstrap(
        quiet_config(),
        Backend::Memory(memory.clone()),
        Arc::new(surface.clone()),
        preferences,
        LogHistory::new(50),
    )
    .await
    .unwrap();
    Harness {
        app,
        memory,
        surface,
    }
}

async fn start() -> Harness {
    start_with(Preferences::in_memory()).await
}

impl Harness {
    /// Poll until `check` holds, letting background loads finish between tries.
    async fn eventually(&self, what: &str, check: impl Fn(&AppState) -> bool) {
        for _ in 0..100 {
            self.app.settle().await;
            if check(&self.app.state()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {what}");
    }

    async fn sign_in(&self) {
        self.app
            .context()
            .services
            .session
            .sign_in(DEMO_EMAIL, DEMO_PASSWORD)
            .await
            .unwrap();
        self.eventually("session data", |state| {
            state.wallet.is_some() && state.quests.len() == 3 && state.marketplace_listings.len() == 3
        })
        .await;
    }

    fn record(&self, channel: &str) -> Arc<Mutex<Vec<RealmEvent>>> {
        let seen: Arc<Mutex<Vec<RealmEvent>>> = Arc::default();
        let sink = Arc::clone(&seen);
        self.app.context().events.on(channel, move |event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });
        seen
    }

    fn gold(&self) -> i64 {
        self.app.state().wallet.as_ref().map_or(0, |w| w.gold_balance)
    }
}

#[tokio::test]
async fn bootstrap_starts_every_module_in_order() {
    let h = start().await;

    assert!(h.app.report().is_clean());
    assert_eq!(h.app.report().initialized, MODULE_ORDER);
    assert_eq!(h.app.registry().names(), MODULE_ORDER);

    match h.surface.last(Region::Footer) {
        Some(RenderFrame::Footer(footer)) => assert_eq!(footer.version, "2.0.0"),
        other => panic!("unexpected footer {other:?}"),
    }
    assert!(h.surface.count(View::Dashboard) >= 1);
    assert_eq!(h.app.state().ui.active_view, View::Dashboard);
}

#[tokio::test]
async fn signed_out_shell_shows_the_placeholder() {
    let h = start().await;
    assert!(h.surface.frames().iter().any(|(region, frame)| {
        *region == Region::Main
            && *frame
                == RenderFrame::SignedOut {
                    message: SIGNED_OUT_MESSAGE.to_owned(),
                }
    }));
}

#[tokio::test]
async fn stored_theme_is_restored_and_toggles_persist() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.json");
    Preferences::open(&path).unwrap().set_theme(Theme::Dark).unwrap();

    let h = start_with(Preferences::open(&path).unwrap()).await;
    assert_eq!(h.surface.theme(), Some(Theme::Dark));
    assert_eq!(h.app.state().ui.theme, Theme::Dark);

    let next = h.app.layout().unwrap().toggle_theme().unwrap();
    assert_eq!(next, Theme::Light);
    assert_eq!(h.surface.theme(), Some(Theme::Light));
    assert_eq!(Preferences::open(&path).unwrap().theme(), Theme::Light);
}

#[tokio::test]
async fn navigation_draws_the_target_view() {
    let h = start().await;
    let views = h.record(events::VIEW_CHANGED);
    h.surface.clear();

    h.app.navigation().unwrap().navigate(View::Collection);

    assert_eq!(h.app.state().ui.active_view, View::Collection);
    assert!(matches!(
        h.surface.last(Region::Main),
        Some(RenderFrame::Collection(_))
    ));
    assert_eq!(
        *views.lock().unwrap(),
        vec![RealmEvent::ViewChanged(View::Collection)]
    );
    assert!(h.app.navigation().unwrap().navigate_to("attic").is_err());
}

#[tokio::test]
async fn signing_in_loads_the_whole_session() {
    let h = start().await;
    h.sign_in().await;

    let state = h.app.state();
    assert_eq!(
        state.profile.as_ref().map(|p| p.username.as_str()),
        Some("Lantern Keeper")
    );
    assert_eq!(state.collectibles.len(), 3);
    assert_eq!(h.gold(), 250);
    assert_eq!(state.seasonal_events.len(), 1);
    assert_eq!(state.marketplace_showcase.len(), 1);
    assert_eq!(state.admin_codes.len(), 1);
    assert_eq!(
        h.surface.status_pill(),
        Some(("Connected".to_owned(), true))
    );

    match h.surface.last(Region::Main) {
        Some(RenderFrame::Dashboard(frame)) => {
            assert_eq!(frame.display_name, "Lantern Keeper");
            assert_eq!(frame.quests.len(), 3);
        }
        other => panic!("unexpected frame {other:?}"),
    }
}

#[tokio::test]
async fn signing_out_clears_user_data() {
    let h = start().await;
    h.sign_in().await;

    h.app.context().services.session.sign_out().await.unwrap();
    h.eventually("cleared state", |state| {
        state.session.is_none() && state.wallet.is_none() && state.collectibles.is_empty()
    })
    .await;

    assert_eq!(
        h.surface.status_pill(),
        Some(("Disconnected".to_owned(), false))
    );
    assert!(h.app.state().quests.is_empty());
}

#[tokio::test]
async fn redeem_feedback_follows_the_outcome() {
    let h = start().await;
    let redeem = h.app.redeem().unwrap();
    assert_eq!(redeem.submit(DEMO_CODE).await, RedeemFeedback::SignedOut);

    h.sign_in().await;
    h.app.navigation().unwrap().navigate(View::Redeem);

    let feedback = redeem.submit("welcome-realm").await;
    assert_eq!(
        feedback,
        RedeemFeedback::Success("Success! Copper Finch".to_owned())
    );
    match h.surface.last(Region::Main) {
        Some(RenderFrame::Redeem(frame)) => assert_eq!(frame.feedback, Some(feedback)),
        other => panic!("unexpected frame {other:?}"),
    }
    h.eventually("reward credited", |state| {
        state.collectibles.len() == 4 && state.wallet.as_ref().is_some_and(|w| w.gold_balance == 350)
    })
    .await;

    let failure = redeem.submit("NO-SUCH-CODE").await;
    assert!(matches!(&failure, RedeemFeedback::Failure(message) if message.contains("Code not found")));
}

#[tokio::test]
async fn purchase_charges_the_buyer_and_refreshes_the_economy() {
    let h = start().await;
    h.sign_in().await;
    let refreshes = h.record(events::ECONOMY_REFRESH);

    let lantern = h
        .app
        .state()
        .marketplace_listings
        .iter()
        .find(|l| l.price_gold == 35)
        .map(|l| l.id)
        .unwrap();
    let bought = h.app.marketplace().unwrap().purchase(lantern).await.unwrap();

    assert_eq!(bought.id, lantern);
    assert_eq!(refreshes.lock().unwrap().len(), 1);
    h.eventually("wallet charged", |state| {
        state.wallet.as_ref().is_some_and(|w| w.gold_balance == 215)
            && state.marketplace_listings.len() == 2
    })
    .await;
    assert_eq!(h.memory.rows("marketplace_transactions").len(), 1);
}

#[tokio::test]
async fn marketplace_sort_is_limited_to_offered_options() {
    let h = start().await;
    h.sign_in().await;
    h.app.navigation().unwrap().navigate(View::Marketplace);
    let market = h.app.marketplace().unwrap();

    market.set_sort("priceAsc").unwrap();
    match h.surface.last(Region::Main) {
        Some(RenderFrame::Marketplace(frame)) => {
            let prices: Vec<i64> = frame.listings.iter().map(|l| l.price_gold).collect();
            assert_eq!(prices, [35, 120, 300]);
        }
        other => panic!("unexpected frame {other:?}"),
    }
    assert!(market.set_sort("alphabetical").is_err());
}

#[tokio::test]
async fn duplicates_convert_into_currency() {
    let h = start().await;
    h.sign_in().await;
    let copy = h
        .app
        .state()
        .collectibles
        .iter()
        .find(|c| c.name == "Moss Sprite")
        .map(|c| c.acquisition_id)
        .unwrap();

    let wallet = h
        .app
        .collection()
        .unwrap()
        .convert_duplicate(copy)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(wallet.gold_balance, 275);
}

#[tokio::test]
async fn shell_commands_drive_the_modules() {
    let h = start().await;
    let run = |line: &str| Command::parse(line).unwrap().unwrap();

    let reply = shell::execute(&h.app, run("view quests")).await.unwrap();
    assert_eq!(reply, Reply::Continue("showing quests".to_owned()));
    assert_eq!(h.app.state().ui.active_view, View::Quests);

    let reply = shell::execute(&h.app, run("stipend")).await.unwrap();
    assert_eq!(reply, Reply::Continue("error: sign in to continue".to_owned()));

    let reply = shell::execute(&h.app, run("quit")).await.unwrap();
    assert_eq!(reply, Reply::Quit);
}

#[tokio::test]
async fn admin_notice_reports_created_codes() {
    let h = start().await;
    h.sign_in().await;
    let admin = h.app.admin().unwrap();

    let code = admin
        .submit_json(r#"{"code": "harvest-moon", "reward_gold": 20, "max_redemptions": 5}"#)
        .await
        .unwrap();

    assert_eq!(code.code, "HARVEST-MOON");
    assert_eq!(admin.notice().as_deref(), Some("Created code HARVEST-MOON"));
    assert_eq!(h.app.state().admin_codes.len(), 2);

    assert!(admin.submit_json("{not json").await.is_err());
    assert!(admin.notice().is_some_and(|n| n.starts_with("invalid input")));
}
