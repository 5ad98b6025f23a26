//! Behavioural properties of the store, bus and registry working on the
//! real application state.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::missing_panics_doc
)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::future::BoxFuture;
use realm_core::{
    Change, EventBus, Module, ModuleRegistry, RealmStore, Shared, Store, UpdateContext,
};
use realm_types::{AppState, AppStatePatch, Theme, UserId, View, Wallet, WalletId};

fn wallet(gold: i64, gems: i64) -> Wallet {
    Wallet {
        id: WalletId::new(),
        user_id: UserId::new(),
        gold_balance: gold,
        gem_balance: gems,
        last_stipend_at: None,
    }
}

fn store_with_wallet(gold: i64, gems: i64) -> RealmStore {
    let initial = AppState::initial(true, Utc::now())
        .merged(AppStatePatch::new().wallet(Some(wallet(gold, gems))));
    Store::new(initial)
}

#[test]
fn patch_leaves_previous_snapshot_untouched() {
    let store = store_with_wallet(0, 0);
    let before = store.state();

    let mut richer = before.wallet.clone().unwrap();
    richer.gold_balance = 100;
    store.patch(AppStatePatch::new().wallet(Some(richer)), "economy:wallet");

    let after = store.state();
    let gold_after = after.wallet.as_ref().map(|w| (w.gold_balance, w.gem_balance));
    let gold_before = before.wallet.as_ref().map(|w| (w.gold_balance, w.gem_balance));
    assert_eq!(gold_after, Some((100, 0)));
    assert_eq!(gold_before, Some((0, 0)));
    assert!(!Arc::ptr_eq(&before, &after));
}

#[test]
fn sequence_of_mutations_is_the_cumulative_shallow_merge() {
    let store = store_with_wallet(0, 0);
    let initial = store.state();

    store.patch(
        AppStatePatch::new().ui(initial.ui.with_view(View::Quests)),
        "ui:view",
    );
    store.update(
        |state| AppStatePatch::new().ui(state.ui.with_theme(Theme::Dark)),
        "ui:theme",
    );
    store.patch(AppStatePatch::new().wallet(Some(wallet(7, 1))), "wallet");
    store.update(
        |state| {
            let mut wallet = state.wallet.clone().unwrap();
            wallet.gold_balance += 3;
            AppStatePatch::new().wallet(Some(wallet))
        },
        "wallet",
    );

    let state = store.state();
    assert_eq!(state.ui.active_view, View::Quests);
    assert_eq!(state.ui.theme, Theme::Dark);
    assert_eq!(state.wallet.as_ref().map(|w| w.gold_balance), Some(10));
    assert!(Arc::ptr_eq(&state.collectibles, &initial.collectibles));
    assert!(Arc::ptr_eq(&state.marketplace_listings, &initial.marketplace_listings));

    // set_state replaces wholesale: nothing from the patches survives.
    store.set_state(AppState::initial(false, Utc::now()), "replace");
    let replaced = store.state();
    assert!(replaced.wallet.is_none());
    assert_eq!(replaced.ui.active_view, View::Dashboard);
    assert!(!replaced.ui.connection.online);
}

#[test]
fn nested_values_are_replaced_not_merged() {
    let store = store_with_wallet(5, 5);
    let mut ui = store.state().ui.clone();
    ui.active_view = View::Admin;
    store.patch(AppStatePatch::new().ui(ui), "ui");

    let mut stale = AppState::initial(true, Utc::now()).ui;
    stale.theme = Theme::Dark;
    store.patch(AppStatePatch::new().ui(stale.clone()), "ui");

    assert_eq!(store.state().ui, stale);
    assert_eq!(store.state().ui.active_view, View::Dashboard);
}

#[test]
fn subscribe_primes_synchronously_without_any_mutation() {
    let store = store_with_wallet(42, 0);
    let primed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&primed);

    let _sub = store.subscribe(move |change: &Change<AppState>| {
        sink.lock().unwrap().push((
            change.context.kind.to_string(),
            change.state.wallet.as_ref().map(|w| w.gold_balance),
        ));
        Ok(())
    });

    assert_eq!(
        *primed.lock().unwrap(),
        vec![(UpdateContext::HYDRATE.to_owned(), Some(42))]
    );
}

#[test]
fn derive_fires_once_per_change_and_never_on_priming() {
    let store = store_with_wallet(0, 0);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let _sub = store.derive(
        |state: &AppState| state.ui.active_view,
        move |view, _| {
            sink.lock().unwrap().push(*view);
            Ok(())
        },
    );
    assert!(seen.lock().unwrap().is_empty());

    let ui = store.state().ui.clone();
    store.patch(AppStatePatch::new().ui(ui.with_view(View::Collection)), "ui:view");
    store.patch(AppStatePatch::new().ui(ui.with_view(View::Collection)), "ui:view");
    store.patch(AppStatePatch::new().wallet(None), "unrelated");
    store.patch(AppStatePatch::new().ui(ui.with_view(View::Redeem)), "ui:view");

    assert_eq!(*seen.lock().unwrap(), vec![View::Collection, View::Redeem]);
}

#[test]
fn derive_by_identity_ignores_untouched_collections() {
    let store = store_with_wallet(0, 0);
    let fires = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fires);

    let _sub = store.derive(
        |state: &AppState| Shared::of(&state.collectibles),
        move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
    );

    store.patch(AppStatePatch::new().wallet(None), "wallet");
    assert_eq!(fires.load(Ordering::SeqCst), 0);
    store.patch(AppStatePatch::new().collectibles(Vec::new()), "collectibles");
    assert_eq!(fires.load(Ordering::SeqCst), 1);
}

#[test]
fn reset_restores_initializer_values() {
    let store = store_with_wallet(3, 1);
    let initial = store.state();

    store.patch(AppStatePatch::new().wallet(None), "wallet");
    store.patch(
        AppStatePatch::new().ui(initial.ui.with_view(View::Marketplace)),
        "ui:view",
    );
    store.patch(AppStatePatch::signed_out(), "session:cleared");

    let contexts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&contexts);
    let _sub = store.subscribe(move |change: &Change<AppState>| {
        sink.lock().unwrap().push(change.context.kind.to_string());
        Ok(())
    });
    store.reset();

    let restored = store.state();
    assert_eq!(*restored, *initial);
    assert!(!Arc::ptr_eq(&restored, &initial));
    assert_eq!(
        *contexts.lock().unwrap(),
        vec![UpdateContext::HYDRATE, UpdateContext::RESET]
    );
}

#[test]
fn throwing_handler_is_isolated_from_caller_and_siblings() {
    let bus = EventBus::<String>::new();
    let calls = Arc::new(Mutex::new(Vec::new()));

    for n in 0..5 {
        let sink = Arc::clone(&calls);
        bus.on("x", move |payload: &String| {
            if n == 2 {
                anyhow::bail!("handler {n} rejected {payload}");
            }
            sink.lock().unwrap().push(n);
            Ok(())
        });
    }

    assert_eq!(bus.emit("x", &"payload".to_owned()), 5);
    assert_eq!(*calls.lock().unwrap(), vec![0, 1, 3, 4]);
}

#[test]
fn once_handler_fires_at_most_once() {
    let bus = EventBus::<u8>::new();
    let fires = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fires);
    bus.once("x", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    for payload in 0..10 {
        bus.emit("x", &payload);
    }
    assert_eq!(fires.load(Ordering::SeqCst), 1);
}

#[test]
fn clear_named_event_silences_both_handlers() {
    let bus = EventBus::<()>::new();
    let fires = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let counter = Arc::clone(&fires);
        bus.on("x", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    bus.clear(Some("x"));
    bus.emit("x", &());
    assert_eq!(fires.load(Ordering::SeqCst), 0);
}

struct Step {
    name: &'static str,
    fail: bool,
    journal: Arc<Mutex<Vec<&'static str>>>,
}

impl Module for Step {
    fn init(&self) -> Option<BoxFuture<'_, anyhow::Result<()>>> {
        Some(Box::pin(async move {
            self.journal.lock().unwrap().push(self.name);
            if self.fail {
                anyhow::bail!("{} failed to initialize", self.name);
            }
            Ok(())
        }))
    }
}

#[tokio::test]
async fn registry_continues_past_failing_initializer() {
    let journal: Arc<Mutex<Vec<&'static str>>> = Arc::default();
    let mut registry = ModuleRegistry::new();
    for (name, fail) in [("A", false), ("B", true), ("C", false)] {
        registry.register(name, move |journal: &Arc<Mutex<Vec<&'static str>>>| {
            Ok(Step {
                name,
                fail,
                journal: Arc::clone(journal),
            })
        });
    }

    let report = registry.init_all(&journal).await;

    assert_eq!(*journal.lock().unwrap(), vec!["A", "B", "C"]);
    assert_eq!(report.initialized, vec!["A", "C"]);
    assert_eq!(report.failed[0].name, "B");
}
