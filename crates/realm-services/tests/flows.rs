//! End-to-end service flows against the in-memory backend.

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
use std::time::Duration;

use chrono::Utc;
use realm_backend::{Backend, MemoryBackend};
use realm_core::{AppConfig, LogHistory, RealmBus, RealmStore};
use realm_services::{
    ListingForm, NewCodeForm, ServiceContext, ServiceError, Services, StipendOutcome,
};
use realm_types::{
    events, AppState, CollectibleId, ConnectionStatus, LedgerEntryType, ListingId, Rarity,
    RealmEvent, UserId,
};
use serde_json::{Map, json};
use tracing_subscriber::layer::SubscriberExt;
use uuid::Uuid;

struct Harness {
    memory: MemoryBackend,
    services: Services,
    store: RealmStore,
    events: RealmBus,
    seen: Arc<Mutex<Vec<RealmEvent>>>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    fn with_config(config: AppConfig) -> Self {
        let memory = MemoryBackend::new();
        let store = RealmStore::new(AppState::initial(true, Utc::now()));
        let events = RealmBus::new();
        let context = ServiceContext::new(
            store.clone(),
            events.clone(),
            Arc::new(Backend::Memory(memory.clone())),
            Arc::new(config),
        );
        Self {
            memory,
            services: Services::new(context),
            store,
            events,
            seen: Arc::default(),
        }
    }

    fn record(&self, channel: &str) {
        let seen = Arc::clone(&self.seen);
        self.events.on(channel, move |event| {
            seen.lock().unwrap().push(event.clone());
            Ok(())
        });
    }

    fn seen(&self) -> Vec<RealmEvent> {
        self.seen.lock().unwrap().clone()
    }

    fn wallet_row(&self, user: UserId, gold: i64, gems: i64) {
        self.memory.seed(
            "wallets",
            [json!({"user_id": user, "gold_balance": gold, "gem_balance": gems})],
        );
    }
}

#[tokio::test]
async fn first_wallet_load_creates_an_empty_wallet() {
    let h = Harness::new();
    let user = UserId::new();

    let wallet = h.services.economy.load_wallet(user).await.unwrap();

    assert_eq!(wallet.gold_balance, 0);
    assert_eq!(wallet.gem_balance, 0);
    assert_eq!(h.memory.rows("wallets").len(), 1);
    assert_eq!(h.store.state().wallet.as_ref(), Some(&wallet));

    // A second load finds the row instead of creating another.
    h.services.economy.load_wallet(user).await.unwrap();
    assert_eq!(h.memory.rows("wallets").len(), 1);
}

#[tokio::test]
async fn stipend_is_granted_once_per_window() {
    let h = Harness::new();
    h.record(events::LEDGER_ENTRY);
    let user = UserId::new();
    h.wallet_row(user, 100, 1);

    let first = h.services.economy.grant_daily_stipend(user, None).await.unwrap();
    let StipendOutcome::Granted(wallet) = first else {
        panic!("expected a granted stipend, got {first:?}");
    };
    assert_eq!(wallet.gold_balance, 600);
    assert_eq!(wallet.gem_balance, 6);
    assert!(wallet.last_stipend_at.is_some());

    let second = h
        .services
        .economy
        .grant_daily_stipend(user, Some(wallet.clone()))
        .await
        .unwrap();
    let StipendOutcome::AlreadyClaimed { hours_remaining, .. } = second else {
        panic!("expected the stipend to be refused, got {second:?}");
    };
    assert_eq!(hours_remaining, 24);

    let ledger = h.memory.rows("economy_ledger");
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0]["type"], "stipend");
    assert_eq!(ledger[0]["delta_gold"], 500);
    assert!(matches!(
        h.seen().as_slice(),
        [RealmEvent::LedgerEntry(entry)] if entry.entry_type == LedgerEntryType::Stipend
    ));
}

#[tokio::test]
async fn duplicate_conversion_pays_by_rarity() {
    let h = Harness::new();
    let user = UserId::new();
    h.wallet_row(user, 10, 0);

    let wallet = h
        .services
        .economy
        .convert_duplicate(user, Rarity::Epic)
        .await
        .unwrap();

    assert_eq!(wallet.gold_balance, 190);
    assert_eq!(wallet.gem_balance, 3);
    let ledger = h.memory.rows("economy_ledger");
    assert_eq!(ledger[0]["description"], "Converted duplicate (epic)");
}

#[tokio::test]
async fn ledger_loads_newest_first_with_limit() {
    let h = Harness::new();
    let user = UserId::new();
    h.memory.seed(
        "economy_ledger",
        (1..=4).map(|day| {
            json!({
                "user_id": user, "type": "adjustment", "delta_gold": day,
                "occurred_at": format!("2026-05-0{day}T12:00:00Z"),
            })
        }),
    );

    let entries = h.services.economy.load_ledger(user, 3).await.unwrap();

    let deltas: Vec<i64> = entries.iter().map(|e| e.delta_gold).collect();
    assert_eq!(deltas, vec![4, 3, 2]);
    assert_eq!(h.store.state().ledger.len(), 3);
}

fn seed_listing(h: &Harness, seller: UserId, price_gold: i64) -> ListingId {
    let collectible = Uuid::now_v7();
    let id = ListingId::new();
    h.memory.seed(
        "collectibles",
        [json!({"id": collectible, "name": "Tide Lantern", "rarity": "rare"})],
    );
    h.memory.seed(
        "user_profiles",
        [json!({"user_id": seller, "username": "tidewatcher"})],
    );
    h.memory.seed(
        "marketplace_listings",
        [json!({
            "id": id, "seller_id": seller, "collectible_id": collectible,
            "price_gold": price_gold, "price_gems": 0, "status": "active",
        })],
    );
    id
}

#[tokio::test]
async fn purchase_charges_buyer_and_retires_listing() {
    let h = Harness::new();
    h.record(events::MARKETPLACE_PURCHASED);
    let seller = UserId::new();
    let buyer = UserId::new();
    h.wallet_row(buyer, 500, 0);
    let listing = seed_listing(&h, seller, 120);

    let snapshot = h.services.marketplace.load_marketplace(Some(buyer)).await.unwrap();
    assert_eq!(snapshot.listings.len(), 1);
    assert_eq!(snapshot.suggestions.len(), 1);
    assert_eq!(snapshot.suggestions[0].seller, "tidewatcher");

    let bought = h
        .services
        .marketplace
        .purchase_listing(listing, buyer)
        .await
        .unwrap();
    assert_eq!(bought.id, listing);

    let wallet = h.memory.rows("wallets");
    assert_eq!(wallet[0]["gold_balance"], 380);
    let stored = h.memory.rows("marketplace_listings");
    assert_eq!(stored[0]["status"], "sold");
    assert_eq!(h.memory.rows("marketplace_transactions").len(), 1);
    assert!(h.store.state().marketplace_listings.is_empty());
    assert_eq!(
        h.seen(),
        vec![RealmEvent::MarketplacePurchased {
            listing_id: listing,
            buyer_id: buyer
        }]
    );

    let again = h.services.marketplace.purchase_listing(listing, buyer).await;
    assert!(matches!(again, Err(ServiceError::ListingUnavailable(id)) if id == listing));
    assert_eq!(h.memory.rows("wallets")[0]["gold_balance"], 380);
}

#[tokio::test]
async fn created_listing_is_prepended() {
    let h = Harness::new();
    let seller = UserId::new();
    seed_listing(&h, UserId::new(), 10);
    h.services.marketplace.load_marketplace(Some(seller)).await.unwrap();

    let unpriced = ListingForm {
        collectible_id: CollectibleId::new(),
        price_gold: 0,
        price_gems: 0,
        expires_at: None,
    };
    let rejected = h.services.marketplace.create_listing(seller, &unpriced).await;
    assert!(matches!(rejected, Err(ServiceError::InvalidInput(_))));

    let form = ListingForm {
        collectible_id: CollectibleId::new(),
        price_gold: 75,
        price_gems: 0,
        expires_at: None,
    };
    let created = h.services.marketplace.create_listing(seller, &form).await.unwrap();

    let listings = Arc::clone(&h.store.state().marketplace_listings);
    assert_eq!(listings.len(), 2);
    assert_eq!(listings[0].id, created.id);
    assert_eq!(listings[0].price_gold, 75);
}

#[tokio::test]
async fn failed_listing_load_is_announced() {
    let h = Harness::new();
    h.record(events::BACKEND_ERROR);
    h.memory.fail_table("marketplace_listings", "relation does not exist");

    let result = h.services.marketplace.load_marketplace(None).await;

    assert!(matches!(result, Err(ServiceError::Backend(_))));
    let seen = h.seen();
    let [RealmEvent::BackendError(failure)] = seen.as_slice() else {
        panic!("expected one backend error, got {seen:?}");
    };
    assert_eq!(failure.scope, "marketplace");
    assert_eq!(failure.action, "load_marketplace");
    assert!(failure.error.contains("relation does not exist"));
}

#[tokio::test]
async fn disabled_marketplace_skips_the_backend() {
    let mut config = AppConfig::default();
    config.features.marketplace = false;
    let h = Harness::with_config(config);
    h.memory.fail_table("marketplace_listings", "must not be queried");

    let snapshot = h.services.marketplace.load_marketplace(None).await.unwrap();
    assert!(snapshot.listings.is_empty());
}

#[tokio::test]
async fn reaching_a_quest_target_completes_and_rewards() {
    let h = Harness::new();
    h.record(events::QUEST_COMPLETED);
    let user = UserId::new();
    let definition = Uuid::now_v7();
    let quest = Uuid::now_v7();
    h.wallet_row(user, 0, 0);
    h.memory.seed(
        "daily_quest_definitions",
        [json!({
            "id": definition, "title": "Open three packs", "target_amount": 3,
            "reward_gold": 40, "reward_gems": 1,
        })],
    );
    h.memory.seed(
        "user_daily_quests",
        [json!({
            "id": quest, "user_id": user, "quest_id": definition, "progress": 1,
            "is_active": true, "expires_at": "2030-01-01T00:00:00Z",
        })],
    );
    let quest_id = quest.to_string().parse().unwrap();

    let partial = h
        .services
        .engagement
        .record_quest_progress(user, quest_id, 2)
        .await
        .unwrap();
    assert_eq!(partial.progress, 2);
    assert!(h.seen().is_empty());

    h.services
        .engagement
        .record_quest_progress(user, quest_id, 3)
        .await
        .unwrap();

    let seen = h.seen();
    let [RealmEvent::QuestCompleted(done)] = seen.as_slice() else {
        panic!("expected one completion, got {seen:?}");
    };
    assert_eq!(done.title, "Open three packs");
    assert_eq!(done.reward_gold, 40);
    assert_eq!(h.memory.rows("wallets")[0]["gold_balance"], 40);
    assert_eq!(h.memory.rows("economy_ledger")[0]["type"], "quest_reward");

    let quests = Arc::clone(&h.store.state().quests);
    assert_eq!(quests.len(), 1);
    assert!(quests[0].is_completed());
    assert_eq!(quests[0].percent_complete(), 100);
}

#[tokio::test]
async fn ensure_quests_passes_the_configured_cap() {
    let h = Harness::new();
    let seen_args = Arc::new(Mutex::new(None));
    let capture = Arc::clone(&seen_args);
    h.memory.register_rpc("ensure_daily_quests", move |_, args| {
        *capture.lock().unwrap() = Some(args.clone());
        Ok(json!([]))
    });
    let user = UserId::new();

    h.services.engagement.ensure_quests(user).await.unwrap();

    let args = seen_args.lock().unwrap().clone().unwrap();
    assert_eq!(args["p_max_active"], 3);
    assert_eq!(args["p_user_id"], json!(user));
}

#[tokio::test]
async fn redeem_credits_currency_and_reloads_collection() {
    let h = Harness::new();
    h.record(events::REDEEM_COMPLETED);
    let user = UserId::new();
    let collectible = Uuid::now_v7();
    h.memory.seed(
        "collectibles",
        [json!({"id": collectible, "name": "Ember Sprite", "rarity": "legendary"})],
    );
    h.memory.register_rpc("redeem_collectible_code", move |backend, args| {
        assert_eq!(args["p_code"], "SPRING-25");
        backend.seed(
            "user_collectibles",
            [json!({
                "user_id": args["p_user_id"], "collectible_id": collectible,
                "acquired_at": "2026-04-01T09:00:00Z",
            })],
        );
        Ok(json!({
            "collectible": {"id": collectible, "name": "Ember Sprite", "rarity": "legendary"},
            "currency_rewards": {"gold": 100},
        }))
    });

    let reward = h.services.redeem.redeem(user, "  spring-25 ").await.unwrap();

    assert_eq!(reward.collectible.map(|c| c.name).as_deref(), Some("Ember Sprite"));
    let collection = Arc::clone(&h.store.state().collectibles);
    assert_eq!(collection.len(), 1);
    assert_eq!(collection[0].rarity_label, "Legendary");
    assert_eq!(h.memory.rows("wallets")[0]["gold_balance"], 100);
    assert_eq!(
        h.memory.rows("economy_ledger")[0]["description"],
        "Reward from code SPRING-25"
    );
    assert_eq!(h.seen().len(), 1);
}

#[tokio::test]
async fn rows_without_a_catalogue_entry_are_skipped_and_logged() {
    let h = Harness::new();
    let history = LogHistory::new(20);
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(history.clone()));
    let user = UserId::new();
    let kept = Uuid::now_v7();
    let orphan = Uuid::now_v7();
    h.memory.seed(
        "collectibles",
        [json!({"id": kept, "name": "Moss Sprite", "rarity": "common"})],
    );
    h.memory.seed(
        "user_collectibles",
        [
            json!({"id": orphan, "user_id": user, "collectible_id": Uuid::now_v7(),
                   "acquired_at": "2026-04-02T09:00:00Z"}),
            json!({"user_id": user, "collectible_id": kept, "acquired_at": "2026-04-01T09:00:00Z"}),
        ],
    );

    let owned = h.services.collectibles.load_collectibles(Some(user)).await.unwrap();

    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].name, "Moss Sprite");
    let skipped: Vec<_> = history
        .records()
        .into_iter()
        .filter(|r| r.level == "WARN" && r.scope == "collectibles")
        .collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].fields["acquisition_id"], orphan.to_string());
}

#[tokio::test]
async fn malformed_codes_never_reach_the_backend() {
    let h = Harness::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    h.memory.register_rpc("redeem_collectible_code", move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(json!(null))
    });

    for code in ["", "   ", "no spaces allowed", "emoji-✨"] {
        let result = h.services.redeem.redeem(UserId::new(), code).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))), "{code:?}");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn admin_codes_are_created_normalized_and_deactivated() {
    let h = Harness::new();
    h.record(events::ADMIN_CODE_CREATED);

    let mut form = NewCodeForm::new("harvest-moon");
    form.reward_gold = 250;
    form.max_redemptions = Some(100);
    let code = h.services.admin.create_redemption_code(form).await.unwrap();

    assert_eq!(code.code, "HARVEST-MOON");
    assert!(code.is_active);
    assert_eq!(h.store.state().admin_codes.len(), 1);
    assert_eq!(h.seen().len(), 1);

    let retired = h.services.admin.deactivate_code(code.id).await.unwrap();
    assert!(!retired.is_active);
    assert!(!h.store.state().admin_codes[0].is_active);

    let mut invalid = NewCodeForm::new("NEGATIVE");
    invalid.reward_gems = -1;
    let result = h.services.admin.create_redemption_code(invalid).await;
    assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    assert_eq!(h.memory.rows("redemption_codes").len(), 1);
}

#[tokio::test]
async fn ping_tracks_backend_health() {
    let h = Harness::new();
    h.record(events::NETWORK_PROBE_FAILED);
    h.memory.seed("app_health", [json!({"id": 1, "status": "ok"})]);

    assert!(h.services.network.init(true).await);
    assert_eq!(
        h.store.state().ui.connection.backend,
        ConnectionStatus::Connected
    );

    h.memory.fail_table("app_health", "connection refused");
    assert!(!h.services.network.ping().await);
    assert_eq!(h.store.state().ui.connection.backend, ConnectionStatus::Error);
    assert!(matches!(
        h.seen().as_slice(),
        [RealmEvent::NetworkProbeFailed(message)] if message.contains("connection refused")
    ));
}

#[tokio::test]
async fn connectivity_follows_device_and_bus_events() {
    let h = Harness::new();
    let network = &h.services.network;

    network.set_online(false);
    let connection = h.store.state().ui.connection.clone();
    assert!(!connection.online);
    assert_eq!(connection.backend, ConnectionStatus::Offline);

    network.set_online(true);
    assert!(h.store.state().ui.connection.online);

    h.events.publish(&RealmEvent::SessionChanged(None));
    assert_eq!(
        h.store.state().ui.connection.backend,
        ConnectionStatus::AuthOnly
    );

    h.events.publish(&RealmEvent::BackendError(realm_types::BackendFailure {
        scope: "economy".into(),
        action: "load_wallet".into(),
        error: "boom".into(),
    }));
    assert_eq!(h.store.state().ui.connection.backend, ConnectionStatus::Error);

    network.detach();
    h.events.publish(&RealmEvent::SessionChanged(None));
    assert_eq!(h.store.state().ui.connection.backend, ConnectionStatus::Error);
}

async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..50 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn hydrate_mirrors_existing_and_later_sessions() {
    let h = Harness::new();
    h.record(events::SESSION_CHANGED);
    let user = h
        .memory
        .create_user("ada@example.com", "lovelace", Map::new());
    h.memory.start_session(&user);

    let listener = h.services.session.hydrate();
    assert_eq!(h.store.state().user_id(), Some(user.id));

    h.services.session.sign_out().await.unwrap();
    eventually(|| h.store.state().session.is_none()).await;
    assert!(h
        .seen()
        .iter()
        .any(|event| matches!(event, RealmEvent::SessionChanged(None))));

    h.services
        .session
        .sign_in("ada@example.com", "lovelace")
        .await
        .unwrap();
    eventually(|| h.store.state().user_id() == Some(user.id)).await;
    listener.abort();
}

#[tokio::test]
async fn credentials_are_checked_before_sign_in() {
    let h = Harness::new();
    let result = h.services.session.sign_in("not-an-email", "pw").await;
    assert!(matches!(result, Err(ServiceError::InvalidInput(_))));

    let result = h
        .services
        .session
        .sign_in("ghost@example.com", "whatever-password")
        .await;
    assert!(matches!(result, Err(ServiceError::Backend(_))));
}
