//! A seeded in-memory realm for running the shell without a hosted backend.
//!
//! Besides the catalogue and a demo account, the two server-side
//! procedures the client calls are registered: code redemption and daily
//! quest assignment.

use chrono::{DateTime, Duration, Utc};
use realm_backend::{BackendError, MemoryBackend, Query};
use realm_core::time;
use realm_services::collectibles::REDEEM_RPC;
use realm_services::engagement::ENSURE_QUESTS_RPC;
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// Email of the seeded account.
pub const DEMO_EMAIL: &str = "keeper@realm.test";
/// Password of the seeded account.
pub const DEMO_PASSWORD: &str = "lantern-keeper";
/// A code the demo account can redeem once.
pub const DEMO_CODE: &str = "WELCOME-REALM";

const CATALOGUE: [(&str, &str, &str); 8] = [
    ("Moss Sprite", "common", "Naps in the roots of old oaks."),
    ("Tide Lantern", "common", "Glows brighter when the sea is calm."),
    ("Copper Finch", "uncommon", "Sings in perfect fifths."),
    ("Reed Flute", "rare", "Plays the wind's own tune."),
    ("Ember Fox", "rare", "Born of the first hearth."),
    ("Star Shard", "epic", "Still warm from the fall."),
    ("Aurora Stag", "legendary", "Seen once a decade, at the pole."),
    ("Hollow Crown", "mythic", "Worn by no one. Yet."),
];

const QUESTS: [(&str, &str, i64, i64, i64); 4] = [
    ("Open the vault", "Redeem a code today.", 1, 40, 0),
    ("Curator's eye", "Look through your collection three times.", 3, 25, 0),
    ("Market stroll", "Visit the marketplace twice.", 2, 30, 1),
    ("Daily return", "Sign in to the realm.", 1, 20, 0),
];

/// Build the demo realm.
pub fn demo_backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    let now = Utc::now();

    backend.seed("app_health", [json!({ "id": 1, "status": "ok" })]);

    let catalogue: Vec<Value> = CATALOGUE
        .iter()
        .map(|(name, rarity, lore)| {
            json!({ "id": Uuid::now_v7(), "name": name, "rarity": rarity, "lore": lore })
        })
        .collect();
    backend.seed("collectibles", catalogue.clone());

    backend.seed(
        "daily_quest_definitions",
        QUESTS.iter().map(|(title, description, target, gold, gems)| {
            json!({
                "id": Uuid::now_v7(),
                "title": title,
                "description": description,
                "target_amount": target,
                "reward_gold": gold,
                "reward_gems": gems,
            })
        }),
    );

    backend.seed(
        "seasonal_events",
        [json!({
            "name": "Festival of Lanterns",
            "description": "Lantern collectibles drop twice as often.",
            "starts_at": now,
            "ends_at": Duration::try_days(14).and_then(|span| now.checked_add_signed(span)),
            "is_active": true,
        })],
    );

    let mut metadata = Map::new();
    metadata.insert("username".to_owned(), json!("Lantern Keeper"));
    let keeper = backend.create_user(DEMO_EMAIL, DEMO_PASSWORD, metadata);
    let merchant = Uuid::now_v7();
    backend.seed(
        "user_profiles",
        [
            json!({ "user_id": keeper.id, "username": "Lantern Keeper", "flair_title": "Archivist", "is_admin": true }),
            json!({ "user_id": merchant, "username": "Mira", "flair_title": "Trader" }),
        ],
    );
    backend.seed(
        "wallets",
        [
            json!({ "user_id": keeper.id, "gold_balance": 250, "gem_balance": 5 }),
            json!({ "user_id": merchant, "gold_balance": 900, "gem_balance": 12 }),
        ],
    );

    let by_name = |wanted: &str| -> Value {
        catalogue
            .iter()
            .find(|row| row.get("name").and_then(Value::as_str) == Some(wanted))
            .and_then(|row| row.get("id").cloned())
            .unwrap_or(Value::Null)
    };
    backend.seed(
        "user_collectibles",
        [
            json!({ "user_id": keeper.id, "collectible_id": by_name("Moss Sprite"), "acquired_at": now }),
            json!({ "user_id": keeper.id, "collectible_id": by_name("Moss Sprite"), "acquired_at": now }),
            json!({ "user_id": keeper.id, "collectible_id": by_name("Ember Fox"), "acquired_at": now }),
        ],
    );
    backend.seed(
        "marketplace_listings",
        [
            json!({ "seller_id": merchant, "collectible_id": by_name("Reed Flute"), "price_gold": 120, "price_gems": 0, "status": "active", "created_at": now }),
            json!({ "seller_id": merchant, "collectible_id": by_name("Star Shard"), "price_gold": 300, "price_gems": 2, "status": "active", "created_at": now }),
            json!({ "seller_id": merchant, "collectible_id": by_name("Tide Lantern"), "price_gold": 35, "price_gems": 0, "status": "active", "created_at": now }),
        ],
    );
    backend.seed(
        "marketplace_showcase",
        [json!({ "priority": 1, "headline": "Curator's pick", "collectible_id": by_name("Aurora Stag") })],
    );
    backend.seed(
        "redemption_codes",
        [json!({
            "code": DEMO_CODE,
            "rarity": "uncommon",
            "max_redemptions": 100,
            "redemption_count": 0,
            "reward_gold": 100,
            "reward_gems": 1,
            "metadata": {},
            "is_active": true,
        })],
    );

    backend.register_rpc(REDEEM_RPC, redeem_collectible_code);
    backend.register_rpc(ENSURE_QUESTS_RPC, ensure_daily_quests);
    tracing::debug!(scope = "demo", "Seeded demo realm");
    backend
}

fn rejected(name: &str, message: impl Into<String>) -> BackendError {
    BackendError::Rpc {
        name: name.to_owned(),
        message: message.into(),
    }
}

fn text_arg<'a>(name: &str, args: &'a Value, key: &str) -> Result<&'a str, BackendError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| rejected(name, format!("missing argument {key}")))
}

fn timestamp(row: &Value, key: &str) -> Option<DateTime<Utc>> {
    row.get(key)
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|at| at.with_timezone(&Utc))
}

/// Validate the code, count the redemption and grant a collectible.
fn redeem_collectible_code(backend: &MemoryBackend, args: &Value) -> Result<Value, BackendError> {
    let code = text_arg(REDEEM_RPC, args, "p_code")?;
    let user_id = text_arg(REDEEM_RPC, args, "p_user_id")?;
    let lookup = Query::table("redemption_codes").eq("code", code);
    let row = backend
        .maybe_single(&lookup)?
        .ok_or_else(|| rejected(REDEEM_RPC, "Code not found"))?;

    if row.get("is_active").and_then(Value::as_bool) == Some(false) {
        return Err(rejected(REDEEM_RPC, "Code is no longer active"));
    }
    if timestamp(&row, "expires_at").is_some_and(|at| time::is_before(at, Utc::now())) {
        return Err(rejected(REDEEM_RPC, "Code has expired"));
    }
    let count = row.get("redemption_count").and_then(Value::as_i64).unwrap_or(0);
    let cap = row.get("max_redemptions").and_then(Value::as_i64);
    if cap.is_some_and(|cap| count >= cap) {
        return Err(rejected(REDEEM_RPC, "Code has reached its redemption limit"));
    }
    backend.update(&lookup, json!({ "redemption_count": count.saturating_add(1) }))?;

    let granted = match row.get("reward_collectible_id").filter(|id| !id.is_null()) {
        Some(id) => backend.maybe_single(&Query::table("collectibles").eq("id", wire(id)))?,
        None => {
            let rarity = row.get("rarity").and_then(Value::as_str).unwrap_or("common");
            backend
                .select(&Query::table("collectibles").eq("rarity", rarity))?
                .into_iter()
                .next()
        }
    };
    if let Some(collectible) = &granted {
        backend.insert(
            &Query::table("user_collectibles"),
            json!({
                "user_id": user_id,
                "collectible_id": collectible.get("id"),
                "acquired_at": Utc::now(),
            }),
        )?;
    }

    let gold = row.get("reward_gold").and_then(Value::as_i64).unwrap_or(0);
    let gems = row.get("reward_gems").and_then(Value::as_i64).unwrap_or(0);
    let currency = (gold > 0 || gems > 0).then(|| json!({ "gold": gold, "gems": gems }));
    Ok(json!({ "collectible": granted, "currency_rewards": currency }))
}

/// Top the user's active quests up to `p_max_active`.
fn ensure_daily_quests(backend: &MemoryBackend, args: &Value) -> Result<Value, BackendError> {
    let user_id = text_arg(ENSURE_QUESTS_RPC, args, "p_user_id")?;
    let max_active = args
        .get("p_max_active")
        .and_then(Value::as_u64)
        .and_then(|max| usize::try_from(max).ok())
        .unwrap_or(3);

    let active = backend.select(
        &Query::table("user_daily_quests")
            .eq("user_id", user_id)
            .eq("is_active", true),
    )?;
    let assigned: Vec<&Value> = active.iter().filter_map(|q| q.get("quest_id")).collect();
    let open = max_active.saturating_sub(active.len());

    let now = Utc::now();
    let expires_at = Duration::try_days(1).and_then(|span| now.checked_add_signed(span));
    let mut created = Vec::new();
    for definition in backend.select(&Query::table("daily_quest_definitions"))? {
        if created.len() >= open {
            break;
        }
        let Some(id) = definition.get("id") else {
            continue;
        };
        if assigned.contains(&id) {
            continue;
        }
        created.push(backend.insert(
            &Query::table("user_daily_quests"),
            json!({
                "user_id": user_id,
                "quest_id": id,
                "progress": 0,
                "is_active": true,
                "expires_at": expires_at,
            }),
        )?);
    }
    Ok(Value::Array(created))
}

fn wire(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
