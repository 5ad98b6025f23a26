//! In-process backend holding tables of JSON rows.
//!
//! Used by tests and by the shell when no backend is configured. It
//! understands the subset of PostgREST the client relies on: equality
//! filters, ordering (nulls last ascending, first descending), limits,
//! and embedded relations written `alias:table(columns)`. An embed
//! follows the `{alias}_id` column of the parent row to the related row's
//! `id` (or `user_id` for profile tables); `!inner` drops parents whose
//! relation is missing.
//!
//! Remote procedures are plain closures registered by name. Failures can
//! be injected per table to exercise error paths.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use realm_types::{AuthEvent, Session, User, UserId};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::{AuthChange, AuthResponse, AUTH_CHANNEL_CAPACITY};
use crate::error::{BackendError, NO_ROWS_CODE};
use crate::query::{parse_select, Query, SelectItem};

type Row = Map<String, Value>;

/// A remote procedure: receives the backend and the call arguments.
pub type RpcHandler = Arc<dyn Fn(&MemoryBackend, &Value) -> Result<Value, BackendError> + Send + Sync>;

struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Row>>,
    failures: HashMap<String, String>,
    procedures: HashMap<String, RpcHandler>,
    accounts: Vec<Account>,
    session: Option<Session>,
}

/// In-memory backend. Cloning yields another handle to the same data.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
    auth: broadcast::Sender<AuthChange>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryBackend")
            .field("tables", &state.tables.keys().collect::<Vec<_>>())
            .field("signed_in", &state.session.is_some())
            .finish_non_exhaustive()
    }
}

impl MemoryBackend {
    /// An empty backend with no tables, users or procedures.
    pub fn new() -> Self {
        let (auth, _) = broadcast::channel(AUTH_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            auth,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Seeding and inspection
    // -----------------------------------------------------------------------

    /// Append `rows` to `table`, assigning ids where missing.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        let mut state = self.lock();
        let target = state.tables.entry(table.to_owned()).or_default();
        for row in rows {
            if let Value::Object(row) = row {
                target.push(with_defaults(row));
            }
        }
    }

    /// Raw rows of `table` in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock()
            .tables
            .get(table)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    /// Register a remote procedure.
    pub fn register_rpc<F>(&self, name: &str, handler: F)
    where
        F: Fn(&Self, &Value) -> Result<Value, BackendError> + Send + Sync + 'static,
    {
        self.lock()
            .procedures
            .insert(name.to_owned(), Arc::new(handler));
    }

    /// Make every operation on `table` fail with `message`.
    pub fn fail_table(&self, table: &str, message: &str) {
        self.lock()
            .failures
            .insert(table.to_owned(), message.to_owned());
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Register an account without signing it in.
    pub fn create_user(&self, email: &str, password: &str, metadata: Map<String, Value>) -> User {
        let user = User {
            id: UserId::new(),
            email: Some(email.to_owned()),
            user_metadata: metadata.into_iter().collect(),
        };
        self.lock().accounts.push(Account {
            user: user.clone(),
            password: password.to_owned(),
        });
        user
    }

    /// Sign `user` in directly and broadcast the change.
    pub fn start_session(&self, user: &User) -> Session {
        let session = issue_session(user);
        self.lock().session = Some(session.clone());
        self.broadcast(AuthEvent::SignedIn, Some(session.clone()));
        session
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Rows matching `query`.
    pub fn select(&self, query: &Query) -> Result<Vec<Value>, BackendError> {
        let state = self.lock();
        check_failure(&state, &query.table)?;

        let mut rows: Vec<&Row> = state
            .tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|row| matches(row, &query.filters)).collect())
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_nullable(a.get(&order.column), b.get(&order.column));
                if order.ascending { ordering } else { ordering.reverse() }
            });
        }

        let items = parse_select(&query.select);
        let projected = rows
            .into_iter()
            .filter_map(|row| project(&state.tables, row, &items));
        Ok(match query.limit {
            Some(limit) => projected.take(limit).collect(),
            None => projected.collect(),
        })
    }

    /// Exactly one row matching `query`.
    pub fn single(&self, query: &Query) -> Result<Value, BackendError> {
        self.maybe_single(query)?.ok_or_else(|| BackendError::NotFound {
            table: query.table.clone(),
        })
    }

    /// At most one row matching `query`.
    pub fn maybe_single(&self, query: &Query) -> Result<Option<Value>, BackendError> {
        let mut rows = self.select(query)?;
        if rows.len() > 1 {
            return Err(multiple_rows(rows.len()));
        }
        Ok(rows.pop())
    }

    /// Insert `row` into the query's table and return it as selected.
    pub fn insert(&self, query: &Query, row: Value) -> Result<Value, BackendError> {
        let Value::Object(row) = row else {
            return Err(not_an_object(&query.table));
        };
        let mut state = self.lock();
        check_failure(&state, &query.table)?;
        let row = with_defaults(row);
        state
            .tables
            .entry(query.table.clone())
            .or_default()
            .push(row.clone());
        project(&state.tables, &row, &parse_select(&query.select))
            .ok_or_else(|| BackendError::NotFound {
                table: query.table.clone(),
            })
    }

    /// Merge `changes` into every row matching the query's filters.
    pub fn update(&self, query: &Query, changes: Value) -> Result<Vec<Value>, BackendError> {
        let Value::Object(changes) = changes else {
            return Err(not_an_object(&query.table));
        };
        let mut state = self.lock();
        check_failure(&state, &query.table)?;

        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(&query.table) {
            for row in rows.iter_mut().filter(|row| matches(row, &query.filters)) {
                row.extend(changes.clone());
                updated.push(row.clone());
            }
        }
        let items = parse_select(&query.select);
        Ok(updated
            .iter()
            .filter_map(|row| project(&state.tables, row, &items))
            .collect())
    }

    /// Insert `row`, or merge it into the row sharing its conflict column.
    pub fn upsert(&self, query: &Query, row: Value) -> Result<Value, BackendError> {
        let Value::Object(row) = row else {
            return Err(not_an_object(&query.table));
        };
        let mut state = self.lock();
        check_failure(&state, &query.table)?;

        let column = query.conflict_column();
        let key = row.get(column).cloned();
        let rows = state.tables.entry(query.table.clone()).or_default();
        let existing = key
            .as_ref()
            .and_then(|key| rows.iter_mut().find(|r| r.get(column) == Some(key)));
        let stored = if let Some(existing) = existing {
            existing.extend(row);
            existing.clone()
        } else {
            let row = with_defaults(row);
            rows.push(row.clone());
            row
        };
        project(&state.tables, &stored, &parse_select(&query.select)).ok_or_else(|| {
            BackendError::NotFound {
                table: query.table.clone(),
            }
        })
    }

    /// Call the procedure registered as `name`.
    pub fn rpc(&self, name: &str, args: &Value) -> Result<Value, BackendError> {
        let handler = self.lock().procedures.get(name).cloned();
        let Some(handler) = handler else {
            return Err(BackendError::Rpc {
                name: name.to_owned(),
                message: "function not found".to_owned(),
            });
        };
        handler(self, args)
    }

    // -----------------------------------------------------------------------
    // Auth
    // -----------------------------------------------------------------------

    /// The current session.
    pub fn session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    /// Sign in with email and password.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, BackendError> {
        let user = self
            .lock()
            .accounts
            .iter()
            .find(|account| {
                account.user.email.as_deref() == Some(email) && account.password == password
            })
            .map(|account| account.user.clone())
            .ok_or_else(|| BackendError::Auth("Invalid login credentials".to_owned()))?;
        let session = self.start_session(&user);
        Ok(AuthResponse {
            user,
            session: Some(session),
        })
    }

    /// Register a new account and sign it in.
    pub fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<AuthResponse, BackendError> {
        let taken = self
            .lock()
            .accounts
            .iter()
            .any(|account| account.user.email.as_deref() == Some(email));
        if taken {
            return Err(BackendError::Auth("User already registered".to_owned()));
        }
        let user = self.create_user(email, password, metadata);
        let session = self.start_session(&user);
        Ok(AuthResponse {
            user,
            session: Some(session),
        })
    }

    /// End the current session.
    pub fn sign_out(&self) {
        self.lock().session = None;
        self.broadcast(AuthEvent::SignedOut, None);
    }

    /// Receiver of future auth changes.
    pub fn auth_changes(&self) -> broadcast::Receiver<AuthChange> {
        self.auth.subscribe()
    }

    fn broadcast(&self, event: AuthEvent, session: Option<Session>) {
        // No receivers is fine.
        self.auth.send(AuthChange { event, session }).ok();
    }
}

fn issue_session(user: &User) -> Session {
    let expires_at = Utc::now()
        .checked_add_signed(Duration::hours(1))
        .map(|at| at.timestamp());
    Session {
        access_token: format!("memory-{}", Uuid::now_v7()),
        refresh_token: Some(Uuid::now_v7().to_string()),
        expires_at,
        user: user.clone(),
    }
}

fn with_defaults(mut row: Row) -> Row {
    row.entry("id")
        .or_insert_with(|| Value::String(Uuid::now_v7().to_string()));
    row.entry("created_at")
        .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
    row
}

fn check_failure(state: &MemoryState, table: &str) -> Result<(), BackendError> {
    match state.failures.get(table) {
        Some(message) => Err(BackendError::Api {
            status: 500,
            code: None,
            message: message.clone(),
        }),
        None => Ok(()),
    }
}

fn not_an_object(table: &str) -> BackendError {
    BackendError::Api {
        status: 400,
        code: None,
        message: format!("rows written to {table} must be JSON objects"),
    }
}

fn multiple_rows(count: usize) -> BackendError {
    BackendError::Api {
        status: 406,
        code: Some(NO_ROWS_CODE.to_owned()),
        message: format!("JSON object requested, {count} rows returned"),
    }
}

/// Wire form of a column value, as used in filters.
fn wire(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn matches(row: &Row, filters: &[(String, String)]) -> bool {
    filters
        .iter()
        .all(|(column, value)| row.get(column).is_some_and(|v| wire(v) == *value))
}

fn compare_nullable(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => compare_values(a, b),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => {
            match (
                DateTime::parse_from_rfc3339(a),
                DateTime::parse_from_rfc3339(b),
            ) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => wire(a).cmp(&wire(b)),
    }
}

/// Apply a parsed select to `row`. `None` when an inner embed is missing.
fn project(tables: &HashMap<String, Vec<Row>>, row: &Row, items: &[SelectItem]) -> Option<Value> {
    let mut out = Map::new();
    for item in items {
        match item {
            SelectItem::All => out.extend(row.clone()),
            SelectItem::Column(column) => {
                if let Some(value) = row.get(column) {
                    out.insert(column.clone(), value.clone());
                }
            }
            SelectItem::Embed {
                alias,
                table,
                inner,
                columns,
            } => {
                let related = related_row(tables, row, alias, table)
                    .and_then(|related| project(tables, related, columns));
                match related {
                    Some(value) => {
                        out.insert(alias.clone(), value);
                    }
                    None if *inner => return None,
                    None => {
                        out.insert(alias.clone(), Value::Null);
                    }
                }
            }
        }
    }
    Some(Value::Object(out))
}

fn related_row<'a>(
    tables: &'a HashMap<String, Vec<Row>>,
    row: &Row,
    alias: &str,
    table: &str,
) -> Option<&'a Row> {
    let key = row.get(&format!("{alias}_id")).filter(|key| !key.is_null())?;
    let rows = tables.get(table)?;
    rows.iter()
        .find(|candidate| candidate.get("id") == Some(key))
        .or_else(|| rows.iter().find(|candidate| candidate.get("user_id") == Some(key)))
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;

    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.seed(
            "collectibles",
            [
                json!({"id": "c-1", "name": "Ember Fox", "rarity": "rare"}),
                json!({"id": "c-2", "name": "Tide Golem", "rarity": "common"}),
            ],
        );
        backend.seed(
            "user_collectibles",
            [
                json!({"id": "a-1", "user_id": "u-1", "collectible_id": "c-1", "acquired_at": "2026-01-02T00:00:00Z"}),
                json!({"id": "a-2", "user_id": "u-1", "collectible_id": "c-2", "acquired_at": "2026-01-03T00:00:00.500Z"}),
                json!({"id": "a-3", "user_id": "u-2", "collectible_id": "c-2", "acquired_at": "2026-01-01T00:00:00Z"}),
                json!({"id": "a-4", "user_id": "u-1", "collectible_id": "missing", "acquired_at": null}),
            ],
        );
        backend
    }

    #[test]
    fn select_filters_orders_and_embeds() {
        let backend = backend();
        let rows = backend
            .select(
                &Query::table("user_collectibles")
                    .select("*, collectible:collectibles(*)")
                    .eq("user_id", "u-1")
                    .order("acquired_at", false),
            )
            .unwrap_or_default();

        let ids: Vec<_> = rows.iter().filter_map(|r| r["id"].as_str()).collect();
        // Descending puts nulls first.
        assert_eq!(ids, vec!["a-4", "a-2", "a-1"]);
        assert_eq!(rows[1]["collectible"]["name"], "Tide Golem");
        assert!(rows[0]["collectible"].is_null());
    }

    #[test]
    fn inner_embed_drops_rows_without_relation() {
        let backend = backend();
        let rows = backend
            .select(
                &Query::table("user_collectibles")
                    .select("id, collectible:collectibles!inner(name)")
                    .order("acquired_at", true),
            )
            .unwrap_or_default();
        let names: Vec<_> = rows
            .iter()
            .filter_map(|r| r["collectible"]["name"].as_str())
            .collect();
        assert_eq!(names, vec!["Tide Golem", "Ember Fox", "Tide Golem"]);
        assert!(rows.iter().all(|r| r.get("user_id").is_none()));
    }

    #[test]
    fn single_reports_not_found_and_multiple_rows() {
        let backend = backend();
        let missing = backend.single(&Query::table("collectibles").eq("id", "nope"));
        assert!(matches!(missing, Err(BackendError::NotFound { ref table }) if table == "collectibles"));

        let many = backend.single(&Query::table("user_collectibles").eq("user_id", "u-1"));
        assert!(matches!(many, Err(BackendError::Api { status: 406, .. })));

        let none = backend.maybe_single(&Query::table("app_health").eq("id", 1));
        assert!(matches!(none, Ok(None)));
    }

    #[test]
    fn insert_assigns_id_and_update_merges() {
        let backend = MemoryBackend::new();
        let created = backend
            .insert(
                &Query::table("wallets"),
                json!({"user_id": "u-1", "gold_balance": 0, "gem_balance": 0}),
            )
            .unwrap_or_default();
        let id = created["id"].as_str().unwrap_or_default().to_owned();
        assert!(!id.is_empty());

        let updated = backend
            .update(
                &Query::table("wallets").eq("id", &id),
                json!({"gold_balance": 500}),
            )
            .unwrap_or_default();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["gold_balance"], 500);
        assert_eq!(updated[0]["gem_balance"], 0);
    }

    #[test]
    fn upsert_merges_on_conflict_column() {
        let backend = MemoryBackend::new();
        let query = Query::table("user_profiles").on_conflict("user_id");
        backend
            .upsert(&query, json!({"user_id": "u-1", "username": "first"}))
            .ok();
        backend
            .upsert(&query, json!({"user_id": "u-1", "flair_title": "Archivist"}))
            .ok();
        let rows = backend.rows("user_profiles");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["username"], "first");
        assert_eq!(rows[0]["flair_title"], "Archivist");
    }

    #[test]
    fn injected_failure_surfaces_as_api_error() {
        let backend = backend();
        backend.fail_table("collectibles", "relation unavailable");
        let result = backend.select(&Query::table("collectibles"));
        assert!(matches!(result, Err(BackendError::Api { status: 500, .. })));
        backend.clear_failures();
        assert!(backend.select(&Query::table("collectibles")).is_ok());
    }

    #[test]
    fn rpc_dispatches_to_registered_handler() {
        let backend = MemoryBackend::new();
        backend.register_rpc("echo", |_, args| Ok(args.clone()));
        let echoed = backend.rpc("echo", &json!({"p_code": "ABC"}));
        assert_eq!(echoed.ok(), Some(json!({"p_code": "ABC"})));
        assert!(matches!(
            backend.rpc("missing", &Value::Null),
            Err(BackendError::Rpc { .. })
        ));
    }

    #[test]
    fn sign_in_checks_credentials_and_broadcasts() {
        let backend = MemoryBackend::new();
        let mut changes = backend.auth_changes();
        backend.create_user("ada@realm.test", "hunter2", Map::new());

        assert!(matches!(
            backend.sign_in("ada@realm.test", "wrong"),
            Err(BackendError::Auth(_))
        ));
        let response = backend.sign_in("ada@realm.test", "hunter2");
        assert!(response.is_ok());
        assert!(backend.session().is_some());
        let change = changes.try_recv().ok();
        assert_eq!(change.map(|c| c.event), Some(AuthEvent::SignedIn));

        backend.sign_out();
        assert!(backend.session().is_none());
        let change = changes.try_recv().ok();
        assert_eq!(change.map(|c| c.event), Some(AuthEvent::SignedOut));
    }

    #[test]
    fn sign_up_rejects_duplicate_email() {
        let backend = MemoryBackend::new();
        assert!(backend.sign_up("bo@realm.test", "pw", Map::new()).is_ok());
        assert!(matches!(
            backend.sign_up("bo@realm.test", "pw", Map::new()),
            Err(BackendError::Auth(_))
        ));
    }
}
