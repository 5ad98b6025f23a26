//! HTTP backend speaking PostgREST (`/rest/v1`) and GoTrue (`/auth/v1`).
//!
//! Every request carries the `apikey` header and a bearer token: the
//! session's access token when signed in, the anonymous key otherwise.
//! Non-success responses are decoded from the backend's error body; the
//! no-rows code becomes [`BackendError::NotFound`].

use std::sync::{Arc, PoisonError, RwLock};

use realm_core::config::BackendConfig;
use realm_types::{AuthEvent, Session, User};
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::auth::{AuthChange, AuthResponse, AUTH_CHANNEL_CAPACITY};
use crate::error::{BackendError, NO_ROWS_CODE};
use crate::query::Query;

const PREFER_REPRESENTATION: &str = "return=representation";
const PREFER_MERGE: &str = "resolution=merge-duplicates,return=representation";

/// Backend reached over HTTP.
pub struct RestBackend {
    client: reqwest::Client,
    url: String,
    anon_key: String,
    session: Arc<RwLock<Option<Session>>>,
    auth: broadcast::Sender<AuthChange>,
}

impl core::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RestBackend")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl RestBackend {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Config`] when the url or anonymous key is
    /// missing.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        if !config.is_configured() {
            return Err(BackendError::Config(
                "backend url and anonymous key are required".to_owned(),
            ));
        }
        let (auth, _) = broadcast::channel(AUTH_CHANNEL_CAPACITY);
        Ok(Self {
            client: reqwest::Client::new(),
            url: config.url.trim_end_matches('/').to_owned(),
            anon_key: config.anon_key.clone(),
            session: Arc::new(RwLock::new(None)),
            auth,
        })
    }

    fn bearer(&self) -> String {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or_else(|| self.anon_key.clone(), |s| s.access_token.clone())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.url))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.bearer()))
    }

    fn table_request(&self, method: Method, query: &Query) -> RequestBuilder {
        self.request(method, &format!("/rest/v1/{}", query.table))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub(crate) async fn select(&self, query: &Query) -> Result<Vec<Value>, BackendError> {
        tracing::debug!(table = %query.table, "Backend select");
        let response = self
            .table_request(Method::GET, query)
            .query(&query.params())
            .send()
            .await?;
        rows(read_json(response, &query.table).await?)
    }

    pub(crate) async fn insert(&self, query: &Query, row: Value) -> Result<Value, BackendError> {
        tracing::debug!(table = %query.table, "Backend insert");
        let response = self
            .table_request(Method::POST, query)
            .query(&[("select", query.select.as_str())])
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&row)
            .send()
            .await?;
        first_row(read_json(response, &query.table).await?, &query.table)
    }

    pub(crate) async fn update(
        &self,
        query: &Query,
        changes: Value,
    ) -> Result<Vec<Value>, BackendError> {
        tracing::debug!(table = %query.table, "Backend update");
        let response = self
            .table_request(Method::PATCH, query)
            .query(&query.params())
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&changes)
            .send()
            .await?;
        rows(read_json(response, &query.table).await?)
    }

    pub(crate) async fn upsert(&self, query: &Query, row: Value) -> Result<Value, BackendError> {
        tracing::debug!(table = %query.table, "Backend upsert");
        let response = self
            .table_request(Method::POST, query)
            .query(&[
                ("select", query.select.as_str()),
                ("on_conflict", query.conflict_column()),
            ])
            .header("Prefer", PREFER_MERGE)
            .json(&row)
            .send()
            .await?;
        first_row(read_json(response, &query.table).await?, &query.table)
    }

    pub(crate) async fn rpc(&self, name: &str, args: &Value) -> Result<Value, BackendError> {
        tracing::debug!(procedure = name, "Backend rpc");
        let response = self
            .request(Method::POST, &format!("/rest/v1/rpc/{name}"))
            .json(args)
            .send()
            .await?;
        read_json(response, name).await.map_err(|error| match error {
            BackendError::Api { message, .. } => BackendError::Rpc {
                name: name.to_owned(),
                message,
            },
            other => other,
        })
    }

    // -----------------------------------------------------------------------
    // Auth
    // -----------------------------------------------------------------------

    pub(crate) fn session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, BackendError> {
        let response = self
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "password")])
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let session: Session = serde_json::from_value(read_auth(response).await?)?;
        self.store_session(AuthEvent::SignedIn, Some(session.clone()));
        Ok(AuthResponse {
            user: session.user.clone(),
            session: Some(session),
        })
    }

    pub(crate) async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<AuthResponse, BackendError> {
        let response = self
            .request(Method::POST, "/auth/v1/signup")
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": metadata,
            }))
            .send()
            .await?;
        let body = read_auth(response).await?;

        // Accounts awaiting confirmation come back as a bare user.
        if body.get("access_token").is_none() {
            let user: User = serde_json::from_value(body)?;
            return Ok(AuthResponse {
                user,
                session: None,
            });
        }
        let session: Session = serde_json::from_value(body)?;
        self.store_session(AuthEvent::SignedIn, Some(session.clone()));
        Ok(AuthResponse {
            user: session.user.clone(),
            session: Some(session),
        })
    }

    pub(crate) async fn sign_out(&self) -> Result<(), BackendError> {
        let result = self.request(Method::POST, "/auth/v1/logout").send().await;
        // The local session ends even when the server call fails.
        self.store_session(AuthEvent::SignedOut, None);
        read_auth(result?).await.map(drop)
    }

    pub(crate) fn auth_changes(&self) -> broadcast::Receiver<AuthChange> {
        self.auth.subscribe()
    }

    fn store_session(&self, event: AuthEvent, session: Option<Session>) {
        self.session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clone_from(&session);
        self.auth.send(AuthChange { event, session }).ok();
    }
}

/// Error body returned by PostgREST and GoTrue. Field names differ
/// between the two.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<Value>,
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn code(&self) -> Option<String> {
        self.code.as_ref().map(|code| match code {
            Value::String(code) => code.clone(),
            other => other.to_string(),
        })
    }

    fn message(self, raw: &str) -> String {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
            .unwrap_or_else(|| raw.to_owned())
    }
}

async fn read_json(response: Response, table: &str) -> Result<Value, BackendError> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        return Ok(serde_json::from_str(&body)?);
    }
    Err(api_error(status.as_u16(), &body, table))
}

async fn read_auth(response: Response) -> Result<Value, BackendError> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        return Ok(serde_json::from_str(&body)?);
    }
    let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
    Err(BackendError::Auth(parsed.message(&body)))
}

fn api_error(status: u16, body: &str, table: &str) -> BackendError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.code();
    if code.as_deref() == Some(NO_ROWS_CODE) {
        return BackendError::NotFound {
            table: table.to_owned(),
        };
    }
    BackendError::Api {
        status,
        code,
        message: parsed.message(body),
    }
}

fn rows(body: Value) -> Result<Vec<Value>, BackendError> {
    match body {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(Vec::new()),
        other => Ok(vec![other]),
    }
}

fn first_row(body: Value, table: &str) -> Result<Value, BackendError> {
    rows(body)?
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::NotFound {
            table: table.to_owned(),
        })
}
