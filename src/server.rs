//!
//! intelhub HTTP server
//! --------------------
//! Axum JSON API in front of the auth core and the domain repositories.
//!
//! Responsibilities:
//! - Login/logout backed by `AuthService`; each login parks a fresh `Session`
//!   with the `SessionManager` and hands the token back as a cookie and in the body.
//! - Every request resolves its own session from the cookie or a bearer token.
//! - Domain routes pass the resolved identity to the repositories, which run the
//!   access guard themselves.
//! - Error mapping from `AuthError` through `AppError` to HTTP status codes.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::config::Config;
use crate::domains::{IncidentStatus, NewDataset, NewIncident, NewTicket, TicketStatus, Workspace};
use crate::error::{AppError, AppResult, AuthError};
use crate::identity::{require_admin, AuthService, Domain, Identity, Role, Session, SessionManager, SessionToken, TracingAuditSink};
use crate::storage::ParquetUserStore;

const SESSION_COOKIE: &str = "intelhub_session";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub sessions: Arc<SessionManager>,
    pub workspace: Arc<Workspace>,
}

impl AppState {
    pub fn new(auth: AuthService, sessions: SessionManager, workspace: Workspace) -> Self {
        Self { auth: Arc::new(auth), sessions: Arc::new(sessions), workspace: Arc::new(workspace) }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(target: "intelhub", code = %self.code_str(), "request failed: {}", self.message());
        }
        (status, Json(json!({"status": "error", "code": self.code_str(), "error": self.message()}))).into_response()
    }
}

/// Open the on-disk stores under the configured folder.
pub fn build_state(config: &Config) -> anyhow::Result<AppState> {
    std::fs::create_dir_all(&config.db_folder)
        .with_context(|| format!("Failed to create or access data folder: {}", config.db_folder.display()))?;
    let users = ParquetUserStore::open(&config.db_folder)
        .with_context(|| format!("While opening user store under {}", config.db_folder.display()))?;
    let workspace = Workspace::open(&config.db_folder)
        .with_context(|| format!("While opening record tables under {}", config.db_folder.display()))?;
    let auth = AuthService::new(Arc::new(users), config.password_policy(), Arc::new(TracingAuditSink));
    Ok(AppState::new(auth, SessionManager::new(config.session_ttl), workspace))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "intelhub ok" }))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/domains", get(domains))
        .route("/password", post(change_password))
        .route("/incidents", get(list_incidents).post(report_incident))
        .route("/incidents/{id}/status", post(incident_status))
        .route("/datasets", get(list_datasets).post(add_dataset))
        .route("/tickets", get(list_tickets).post(create_ticket))
        .route("/tickets/{id}/assign", post(assign_ticket))
        .route("/tickets/{id}/status", post(ticket_status))
        .route("/tickets/{id}/close", post(close_ticket))
        .route("/admin/users", get(list_users))
        .route("/admin/users/{username}/role", post(reassign_role))
        .with_state(state)
}

/// Start the HTTP server on `config.http_port`.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = build_state(&config)?;
    if config.seed_demo {
        crate::setup::seed_demo(&state.auth, &state.workspace).context("While seeding demo data")?;
    }

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            tick.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                info!(target: "auth", purged, "expired sessions purged");
            }
        }
    });

    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!(target: "intelhub", "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get(header::COOKIE)?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some((k, v)) = p.split_once('=') {
            if k == name { return Some(v.to_string()); }
        }
    }
    None
}

fn token_from_headers(headers: &HeaderMap) -> Option<SessionToken> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    bearer.or_else(|| parse_cookie(headers, SESSION_COOKIE))
}

/// Resolve the caller's identity from its own session.
fn current_identity(state: &AppState, headers: &HeaderMap) -> AppResult<Identity> {
    let token = token_from_headers(headers).ok_or(AuthError::Unauthenticated)?;
    Ok(state.sessions.identity(&token).ok_or(AuthError::Unauthenticated)?)
}

fn session_cookie(token: &str, max_age: u64) -> AppResult<HeaderValue> {
    HeaderValue::from_str(&format!("{}={}; HttpOnly; Secure; SameSite=Strict; Path=/; Max-Age={}", SESSION_COOKIE, token, max_age))
        .map_err(|e| AppError::internal("cookie".to_string(), e.to_string()))
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("intelhub_session=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/")
}

/// Password hashing is CPU bound; keep it off the async workers.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::internal("join".to_string(), e.to_string()))?
        .map_err(AppError::from)
}

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    username: String,
    password: String,
    role: String,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct PasswordPayload {
    old_password: String,
    new_password: String,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    status: String,
}

#[derive(Debug, Deserialize)]
struct AssignPayload {
    assignee: String,
}

#[derive(Debug, Deserialize)]
struct RolePayload {
    role: String,
}

/// Self-service registration. Administrator accounts can only be created by a
/// caller that is already signed in as an administrator.
async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(p): Json<RegisterPayload>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let role: Role = p.role.parse()?;
    if role == Role::Administrator {
        let who = current_identity(&state, &headers).map_err(|_| AuthError::access_denied("administrator registration"))?;
        require_admin(&who, "administrator registration")?;
    }
    let auth = state.auth.clone();
    let username = p.username.clone();
    blocking(move || auth.register(&p.username, &p.password, &p.role)).await?;
    Ok((StatusCode::CREATED, Json(json!({"status": "ok", "username": username}))))
}

async fn login(State(state): State<AppState>, Json(p): Json<LoginPayload>) -> AppResult<(HeaderMap, Json<Value>)> {
    // Read before the credential check: a role change that revokes this user
    // while the hash is verified makes the login fail instead of parking a
    // session with the old role.
    let generation = state.sessions.generation(&p.username);
    let auth = state.auth.clone();
    let (session, identity) = blocking(move || {
        let mut session = Session::new();
        let identity = auth.login_session(&mut session, &p.username, &p.password)?;
        Ok((session, identity))
    })
    .await?;
    let issued = state.sessions.issue_at(session, generation)?;
    info!(target: "auth", user = %identity.username(), session_id = %issued.session_id, "session opened");
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, session_cookie(&issued.token, issued.expires_in.as_secs())?);
    Ok((
        headers,
        Json(json!({
            "status": "ok",
            "token": issued.token,
            "expires_in": issued.expires_in.as_secs(),
            "identity": identity,
            "landing": identity.landing().path(),
        })),
    ))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let mut logged_out = false;
    if let Some(token) = token_from_headers(&headers) {
        if let Some(mut session) = state.sessions.remove(&token) {
            logged_out = state.auth.logout(&mut session);
        }
    }
    let mut h = HeaderMap::new();
    h.insert(header::SET_COOKIE, clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"status": "ok", "logged_out": logged_out})))
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let who = current_identity(&state, &headers)?;
    Ok(Json(json!({
        "status": "ok",
        "identity": who,
        "role_display_name": who.role_display_name(),
        "landing": who.landing().path(),
    })))
}

async fn domains(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let who = current_identity(&state, &headers)?;
    let rows: Vec<Value> = Domain::ALL
        .iter()
        .map(|d| json!({"domain": d.as_str(), "display_name": d.display_name(), "allowed": who.can_access(*d)}))
        .collect();
    Ok(Json(json!({"status": "ok", "domains": rows})))
}

async fn change_password(State(state): State<AppState>, headers: HeaderMap, Json(p): Json<PasswordPayload>) -> AppResult<Json<Value>> {
    let who = current_identity(&state, &headers)?;
    let auth = state.auth.clone();
    let username = who.username().to_string();
    blocking(move || auth.change_password(&username, &p.old_password, &p.new_password)).await?;
    Ok(Json(json!({"status": "ok"})))
}

async fn list_incidents(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let who = current_identity(&state, &headers)?;
    let rows = state.workspace.incidents.list(&who)?;
    Ok(Json(json!({"status": "ok", "incidents": rows})))
}

async fn report_incident(State(state): State<AppState>, headers: HeaderMap, Json(p): Json<NewIncident>) -> AppResult<(StatusCode, Json<Value>)> {
    let who = current_identity(&state, &headers)?;
    let row = state.workspace.incidents.report(&who, p)?;
    Ok((StatusCode::CREATED, Json(json!({"status": "ok", "incident": row}))))
}

async fn incident_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(p): Json<StatusPayload>,
) -> AppResult<Json<Value>> {
    let who = current_identity(&state, &headers)?;
    let status: IncidentStatus = p.status.parse()?;
    let row = state.workspace.incidents.update_status(&who, id, status)?;
    Ok(Json(json!({"status": "ok", "incident": row})))
}

async fn list_datasets(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let who = current_identity(&state, &headers)?;
    let rows = state.workspace.datasets.list(&who)?;
    let total_mb: f64 = rows.iter().map(|d| d.file_size_mb).sum();
    Ok(Json(json!({"status": "ok", "datasets": rows, "total_size_mb": total_mb})))
}

async fn add_dataset(State(state): State<AppState>, headers: HeaderMap, Json(p): Json<NewDataset>) -> AppResult<(StatusCode, Json<Value>)> {
    let who = current_identity(&state, &headers)?;
    let row = state.workspace.datasets.add(&who, p)?;
    Ok((StatusCode::CREATED, Json(json!({"status": "ok", "dataset": row}))))
}

async fn list_tickets(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let who = current_identity(&state, &headers)?;
    let rows = state.workspace.tickets.list(&who)?;
    Ok(Json(json!({"status": "ok", "tickets": rows})))
}

async fn create_ticket(State(state): State<AppState>, headers: HeaderMap, Json(p): Json<NewTicket>) -> AppResult<(StatusCode, Json<Value>)> {
    let who = current_identity(&state, &headers)?;
    let row = state.workspace.tickets.create(&who, p)?;
    Ok((StatusCode::CREATED, Json(json!({"status": "ok", "ticket": row}))))
}

async fn assign_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(p): Json<AssignPayload>,
) -> AppResult<Json<Value>> {
    let who = current_identity(&state, &headers)?;
    let row = state.workspace.tickets.assign(&who, id, &p.assignee)?;
    Ok(Json(json!({"status": "ok", "ticket": row})))
}

async fn ticket_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(p): Json<StatusPayload>,
) -> AppResult<Json<Value>> {
    let who = current_identity(&state, &headers)?;
    let status: TicketStatus = p.status.parse()?;
    let row = state.workspace.tickets.update_status(&who, id, status)?;
    Ok(Json(json!({"status": "ok", "ticket": row})))
}

async fn close_ticket(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<i64>) -> AppResult<Json<Value>> {
    let who = current_identity(&state, &headers)?;
    let row = state.workspace.tickets.close(&who, id)?;
    Ok(Json(json!({"status": "ok", "ticket": row})))
}

async fn list_users(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let who = current_identity(&state, &headers)?;
    let users: Vec<Value> = state
        .auth
        .list_users(&who)?
        .into_iter()
        .map(|(id, username, role)| json!({"id": id, "username": username, "role": role}))
        .collect();
    Ok(Json(json!({"status": "ok", "users": users})))
}

/// Role changes revoke the target's live sessions so the new capabilities
/// apply from their next login.
async fn reassign_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
    Json(p): Json<RolePayload>,
) -> AppResult<Json<Value>> {
    let who = current_identity(&state, &headers)?;
    let role = state.auth.reassign_role(&who, &username, &p.role)?;
    let revoked = state.sessions.revoke_user(&username);
    Ok(Json(json!({"status": "ok", "username": username, "role": role, "revoked_sessions": revoked})))
}
