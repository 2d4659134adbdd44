//! HTTP routes for the relay façade
//!
//! Thin layer over the sync core: each handler builds a query, runs the
//! synchronous core inside `spawn_blocking`, and maps the outcome to
//! the JSON envelope.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use scores::{
    sync_scores, IntraClient, NotificationSink, ScoreQuery, ScoreStore, SyncOutcome, TokenManager,
};

use crate::error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<TokenManager>,
    pub client: Arc<IntraClient>,
    pub store: Arc<dyn ScoreStore>,
    pub sink: Arc<dyn NotificationSink>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/coalition-scores", post(sync_user_scores))
        .route("/coalition-scores/active", post(sync_active_scores))
        .route("/coalition-scores/coalition", post(sync_coalition_scores))
        .route("/auth/42", get(auth_redirect))
        .route("/callback", get(auth_callback))
        .route("/fetch", post(raw_fetch))
        .route("/history", get(history))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct UserSyncRequest {
    #[serde(default)]
    user_id: i64,
}

#[derive(Debug, Deserialize)]
struct CoalitionSyncRequest {
    #[serde(default)]
    coalition_id: i64,
    max_pages: Option<u32>,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActiveSyncRequest {
    max_pages: Option<u32>,
    filter_key: Option<String>,
    filter_value: Option<String>,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FetchRequest {
    endpoint: Option<String>,
    store: Option<bool>,
}

/// Run one sync on the blocking pool and map the outcome.
async fn run_sync(
    state: AppState,
    query: ScoreQuery,
    token_override: Option<String>,
) -> Result<Json<SyncOutcome>, ApiError> {
    let outcome = tokio::task::spawn_blocking(move || {
        sync_scores(
            state.client.as_ref(),
            state.store.as_ref(),
            Some(state.sink.as_ref()),
            &query,
            token_override.as_deref(),
        )
    })
    .await
    .map_err(|e| ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        error: "db_failed".to_string(),
        details: format!("sync task panicked: {}", e),
    })??;

    Ok(Json(outcome))
}

async fn sync_user_scores(
    State(state): State<AppState>,
    Json(req): Json<UserSyncRequest>,
) -> Result<Json<SyncOutcome>, ApiError> {
    run_sync(
        state,
        ScoreQuery::User {
            user_id: req.user_id,
        },
        None,
    )
    .await
}

async fn sync_coalition_scores(
    State(state): State<AppState>,
    Json(req): Json<CoalitionSyncRequest>,
) -> Result<Json<SyncOutcome>, ApiError> {
    run_sync(
        state,
        ScoreQuery::Coalition {
            coalition_id: req.coalition_id,
            max_pages: req.max_pages,
        },
        req.access_token,
    )
    .await
}

async fn sync_active_scores(
    State(state): State<AppState>,
    Json(req): Json<ActiveSyncRequest>,
) -> Result<Json<SyncOutcome>, ApiError> {
    run_sync(
        state,
        ScoreQuery::Active {
            filter_key: req.filter_key,
            filter_value: req.filter_value,
            max_pages: req.max_pages,
        },
        req.access_token,
    )
    .await
}

/// Interactive bootstrap: send the operator to the upstream consent page.
async fn auth_redirect(State(state): State<AppState>) -> Redirect {
    Redirect::temporary(&state.auth.authorize_url())
}

/// Authorization-code landing; exchanges the code and seeds credentials.
async fn auth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<Value>, ApiError> {
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("code is required"))?;

    let cred =
        tokio::task::spawn_blocking(move || state.auth.exchange_code(&code))
            .await
            .map_err(|e| ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: "auth_failed".to_string(),
                details: format!("exchange task panicked: {}", e),
            })??;

    log::info!("authorization code exchanged; credentials seeded");
    Ok(Json(json!({
        "status": "authorized",
        "expires_at": cred.expires_at,
    })))
}

/// Authorized raw GET against any upstream endpoint; optionally appends
/// the payload to the audit table.
async fn raw_fetch(
    State(state): State<AppState>,
    Json(req): Json<FetchRequest>,
) -> Result<Json<Value>, ApiError> {
    let endpoint = req.endpoint.unwrap_or_else(|| "/v2/me".to_string());
    if !endpoint.starts_with('/') {
        return Err(ApiError::bad_request("endpoint must start with '/'"));
    }
    let store_payload = req.store.unwrap_or(true);

    let payload = tokio::task::spawn_blocking(move || {
        let payload = state.client.get_json(&endpoint, None)?;
        if store_payload {
            state.store.record_response(&endpoint, &payload)?;
        }
        Ok::<Value, scores::SyncError>(payload)
    })
    .await
    .map_err(|e| ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        error: "fetch_failed".to_string(),
        details: format!("fetch task panicked: {}", e),
    })??;

    Ok(Json(payload))
}

/// Last 100 audit rows, newest first.
async fn history(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = tokio::task::spawn_blocking(move || state.store.list_responses(100))
        .await
        .map_err(|e| ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "db_failed".to_string(),
            details: format!("history task panicked: {}", e),
        })??;
    Ok(Json(rows))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
