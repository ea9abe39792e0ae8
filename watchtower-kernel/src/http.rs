/**
 * OBSERVER API - Surface HTTP du moniteur
 *
 * RÔLE :
 * Vues JSON en lecture seule des devices suivis pour dashboards et scripts,
 * plus quelques actions opérateur (manual check, reload, wake).
 *
 * FONCTIONNEMENT :
 * - Router Axum sur un AppState qui porte le Monitor partagé
 * - routes GET ouvertes, routes POST derrière require_api_key
 * - les handlers appellent seulement Monitor/PollScheduler, aucun état ici
 *
 * SÉCURITÉ :
 * - routes POST : header x-api-key égal à WATCHTOWER_API_KEY obligatoire
 * - si WATCHTOWER_API_KEY n'est pas défini, tout POST est refusé
 */

use crate::health::MonitorHealth;
use crate::models::OutageEvent;
use crate::monitor::Monitor;
use crate::notify::LogLine;
use crate::scheduler::{ManualCheck, PollScheduler};
use crate::tracker::{DeviceSnapshot, StatusSummary, SyncReport};
use crate::wol::{wake as send_wake, WakeError};
use axum::extract::{Path, Query, Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const API_KEY_ENV: &str = "WATCHTOWER_API_KEY";
const DEFAULT_RECENT: usize = 10;
const DEFAULT_ACTIVITY: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
    pub scheduler: Arc<PollScheduler>,
}

impl AppState {
    pub fn new(monitor: Arc<Monitor>) -> Self {
        let scheduler = Arc::new(PollScheduler::new(monitor.clone()));
        Self { monitor, scheduler }
    }
}

async fn require_api_key(req: Request, next: Next) -> Result<Response, StatusCode> {
    if req.method() != Method::POST {
        return Ok(next.run(req).await);
    }

    let expected = std::env::var(API_KEY_ENV).unwrap_or_default();
    if expected.is_empty() {
        tracing::warn!(path = %req.uri().path(), "WATCHTOWER_API_KEY not set, refusing mutating request");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        tracing::warn!(path = %req.uri().path(), "rejected request with bad api key");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/devices", get(list_devices))
        .route("/devices/{address}", get(get_device))
        .route("/devices/{address}/history", get(get_history))
        .route("/summary", get(get_summary))
        .route("/activity", get(get_activity))
        .route("/check", post(manual_check))
        .route("/reload", post(reload))
        .route("/wake", post(wake))
        .with_state(app_state)
        .layer(middleware::from_fn(require_api_key))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error(status: StatusCode, message: impl ToString) -> Response {
    (status, Json(ErrorBody { error: message.to_string() })).into_response()
}

#[derive(Debug, Deserialize)]
struct RecentParams {
    recent: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    n: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ActivityParams {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct WakeParams {
    address: String,
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<MonitorHealth> {
    Json(app.monitor.health())
}

// GET /devices?recent=N
async fn list_devices(State(app): State<AppState>, Query(p): Query<RecentParams>) -> Json<Vec<DeviceSnapshot>> {
    Json(app.monitor.snapshot(p.recent.unwrap_or(DEFAULT_RECENT)))
}

// GET /devices/{address}
async fn get_device(
    State(app): State<AppState>,
    Path(address): Path<String>,
    Query(p): Query<RecentParams>,
) -> Result<Json<DeviceSnapshot>, StatusCode> {
    app.monitor
        .device(&address, p.recent.unwrap_or(DEFAULT_RECENT))
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

// GET /devices/{address}/history?n=N
async fn get_history(
    State(app): State<AppState>,
    Path(address): Path<String>,
    Query(p): Query<HistoryParams>,
) -> Result<Json<Vec<OutageEvent>>, StatusCode> {
    app.monitor
        .history(&address, p.n.unwrap_or(DEFAULT_RECENT))
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

// GET /summary
async fn get_summary(State(app): State<AppState>) -> Json<StatusSummary> {
    Json(app.monitor.summary())
}

// GET /activity?limit=N
async fn get_activity(State(app): State<AppState>, Query(p): Query<ActivityParams>) -> Json<Vec<LogLine>> {
    Json(app.monitor.activity(p.limit.unwrap_or(DEFAULT_ACTIVITY)))
}

// POST /check
async fn manual_check(State(app): State<AppState>) -> Json<Vec<ManualCheck>> {
    Json(app.scheduler.manual_check().await)
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    devices: usize,
    added: Vec<String>,
    removed: Vec<String>,
}

// POST /reload
async fn reload(State(app): State<AppState>) -> Response {
    match app.monitor.reload_from_path().await {
        Ok(SyncReport { added, removed, .. }) => Json(ReloadResponse {
            devices: app.monitor.registry().len(),
            added,
            removed,
        })
        .into_response(),
        Err(e) => error(StatusCode::UNPROCESSABLE_ENTITY, e),
    }
}

// POST /wake?address=A
async fn wake(State(app): State<AppState>, Query(p): Query<WakeParams>) -> Response {
    let Some(device) = app.monitor.find_device(&p.address) else {
        return error(StatusCode::NOT_FOUND, WakeError::UnknownDevice(p.address));
    };
    let broadcast = app.monitor.settings().wol_broadcast;
    match send_wake(&device, &broadcast).await {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(e @ (WakeError::NoMac(_) | WakeError::InvalidMac(_))) => error(StatusCode::BAD_REQUEST, e),
        Err(e) => error(StatusCode::BAD_GATEWAY, e),
    }
}
