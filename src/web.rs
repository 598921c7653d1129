use std::net::SocketAddr;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{header, Method},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::api_errors::AppError;
use crate::app_state::AppState;
use crate::log_entry::LogEntry;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SubmitLogRequest {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub message: String,
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Router exposing ingestion, listing, the live event stream and health checks.
///
/// Handlers read the caller's address from `ConnectInfo<SocketAddr>`, so the
/// router must be served with `into_make_service_with_connect_info`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        // current endpoints
        .route("/log", post(submit_log))
        .route("/logs", post(submit_log).get(list_logs))
        .route("/events", get(stream_events))
        // versioned aliases
        .route("/v1/api/log", post(submit_log))
        .route("/api/v1/logs", post(submit_log).get(list_logs))
        // health endpoints
        .route("/healthz", get(healthz))
        .layer(cors_layer())
        .with_state(state)
}

async fn index() -> &'static str {
    "Woodchuck"
}

async fn submit_log(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    payload: Result<Json<SubmitLogRequest>, JsonRejection>,
) -> Result<Json<LogEntry>, AppError> {
    let Json(req) = payload?;
    let remote = addr.ip().to_string();

    match state.ingest.submit(&remote, &req.level, &req.message).await {
        Ok(entry) => Ok(Json(entry)),
        Err(e) => {
            if e.is_validation() {
                tracing::debug!(remote = %remote, error = %e, "rejected log submission");
            }
            Err(e.into())
        }
    }
}

async fn list_logs(State(state): State<AppState>) -> Result<Json<Vec<LogEntry>>, AppError> {
    Ok(Json(state.ingest.list_all().await?))
}

async fn stream_events(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let feed = state
        .ingest
        .feed()
        .ok_or_else(|| AppError::not_found("live feed is disabled"))?;

    let subscription = feed.subscribe();
    tracing::debug!(subscribers = feed.subscriber_count(), "live subscriber attached");

    let events = subscription
        .into_stream()
        .map(|entry| Event::default().json_data(&entry));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "last_log_id": state.ingest.last_issued_id(),
        "started_at": state.started_at,
    }))
}
