use crate::state::AppState;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use fleet_core::{compute_status, EventEnvelope, StatusSnapshot};
use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn make_router_with_cors(state: AppState, cors_origin: &str) -> Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("invalid CORS origin: {cors_origin}"))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Ok(Router::new()
        .route("/api/v1/meta", get(meta_handler))
        .route("/api/v1/snapshot", get(snapshot_handler))
        .route("/api/v1/status", get(status_handler))
        .route("/api/v1/stream", get(stream_handler))
        .route("/api/v1/save", post(save_handler))
        .route("/api/v1/pause", post(pause_handler))
        .route("/api/v1/resume", post(resume_handler))
        .route("/api/v1/reset", post(reset_handler))
        .route("/api/v1/resync", post(resync_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

pub async fn meta_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let session = app_state.session.lock();
    Json(serde_json::json!({
        "tick": session.state.meta.tick,
        "allocator_id": session.state.meta.allocator_id,
        "schema_version": session.state.meta.schema_version,
        "ticks_per_sec": app_state.ticks_per_sec,
        "paused": app_state.paused.load(Ordering::Relaxed),
        "inbox": session.inbox.len(),
    }))
}

pub async fn snapshot_handler(
    State(app_state): State<AppState>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let session = app_state.session.lock();
    let result = serde_json::to_string(&session.state);
    drop(session);
    match result {
        Ok(json) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            json,
        ),
        Err(err) => {
            tracing::error!("snapshot serialization failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"error":"serialization failed"}"#.to_string(),
            )
        }
    }
}

pub async fn status_handler(State(app_state): State<AppState>) -> Json<StatusSnapshot> {
    let session = app_state.session.lock();
    Json(compute_status(&session.state))
}

pub async fn save_handler(
    State(app_state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(path) = app_state.state_path.clone() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "no state file (start with --state)"})),
        );
    };

    let (tick, result) = {
        let session = app_state.session.lock();
        (
            session.state.meta.tick,
            fleet_world::save_state(&path, &session.state),
        )
    };
    if let Err(err) = result {
        tracing::error!("save failed: {err:#}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": format!("{err:#}")})),
        );
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({"path": path.display().to_string(), "tick": tick})),
    )
}

pub async fn pause_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    app_state.paused.store(true, Ordering::Relaxed);
    Json(serde_json::json!({"paused": true}))
}

pub async fn resume_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    app_state.paused.store(false, Ordering::Relaxed);
    Json(serde_json::json!({"paused": false}))
}

/// Events produced outside the tick loop still reach stream subscribers.
fn publish(app_state: &AppState, events: Vec<EventEnvelope>) -> usize {
    let count = events.len();
    let _ = app_state.event_tx.send(events);
    count
}

pub async fn reset_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let events = app_state.session.lock().reset_orders();
    let count = publish(&app_state, events);
    Json(serde_json::json!({"reset": true, "events": count}))
}

pub async fn resync_handler(State(app_state): State<AppState>) -> Json<serde_json::Value> {
    let events = app_state.session.lock().resync();
    let count = publish(&app_state, events);
    Json(serde_json::json!({"resync": true, "events": count}))
}

pub async fn stream_handler(
    State(app_state): State<AppState>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = app_state.event_tx.subscribe();
    let session = app_state.session.clone();

    let stream = async_stream::stream! {
        let mut heartbeat = tokio::time::interval(Duration::from_millis(500));
        heartbeat.tick().await;
        let mut flush = tokio::time::interval(Duration::from_millis(50));
        flush.tick().await;
        let mut pending: Vec<EventEnvelope> = Vec::new();
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(events) => pending.extend(events),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "event stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = flush.tick() => {
                    if !pending.is_empty() {
                        let data = serde_json::to_string(&pending).unwrap_or_default();
                        pending.clear();
                        yield Ok(Event::default().data(data));
                    }
                }
                _ = heartbeat.tick() => {
                    let tick = session.lock().state.meta.tick;
                    let hb = serde_json::json!({"heartbeat": true, "tick": tick});
                    yield Ok(Event::default().data(hb.to_string()));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}
