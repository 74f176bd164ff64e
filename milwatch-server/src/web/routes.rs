//! JSON API handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::web::AppState;

/// GET /api/alerts: recent alerts, newest first.
pub async fn api_alerts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.alerts.snapshot())
}

/// GET /api/location: current reference location.
pub async fn api_location(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let loc = state.location.current();
    Json(json!({
        "lat": loc.lat,
        "lon": loc.lon,
        "source": loc.source,
        "label": loc.source.to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
