//! Web viewer: recent alerts as an auto-refreshing page plus a small JSON API.
//!
//! Shared state is the alert buffer the web sink writes into and the
//! location provider, both read-only from the handlers' side.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use milwatch_core::LocationProvider;
use tower_http::cors::{Any, CorsLayer};

use crate::sinks::AlertBuffer;

pub mod pages;
pub mod routes;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub alerts: Arc<AlertBuffer>,
    pub location: Arc<LocationProvider>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(pages::index))
        .route("/api/alerts", get(routes::api_alerts))
        .route("/api/location", get(routes::api_location))
        .with_state(state)
        .layer(cors)
}

/// Start the web server. Runs until the listener fails.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> std::io::Result<()> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Alert viewer listening on http://{addr}");
    axum::serve(listener, app).await
}
