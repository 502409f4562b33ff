use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use super::{handlers, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Static dashboard files path (configurable via env)
    let static_dir = std::env::var("PRINTFLOW_STATIC_DIR").unwrap_or_else(|_| "static".to_string());

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::metrics));

    // Serve the dashboard with SPA fallback
    let index_path = format!("{}/index.html", static_dir);
    let serve_dir = ServeDir::new(&static_dir).fallback(ServeFile::new(&index_path));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .fallback_service(serve_dir)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
