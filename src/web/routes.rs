use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;
use super::static_files::static_handler;

// UI Routes - web interface
pub fn ui_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::ui::index_handler))
        .route("/static/{*path}", get(static_handler))
}

// API Routes - REST API for the wizard UI
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Session lifecycle
            .route("/session", post(handlers::api::create_session))
            // Upload and dataset store
            .route("/upload", post(handlers::api::upload_dataset))
            .route("/dataset", put(handlers::api::restore_dataset))
            // Wizard state machine
            .route("/wizard", get(handlers::api::get_wizard))
            .route("/wizard/event", post(handlers::api::wizard_event))
            // Query dispatch (retry affordance)
            .route("/query", post(handlers::api::query))
            // System status
            .route("/status", get(handlers::api::system_status)),
    )
}
