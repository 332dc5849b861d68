//! Router definition for the share endpoints and web assets.

use crate::{server::handlers, share::SessionManager, ui::web};
use axum::{extract::DefaultBodyLimit, routing::*, Router};

/// Build the router serving both the sender and the receiver side.
pub fn create_router(manager: &SessionManager) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/", get(|| async { web::serve_sender_page() }))
        .route("/receive", get(|| async { web::serve_confirm_page() }))
        .route("/api/start", post(handlers::start_share))
        .route("/api/confirm", post(handlers::confirm_share))
        .route("/api/stream", get(handlers::stream_file))
        .route("/api/stop", post(handlers::stop_share))
        .route("/api/status", get(handlers::share_status))
        .route("/sender.js", get(|| async { web::serve_sender_js() }))
        .route("/confirm.js", get(|| async { web::serve_confirm_js() }))
        .route("/styles.css", get(|| async { web::serve_shared_css() }))
        .with_state(manager.clone())
        .layer(DefaultBodyLimit::max(64 * 1024))
}
