//! API-key protected endpoints for trusted integrations that send transactional email.

pub mod handlers;
pub mod request;
pub mod service;
pub mod statistics;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::app::App;

pub fn routes(app: &App) -> Router<App> {
    Router::new()
        .route("/send", post(handlers::send))
        .route("/queue", post(handlers::queue))
        .layer(DefaultBodyLimit::max(app.config.email_api.max_request_bytes))
        .route("/statistics", get(handlers::statistics))
        .route("/health", get(handlers::health))
}
