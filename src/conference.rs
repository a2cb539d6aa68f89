//! Abstract submissions, their review, payment proofs and the letters and
//! notifications that follow each decision.

pub mod access;
pub mod handlers;
pub mod letter;
pub mod notifications;
pub mod payments;
pub mod storage;
pub mod submissions;
pub mod templates;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::app::App;

/// Multipart framing on top of the file itself.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn routes(app: &App) -> Router<App> {
    Router::new()
        .route("/{id}/payment", post(handlers::upload_payment))
        .layer(DefaultBodyLimit::max(
            app.config.storage.max_upload_bytes + UPLOAD_OVERHEAD_BYTES,
        ))
        .route("/", post(handlers::create).get(handlers::list))
        .route("/{id}", get(handlers::show).patch(handlers::update))
        .route("/{id}/review", post(handlers::review))
        .route("/{id}/payment/proof", get(handlers::payment_proof))
        .route("/{id}/payment/review", post(handlers::review_payment))
        .route("/{id}/loa", get(handlers::letter_of_acceptance))
        .route("/{id}/notifications", get(handlers::notifications))
}
