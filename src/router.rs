use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::{
    api::{api_key::require_api_key, health_checks, request_logging::log_requests},
    app::App,
    conference, email_api,
};

/// Probes are public; everything under `/api` needs an API key.
pub fn router(app: App) -> Router {
    let api = Router::new()
        .nest("/email", email_api::routes(&app))
        .nest("/submissions", conference::routes(&app))
        .layer(middleware::from_fn_with_state(app.clone(), require_api_key));

    Router::new()
        .route("/liveness", get(health_checks::ok))
        .route("/readiness", get(health_checks::readiness))
        .nest("/api", api)
        .with_state(app)
        .layer(middleware::from_fn(log_requests))
        .layer(TraceLayer::new_for_http())
}
