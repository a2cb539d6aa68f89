use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::{api::ApiError, app::App};

pub const API_KEY_HEADER: &str = "x-api-key";

/// The caller behind an accepted API key, as a non-reversible fingerprint.
///
/// Inserted into both request and response extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiClient(pub String);

impl ApiClient {
    fn from_key(key: &str) -> Self {
        let visible: String = key.chars().take(4).collect();
        Self(format!("{visible}****"))
    }
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0_u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn is_known_key(candidate: &str, keys: &[String]) -> bool {
    keys.iter()
        .fold(false, |found, key| {
            constant_time_eq(candidate.as_bytes(), key.as_bytes()) | found
        })
}

/// Rejects requests whose `X-API-Key` header is missing or not configured.
pub async fn require_api_key(State(app): State<App>, mut req: Request, next: Next) -> Response {
    let Some(header) = req.headers().get(API_KEY_HEADER) else {
        debug!("Request to {} without API key", req.uri().path());
        return ApiError::MissingApiKey.into_response();
    };

    let key = header.to_str().unwrap_or_default().trim();
    if key.is_empty() {
        return ApiError::MissingApiKey.into_response();
    }

    if !is_known_key(key, &app.config.email_api.api_keys) {
        warn!(
            client = %ApiClient::from_key(key).0,
            path = req.uri().path(),
            "Rejected unknown API key"
        );
        return ApiError::InvalidApiKey.into_response();
    }

    let client = ApiClient::from_key(key);
    req.extensions_mut().insert(client.clone());

    let mut response = next.run(req).await;
    response.extensions_mut().insert(client);
    response
}
