use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use validator::ValidationErrors;

use super::api_error::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    #[error("Invalid JSON format")]
    InvalidJson(JsonRejection),
    /// The body hit the route's `DefaultBodyLimit` before it could be parsed.
    #[error("Request body too large")]
    BodyTooLarge,
    #[error("Validation error")]
    ValidationError(ValidationErrors),
}

impl From<JsonRejection> for JsonError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::BodyTooLarge
        } else {
            Self::InvalidJson(rejection)
        }
    }
}

impl From<JsonError> for ApiError {
    fn from(error: JsonError) -> Self {
        match error {
            JsonError::InvalidJson(rejection) => Self::InvalidJson(rejection.body_text()),
            // Only attachments make a body this large
            JsonError::BodyTooLarge => Self::invalid_field(
                "attachments",
                "request body exceeds the size limit; attachments must total at most 25 MiB",
            ),
            JsonError::ValidationError(errors) => Self::Validation(errors),
        }
    }
}

impl IntoResponse for JsonError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
