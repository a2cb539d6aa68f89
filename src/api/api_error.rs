use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::{ValidationErrors, ValidationErrorsKind};

pub type ApiResult<T> = Result<T, ApiError>;

/// Every error an API handler can answer with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing API key")]
    MissingApiKey,
    #[error("Invalid API key")]
    InvalidApiKey,
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Validation failed")]
    Validation(ValidationErrors),
    #[error("Validation failed")]
    InvalidFields(BTreeMap<String, Vec<String>>),
    #[error("Failed to send email: {reason}")]
    EmailSendFailed { message_id: String, reason: String },
    #[error("Failed to queue email: {0}")]
    QueueFailed(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("This email address is not allowed to submit")]
    EmailNotAllowed,
    #[error("{0}")]
    InvalidStatusTransition(String),
    #[error("{0}")]
    PaymentNotAllowed(String),
    #[error("{0}")]
    InvalidUpload(String),
    #[error("{0}")]
    LoaUnavailable(String),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error_code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<BTreeMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
}

impl ApiError {
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "MISSING_API_KEY",
            Self::InvalidApiKey => "INVALID_API_KEY",
            Self::InvalidJson(_) => "INVALID_JSON",
            Self::Validation(_) | Self::InvalidFields(_) => "VALIDATION_ERROR",
            Self::EmailSendFailed { .. } => "EMAIL_SEND_FAILED",
            Self::QueueFailed(_) => "QUEUE_FAILED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::EmailNotAllowed => "EMAIL_NOT_ALLOWED",
            Self::InvalidStatusTransition(_) => "INVALID_STATUS_TRANSITION",
            Self::PaymentNotAllowed(_) => "PAYMENT_NOT_ALLOWED",
            Self::InvalidUpload(_) => "INVALID_UPLOAD",
            Self::LoaUnavailable(_) => "LOA_UNAVAILABLE",
            Self::Database(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingApiKey | Self::InvalidApiKey => StatusCode::UNAUTHORIZED,
            Self::InvalidJson(_) | Self::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) | Self::InvalidFields(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) | Self::EmailNotAllowed => StatusCode::FORBIDDEN,
            Self::InvalidStatusTransition(_)
            | Self::PaymentNotAllowed(_)
            | Self::LoaUnavailable(_) => StatusCode::CONFLICT,
            Self::QueueFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::EmailSendFailed { .. } | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Single-field validation failure.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidFields(BTreeMap::from([(field.to_string(), vec![message.into()])]))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            // Details of unexpected failures stay in the log
            Self::Database(e) => {
                error!("Database error while handling request: {e}");
                "An internal error occurred".to_string()
            }
            Self::Internal(e) => {
                error!("Internal error while handling request: {e}");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            success: false,
            error_code: self.error_code(),
            message,
            errors: match &self {
                Self::Validation(errors) => Some(field_messages(errors)),
                Self::InvalidFields(errors) => Some(errors.clone()),
                _ => None,
            },
            message_id: match self {
                Self::EmailSendFailed { message_id, .. } => Some(message_id),
                _ => None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Flattens nested validator output into `field -> messages`, with list
/// entries addressed as `attachments[0].filename`.
pub fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    let mut out = BTreeMap::new();
    collect_messages(errors, "", &mut out);
    out
}

fn collect_messages(
    errors: &ValidationErrors,
    prefix: &str,
    out: &mut BTreeMap<String, Vec<String>>,
) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let messages = out.entry(path).or_default();
                messages.extend(field_errors.iter().map(|e| {
                    e.message
                        .as_ref()
                        .map_or_else(|| e.code.to_string(), ToString::to_string)
                }));
            }
            ValidationErrorsKind::Struct(nested) => collect_messages(nested, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_messages(nested, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use validator::ValidationError;

    use super::*;

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("reads body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn test_not_found_body() {
        let (status, body) = body_json(ApiError::NotFound("Submission")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error_code"], "NOT_FOUND");
        assert_eq!(body["message"], "Submission not found");
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let (status, body) = body_json(ApiError::Internal("disk on fire".to_string())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error_code"], "INTERNAL_ERROR");
        assert_eq!(body["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn test_send_failure_carries_message_id() {
        let (status, body) = body_json(ApiError::EmailSendFailed {
            message_id: "<id@example.org>".to_string(),
            reason: "connection refused".to_string(),
        })
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message_id"], "<id@example.org>");
    }

    #[tokio::test]
    async fn test_status_transition_conflict() {
        let (status, body) = body_json(ApiError::InvalidStatusTransition(
            "Cannot change status from approved to rejected".to_string(),
        ))
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error_code"], "INVALID_STATUS_TRANSITION");
        assert_eq!(body["message"], "Cannot change status from approved to rejected");
    }

    #[test]
    fn test_field_messages_flattens_lists() {
        let mut item = ValidationErrors::new();
        item.add(
            "filename",
            ValidationError::new("path_separator").with_message("must not contain path separators".into()),
        );
        let mut errors = ValidationErrors::new();
        errors.add("subject", ValidationError::new("length"));
        let mut list = BTreeMap::new();
        list.insert(2, Box::new(item));
        errors
            .errors_mut()
            .insert("attachments".into(), ValidationErrorsKind::List(list));

        let messages = field_messages(&errors);

        assert_eq!(messages["subject"], vec!["length"]);
        assert_eq!(
            messages["attachments[2].filename"],
            vec!["must not contain path separators"]
        );
    }
}
