use chrono::{DateTime, Utc};
use sea_orm::{sea_query::OnConflict, EntityTrait, Set};
use serde::Serialize;
use tracing::{error, info, warn};

use super::request::SendEmailRequest;
use crate::{
    app::App,
    database::models::{email_log, notification_kind::EmailLogStatus},
    emails::{self, generate_message_id, EmailError},
};

/// Who asked for a send, carried onto the audit row.
#[derive(Debug, Clone, Default, Serialize, serde::Deserialize)]
pub struct SendContext {
    pub request_id: Option<String>,
    pub api_client: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    pub message_id: String,
    pub recipients: usize,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct SendFailure {
    pub message_id: String,
    pub error: EmailError,
}

/// Sends a validated request and writes its audit row, whatever the outcome.
///
/// A failure to write the audit row is logged and does not change the result.
pub async fn send(
    app: &App,
    request: &SendEmailRequest,
    message_id: Option<String>,
    context: &SendContext,
) -> Result<SendOutcome, SendFailure> {
    let sender = app.config.email.sender();
    let message_id = message_id.unwrap_or_else(|| generate_message_id(&sender));

    let (result, attachment_bytes) = match request.to_outgoing() {
        Ok(outgoing) => {
            let bytes: usize = outgoing.attachments.iter().map(|a| a.data.len()).sum();
            (
                emails::send_email(app, outgoing, Some(message_id.clone())).await,
                bytes,
            )
        }
        Err(e) => (Err(e), 0),
    };
    let sent_at = Utc::now();

    match &result {
        Ok(_) => info!(
            message_id = %message_id,
            request_id = context.request_id.as_deref().unwrap_or("-"),
            client = context.api_client.as_deref().unwrap_or("-"),
            recipients = request.recipient_count(),
            attachments = request.attachments.len(),
            "email sent"
        ),
        Err(e) => warn!(
            message_id = %message_id,
            request_id = context.request_id.as_deref().unwrap_or("-"),
            client = context.api_client.as_deref().unwrap_or("-"),
            error = %e,
            "email send failed"
        ),
    }

    let audit = Audit {
        message_id: &message_id,
        attachment_bytes,
        sent_at,
    };
    record_audit(app, request, context, &audit, &result).await;

    match result {
        Ok(_) => Ok(SendOutcome {
            message_id,
            recipients: request.recipient_count(),
            sent_at,
        }),
        Err(error) => Err(SendFailure { message_id, error }),
    }
}

struct Audit<'a> {
    message_id: &'a str,
    attachment_bytes: usize,
    sent_at: DateTime<Utc>,
}

async fn record_audit(
    app: &App,
    request: &SendEmailRequest,
    context: &SendContext,
    audit: &Audit<'_>,
    result: &Result<String, EmailError>,
) {
    let row = email_log::ActiveModel {
        id: Set(uuid::Uuid::new_v4()),
        created_at: sea_orm::NotSet,
        updated_at: sea_orm::NotSet,
        message_id: Set(audit.message_id.to_string()),
        request_id: Set(context.request_id.clone()),
        api_client: Set(context.api_client.clone()),
        sender: Set(app.config.email.sender().email.to_string()),
        recipients: Set(request.recipients_json()),
        subject: Set(request.subject.clone()),
        status: Set(if result.is_ok() {
            EmailLogStatus::Sent
        } else {
            EmailLogStatus::Failed
        }),
        attachment_count: Set(i32::try_from(request.attachments.len()).unwrap_or(i32::MAX)),
        attachment_bytes: Set(i64::try_from(audit.attachment_bytes).unwrap_or(i64::MAX)),
        error_message: Set(result.as_ref().err().map(ToString::to_string)),
        sent_at: Set(result.is_ok().then(|| audit.sent_at.naive_utc())),
    };

    // Queued sends retry under the same Message-ID; the latest attempt wins
    let upsert = email_log::Entity::insert(row).on_conflict(
        OnConflict::column(email_log::Column::MessageId)
            .update_columns([
                email_log::Column::Status,
                email_log::Column::ErrorMessage,
                email_log::Column::SentAt,
            ])
            .to_owned(),
    );

    if let Err(e) = upsert.exec(app.db.as_ref()).await {
        error!(message_id = audit.message_id, "Failed to write email audit log: {e}");
    }
}
