use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{Job, JobError};
use crate::{
    app::App,
    conference::{
        letter::{self, LETTER_CONTENT_TYPE},
        payments, submissions,
        templates::{self, NotificationContext, RenderedEmail},
    },
    database::models::{
        email_notification,
        notification_kind::{DeliveryStatus, NotificationKind},
    },
    emails::{self, EmailAttachment, OutgoingEmail},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendNotificationArguments {
    pub notification_id: Uuid,
}

/// Delivers one `email_notification` row and records the outcome on it.
///
/// The row's `retry_count` moves in step with the job's own retries, so a
/// notification is attempted at most `MAX_RETRIES + 1` times.
pub struct SendNotificationJob;

fn retry_later(e: sea_orm::DbErr) -> JobError {
    JobError::TryAgainLater(e.to_string())
}

async fn mark_failed(
    app: &App,
    notification: email_notification::Model,
    reason: &str,
) -> Result<(), JobError> {
    let mut active: email_notification::ActiveModel = notification.into();
    active.status = Set(DeliveryStatus::Failed);
    active.last_error = Set(Some(reason.to_string()));
    active.update(app.db.as_ref()).await.map_err(retry_later)?;
    Ok(())
}

/// Attaches the Letter of Acceptance, or links to it when it cannot be rendered.
async fn with_letter(
    app: &App,
    notification: &email_notification::Model,
    email: OutgoingEmail,
) -> OutgoingEmail {
    let rendered = async {
        let submission = submissions::find(app.db.as_ref(), notification.submission_id)
            .await
            .map_err(|e| e.to_string())?;
        let details = payments::letter_details(app.db.as_ref(), &submission)
            .await
            .map_err(|e| e.to_string())?;
        let pdf = letter::render_blocking(&app.config.conference, &details)
            .await
            .map_err(|e| e.to_string())?;
        Ok::<_, String>((details.filename(), pdf))
    }
    .await;

    match rendered {
        Ok((filename, data)) => email.with_attachment(EmailAttachment {
            filename,
            content_type: LETTER_CONTENT_TYPE.to_string(),
            data,
        }),
        Err(reason) => {
            warn!(
                notification_id = %notification.id,
                "Letter of acceptance not attached, sending a link instead: {reason}"
            );
            let ctx = NotificationContext {
                submission_id: notification.submission_id,
                base_url: app.config.base_url.clone(),
                ..NotificationContext::default()
            };
            let linked = templates::with_loa_link(
                RenderedEmail {
                    subject: email.subject.clone(),
                    text: email.text.clone().unwrap_or_default(),
                    html: email.html.clone().unwrap_or_default(),
                },
                &ctx,
            );
            OutgoingEmail {
                text: Some(linked.text),
                html: Some(linked.html),
                ..email
            }
        }
    }
}

impl Job for SendNotificationJob {
    type Arguments = SendNotificationArguments;

    async fn execute(app: &App, arguments: Self::Arguments) -> Result<(), JobError> {
        let notification = email_notification::Entity::find_by_id(arguments.notification_id)
            .one(app.db.as_ref())
            .await
            .map_err(retry_later)?
            .ok_or_else(|| {
                JobError::FailPermanently(format!(
                    "Notification {} does not exist",
                    arguments.notification_id
                ))
            })?;

        if notification.status != DeliveryStatus::Pending {
            debug!(
                notification_id = %notification.id,
                status = %notification.status,
                "Notification already settled, skipping"
            );
            return Ok(());
        }

        let email = match OutgoingEmail::to_one(
            &notification.recipient,
            notification.subject.clone(),
            notification.body_text.clone(),
            notification.body_html.clone(),
        ) {
            Ok(email) => email,
            Err(e) => {
                let reason = e.to_string();
                mark_failed(app, notification, &reason).await?;
                return Err(JobError::FailPermanently(reason));
            }
        };

        let email = if notification.kind == NotificationKind::PaymentApproved {
            with_letter(app, &notification, email).await
        } else {
            email
        };

        match emails::send_email(app, email, None).await {
            Ok(message_id) => {
                let id = notification.id;
                let mut active: email_notification::ActiveModel = notification.into();
                active.status = Set(DeliveryStatus::Sent);
                active.sent_via = Set(Some(app.mailer.channel().to_string()));
                active.sent_at = Set(Some(chrono::Utc::now().naive_utc()));
                active.last_error = Set(None);
                active.update(app.db.as_ref()).await.map_err(retry_later)?;

                info!(notification_id = %id, message_id = %message_id, "📧 Notification sent");
                Ok(())
            }
            Err(e) => match JobError::from(e) {
                JobError::FailPermanently(reason) => {
                    mark_failed(app, notification, &reason).await?;
                    Err(JobError::FailPermanently(reason))
                }
                JobError::TryAgainLater(reason) if notification.has_retries_left() => {
                    let retry_count = notification.retry_count + 1;
                    warn!(
                        notification_id = %notification.id,
                        retry_count,
                        "Notification delivery failed, will retry: {reason}"
                    );
                    let mut active: email_notification::ActiveModel = notification.into();
                    active.retry_count = Set(retry_count);
                    active.last_error = Set(Some(reason.clone()));
                    active.update(app.db.as_ref()).await.map_err(retry_later)?;
                    Err(JobError::TryAgainLater(reason))
                }
                JobError::TryAgainLater(reason) => {
                    mark_failed(app, notification, &reason).await?;
                    Err(JobError::FailPermanently(format!(
                        "Giving up after {} retries: {reason}",
                        email_notification::MAX_RETRIES
                    )))
                }
            },
        }
    }

    fn name() -> &'static str {
        "send_notification"
    }

    async fn on_failure(app: &App, arguments: serde_json::Value, reason: String) {
        let Some(notification_id) = arguments
            .get("notification_id")
            .and_then(serde_json::Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok())
        else {
            error!("Notification job failed without a usable notification id: {reason}");
            return;
        };

        let result = email_notification::Entity::update_many()
            .set(email_notification::ActiveModel {
                status: Set(DeliveryStatus::Failed),
                last_error: Set(Some(reason.clone())),
                ..Default::default()
            })
            .filter(email_notification::Column::Id.eq(notification_id))
            .filter(email_notification::Column::Status.eq(DeliveryStatus::Pending))
            .exec(app.db.as_ref())
            .await;

        match result {
            Ok(_) => error!(%notification_id, "Notification delivery failed: {reason}"),
            Err(e) => error!(%notification_id, "Failed to mark notification as failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use super::*;
    use crate::tests::{fixtures, test_app};

    fn pending(retry_count: i32) -> email_notification::Model {
        let mut notification = fixtures::notification(Uuid::new_v4());
        notification.retry_count = retry_count;
        notification
    }

    fn settled(
        mut notification: email_notification::Model,
        status: DeliveryStatus,
    ) -> email_notification::Model {
        notification.status = status;
        notification
    }

    fn arguments(notification: &email_notification::Model) -> SendNotificationArguments {
        SendNotificationArguments {
            notification_id: notification.id,
        }
    }

    #[tokio::test]
    async fn test_missing_notification_fails_permanently() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<email_notification::Model>::new()])
            .into_connection();
        let app = test_app(db);

        let result = SendNotificationJob::execute(
            &app,
            SendNotificationArguments {
                notification_id: Uuid::new_v4(),
            },
        )
        .await;

        assert!(matches!(result, Err(JobError::FailPermanently(_))));
    }

    #[tokio::test]
    async fn test_sent_notification_is_not_resent() {
        let notification = settled(pending(0), DeliveryStatus::Sent);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![notification.clone()]])
            .into_connection();
        let app = test_app(db);

        SendNotificationJob::execute(&app, arguments(&notification))
            .await
            .expect("no-op succeeds");

        assert_eq!(app.mailer.messages().map(|m| m.len()), Some(0));
    }

    #[tokio::test]
    async fn test_successful_delivery_marks_sent() {
        let notification = pending(0);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![notification.clone()]])
            .append_query_results([vec![settled(notification.clone(), DeliveryStatus::Sent)]])
            .into_connection();
        let app = test_app(db);

        SendNotificationJob::execute(&app, arguments(&notification))
            .await
            .expect("delivery succeeds");

        let messages = app.mailer.messages().expect("mock mailer");
        assert_eq!(messages.len(), 1);
        let raw = String::from_utf8_lossy(&messages[0].formatted()).into_owned();
        assert!(raw.contains(&notification.recipient));
    }

    #[tokio::test]
    async fn test_transport_failure_is_retried() {
        let notification = pending(1);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![notification.clone()]])
            .append_query_results([vec![notification.clone()]])
            .into_connection();
        let app = test_app(db);
        app.mailer
            .as_mock()
            .expect("mock mailer")
            .set_failure(Some("connection refused"));

        let result = SendNotificationJob::execute(&app, arguments(&notification)).await;

        assert!(matches!(result, Err(JobError::TryAgainLater(_))));
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_permanently() {
        let notification = pending(email_notification::MAX_RETRIES);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![notification.clone()]])
            .append_query_results([vec![settled(notification.clone(), DeliveryStatus::Failed)]])
            .into_connection();
        let app = test_app(db);
        app.mailer
            .as_mock()
            .expect("mock mailer")
            .set_failure(Some("connection refused"));

        let result = SendNotificationJob::execute(&app, arguments(&notification)).await;

        assert!(matches!(result, Err(JobError::FailPermanently(_))));
    }

    #[tokio::test]
    async fn test_invalid_recipient_fails_immediately() {
        let mut notification = pending(0);
        notification.recipient = "not an address".to_string();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![notification.clone()]])
            .append_query_results([vec![settled(notification.clone(), DeliveryStatus::Failed)]])
            .into_connection();
        let app = test_app(db);

        let result = SendNotificationJob::execute(&app, arguments(&notification)).await;

        assert!(matches!(result, Err(JobError::FailPermanently(_))));
        assert_eq!(app.mailer.messages().map(|m| m.len()), Some(0));
    }

    #[tokio::test]
    async fn test_failure_hook_marks_row_failed() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let db = Arc::new(db);
        let app = test_app(Arc::clone(&db));
        let notification_id = Uuid::new_v4();

        SendNotificationJob::on_failure(
            &app,
            serde_json::json!({ "notification_id": notification_id }),
            "timed out".to_string(),
        )
        .await;

        drop(app);
        let log = Arc::try_unwrap(db)
            .expect("app released the connection")
            .into_transaction_log();
        assert_eq!(log.len(), 1);
        let sql = format!("{:?}", log[0]);
        assert!(sql.contains("UPDATE \\\"email_notification\\\""));
        assert!(sql.contains(&notification_id.to_string()));
    }
}
