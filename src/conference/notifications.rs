use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use tracing::debug;
use uuid::Uuid;

use super::templates::{self, NotificationContext};
use crate::{
    app::App,
    database::models::{
        abstract_submission, email_notification,
        notification_kind::{DeliveryStatus, NotificationKind},
        user,
    },
    jobs::send_notification_job::{SendNotificationArguments, SendNotificationJob},
};

/// Template values for a submission addressed to its submitter.
pub fn context(
    app: &App,
    submission: &abstract_submission::Model,
    recipient: &user::Model,
    comment: Option<String>,
) -> NotificationContext {
    NotificationContext {
        conference: app.config.conference.name.clone(),
        recipient_name: recipient.name.clone(),
        submission_id: submission.id,
        title: submission.title.clone(),
        comment,
        fee_cents: submission.registration_fee_cents,
        currency: submission.currency.clone(),
        base_url: app.config.base_url.clone(),
    }
}

/// Stores a rendered notification and enqueues its delivery.
///
/// Pass the surrounding transaction so the row and its job commit together.
pub async fn queue<C: ConnectionTrait>(
    app: &App,
    db: &C,
    kind: NotificationKind,
    recipient: &user::Model,
    ctx: &NotificationContext,
) -> Result<email_notification::Model, DbErr> {
    let rendered = templates::render(kind, ctx);

    let notification = email_notification::ActiveModel {
        id: Set(Uuid::new_v4()),
        submission_id: Set(ctx.submission_id),
        recipient: Set(recipient.email.clone()),
        subject: Set(rendered.subject),
        body_text: Set(rendered.text),
        body_html: Set(rendered.html),
        kind: Set(kind),
        status: Set(DeliveryStatus::Pending),
        retry_count: Set(0),
        sent_via: Set(None),
        sent_at: Set(None),
        last_error: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    app.job_queue
        .add::<SendNotificationJob, _>(
            db,
            SendNotificationArguments {
                notification_id: notification.id,
            },
        )
        .await?;

    debug!(notification_id = %notification.id, %kind, "Notification queued");

    Ok(notification)
}

pub async fn list_for_submission<C: ConnectionTrait>(
    db: &C,
    submission_id: Uuid,
) -> Result<Vec<email_notification::Model>, DbErr> {
    email_notification::Entity::find()
        .filter(email_notification::Column::SubmissionId.eq(submission_id))
        .order_by_asc(email_notification::Column::CreatedAt)
        .all(db)
        .await
}
