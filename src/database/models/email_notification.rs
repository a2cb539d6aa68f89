//! `SeaORM` Entity for notification emails sent to submitters

use sea_orm::entity::prelude::*;
use serde::Serialize;

use super::notification_kind::{DeliveryStatus, NotificationKind};

/// Failed delivery attempts tolerated after the first one.
pub const MAX_RETRIES: i32 = 3;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "email_notification")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub submission_id: Uuid,
    pub recipient: String,
    pub subject: String,
    #[sea_orm(column_type = "Text")]
    #[serde(skip)]
    pub body_text: String,
    #[sea_orm(column_type = "Text")]
    #[serde(skip)]
    pub body_html: String,
    pub kind: NotificationKind,
    pub status: DeliveryStatus,
    pub retry_count: i32,
    pub sent_via: Option<String>,
    pub sent_at: Option<DateTime>,
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::abstract_submission::Entity",
        from = "Column::SubmissionId",
        to = "super::abstract_submission::Column::Id"
    )]
    AbstractSubmission,
}

impl Related<super::abstract_submission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AbstractSubmission.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether another delivery attempt is allowed after a failure.
    pub const fn has_retries_left(&self) -> bool {
        self.retry_count < MAX_RETRIES
    }
}
