//! `SeaORM` Entity for conference abstract submissions

use sea_orm::entity::prelude::*;
use serde::Serialize;

use super::{contributor_role::PresentationType, submission_status::SubmissionStatus};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "abstract_submission")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub user_id: Uuid,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub abstract_body: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub keywords: Json,
    pub status: SubmissionStatus,
    pub presentation_type: PresentationType,
    pub registration_fee_cents: i64,
    pub currency: String,
    pub requires_payment: bool,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime>,
    #[sea_orm(column_type = "Text", nullable)]
    pub review_comment: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::submission_contributor::Entity")]
    SubmissionContributor,
    #[sea_orm(has_one = "super::submission_payment::Entity")]
    SubmissionPayment,
    #[sea_orm(has_many = "super::email_notification::Entity")]
    EmailNotification,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::submission_contributor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubmissionContributor.def()
    }
}

impl Related<super::submission_payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubmissionPayment.def()
    }
}

impl Related<super::email_notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailNotification.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Keywords are stored as a JSON array of strings.
    pub fn keyword_list(&self) -> Vec<String> {
        serde_json::from_value(self.keywords.clone()).unwrap_or_default()
    }

    pub fn is_editable(&self) -> bool {
        self.status == SubmissionStatus::Pending
    }
}
