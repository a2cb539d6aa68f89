//! `SeaORM` Entity for registration payment proofs

use sea_orm::entity::prelude::*;
use serde::Serialize;

use super::payment_status::PaymentStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "submission_payment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    #[sea_orm(unique)]
    pub submission_id: Uuid,
    #[serde(skip)]
    pub proof_path: String,
    pub original_filename: String,
    pub content_type: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime>,
    #[sea_orm(column_type = "Text", nullable)]
    pub review_note: Option<String>,
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
