//! `SeaORM` Entity for the authors and co-authors of a submission

use sea_orm::entity::prelude::*;
use serde::Serialize;

use super::contributor_role::ContributorRole;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "submission_contributor")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub submission_id: Uuid,
    pub name: String,
    pub email: String,
    pub affiliation: Option<String>,
    pub country: Option<String>,
    pub role: ContributorRole,
    pub is_primary_contact: bool,
    pub position: i32,
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
