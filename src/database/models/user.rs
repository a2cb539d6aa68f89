//! `SeaORM` Entity for people who submit or review abstracts

use sea_orm::entity::prelude::*;
use serde::Serialize;

use super::user_role::UserRole;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "app_user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    #[sea_orm(unique)]
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::abstract_submission::Entity")]
    AbstractSubmission,
}

impl Related<super::abstract_submission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AbstractSubmission.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}
