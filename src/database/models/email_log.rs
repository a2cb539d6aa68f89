//! `SeaORM` Entity for the Email API audit trail

use sea_orm::entity::prelude::*;
use serde::Serialize;

use super::notification_kind::EmailLogStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "email_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    #[sea_orm(unique)]
    pub message_id: String,
    pub request_id: Option<String>,
    pub api_client: Option<String>,
    pub sender: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub recipients: Json,
    pub subject: String,
    pub status: EmailLogStatus,
    pub attachment_count: i32,
    pub attachment_bytes: i64,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
