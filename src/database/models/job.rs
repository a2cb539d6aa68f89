//! `SeaORM` Entity for queued background jobs

use sea_orm::{entity::prelude::*, Condition, QueryOrder};

use super::job_status::JobStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "job")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    /// Registered job name, e.g. `send_notification`
    pub r#type: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub arguments: Json,
    pub status: JobStatus,
    /// Retries already made; 0 during the first attempt
    pub retry_count: i32,
    pub next_execution_at: Option<DateTime>,
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::job_execution::Entity")]
    Executions,
}

impl Related<super::job_execution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Executions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    /// Jobs counted as backlog.
    pub fn waiting() -> Select<Self> {
        Self::find().filter(Column::Status.is_in(JobStatus::WAITING))
    }

    /// Waiting jobs of `types` whose retry delay has passed at `now`, oldest first.
    pub fn due(types: &[String], max_retries: i32, now: DateTime) -> Select<Self> {
        Self::waiting()
            .filter(Column::Type.is_in(types.iter().map(String::as_str)))
            .filter(Column::RetryCount.lte(max_retries))
            .filter(
                Condition::any()
                    .add(Column::NextExecutionAt.is_null())
                    .add(Column::NextExecutionAt.lte(now)),
            )
            .order_by_asc(Column::CreatedAt)
    }
}
