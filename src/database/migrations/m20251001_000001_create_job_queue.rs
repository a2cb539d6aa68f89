use sea_orm::{sea_query::extension::postgres::Type, ActiveEnum, DbBackend, Schema};
use sea_orm_migration::{
    prelude::*,
    schema::{json_binary, string, timestamp, uuid},
};

use crate::database::models::{attempt_outcome::AttemptOutcome, job_status::JobStatus};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        let schema = Schema::new(DbBackend::Postgres);

        // Shared by every table that carries `updated_at`
        db.execute_unprepared(
            r"
            CREATE OR REPLACE FUNCTION update_updated_at_column()
            RETURNS TRIGGER AS $$
            BEGIN
                NEW.updated_at = CURRENT_TIMESTAMP;
                RETURN NEW;
            END;
            $$ language 'plpgsql';
            ",
        )
        .await?;

        manager
            .create_type(schema.create_enum_from_active_enum::<JobStatus>())
            .await?;
        manager
            .create_type(schema.create_enum_from_active_enum::<AttemptOutcome>())
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Job::Table)
                    .if_not_exists()
                    .col(
                        uuid(Job::Id)
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(
                        timestamp(Job::CreatedAt)
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .col(
                        timestamp(Job::UpdatedAt)
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .col(string(Job::Type).not_null())
                    .col(json_binary(Job::Arguments).not_null())
                    .col(
                        ColumnDef::new(Job::Status)
                            .custom(JobStatus::name())
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Job::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Job::NextExecutionAt).timestamp().null())
                    .col(ColumnDef::new(Job::LastError).text().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-job-status-created_at")
                    .table(Job::Table)
                    .col(Job::Status)
                    .col(Job::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(JobExecution::Table)
                    .if_not_exists()
                    .col(
                        uuid(JobExecution::Id)
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(uuid(JobExecution::JobId).not_null())
                    .col(string(JobExecution::Worker).not_null())
                    .col(
                        ColumnDef::new(JobExecution::Outcome)
                            .custom(AttemptOutcome::name())
                            .not_null(),
                    )
                    .col(timestamp(JobExecution::StartedAt).not_null())
                    .col(timestamp(JobExecution::FinishedAt).not_null())
                    .col(
                        ColumnDef::new(JobExecution::ExecutionTimeMs)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(JobExecution::FailureReason).text().null())
                    .col(
                        timestamp(JobExecution::CreatedAt)
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-job_execution-job_id")
                            .from(JobExecution::Table, JobExecution::JobId)
                            .to(Job::Table, Job::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-job_execution-job_id")
                    .table(JobExecution::Table)
                    .col(JobExecution::JobId)
                    .to_owned(),
            )
            .await?;

        db.execute_unprepared(
            r"
            CREATE TRIGGER update_job_updated_at
                BEFORE UPDATE ON job
                FOR EACH ROW
                EXECUTE FUNCTION update_updated_at_column();
            ",
        )
        .await?;

        // Workers LISTEN on `job_new` so inserts wake them without polling
        db.execute_unprepared(
            r"
            CREATE OR REPLACE FUNCTION notify_job_new()
            RETURNS TRIGGER AS $$
            BEGIN
                PERFORM pg_notify('job_new', NEW.id::text);
                RETURN NEW;
            END;
            $$ LANGUAGE plpgsql;
            ",
        )
        .await?;

        db.execute_unprepared(
            r"
            CREATE TRIGGER job_new_notify
                AFTER INSERT ON job
                FOR EACH ROW
                EXECUTE FUNCTION notify_job_new();
            ",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("DROP TRIGGER IF EXISTS job_new_notify ON job;")
            .await?;
        db.execute_unprepared("DROP FUNCTION IF EXISTS notify_job_new();")
            .await?;
        db.execute_unprepared("DROP TRIGGER IF EXISTS update_job_updated_at ON job;")
            .await?;

        manager
            .drop_table(Table::drop().table(JobExecution::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Job::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(AttemptOutcome::name()).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(JobStatus::name()).to_owned())
            .await?;

        db.execute_unprepared("DROP FUNCTION IF EXISTS update_updated_at_column();")
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Job {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    Type,
    Arguments,
    Status,
    RetryCount,
    NextExecutionAt,
    LastError,
}

#[derive(DeriveIden)]
enum JobExecution {
    Table,
    Id,
    JobId,
    Worker,
    Outcome,
    StartedAt,
    FinishedAt,
    ExecutionTimeMs,
    FailureReason,
    CreatedAt,
}
