use sea_orm::{sea_query::extension::postgres::Type, ActiveEnum, DbBackend, Schema};
use sea_orm_migration::{
    prelude::*,
    schema::{big_integer, integer, json_binary, string, timestamp, uuid},
};

use crate::database::models::notification_kind::EmailLogStatus;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(DbBackend::Postgres);

        manager
            .create_type(schema.create_enum_from_active_enum::<EmailLogStatus>())
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EmailLog::Table)
                    .if_not_exists()
                    .col(uuid(EmailLog::Id).primary_key())
                    .col(timestamp(EmailLog::CreatedAt).default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(timestamp(EmailLog::UpdatedAt).default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(string(EmailLog::MessageId).unique_key())
                    .col(ColumnDef::new(EmailLog::RequestId).string().null())
                    .col(ColumnDef::new(EmailLog::ApiClient).string().null())
                    .col(string(EmailLog::Sender))
                    .col(json_binary(EmailLog::Recipients))
                    .col(string(EmailLog::Subject))
                    .col(
                        ColumnDef::new(EmailLog::Status)
                            .custom(EmailLogStatus::name())
                            .not_null(),
                    )
                    .col(integer(EmailLog::AttachmentCount).default(0))
                    .col(big_integer(EmailLog::AttachmentBytes).default(0))
                    .col(ColumnDef::new(EmailLog::ErrorMessage).text().null())
                    .col(ColumnDef::new(EmailLog::SentAt).timestamp().null())
                    .to_owned(),
            )
            .await?;

        // Statistics and cleanup both scan by creation time
        manager
            .create_index(
                Index::create()
                    .name("idx-email_log-created_at")
                    .table(EmailLog::Table)
                    .col(EmailLog::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r"
                CREATE TRIGGER update_email_log_updated_at
                    BEFORE UPDATE ON email_log
                    FOR EACH ROW
                    EXECUTE FUNCTION update_updated_at_column();
                ",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TRIGGER IF EXISTS update_email_log_updated_at ON email_log;")
            .await?;

        manager
            .drop_table(Table::drop().table(EmailLog::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(EmailLogStatus::name()).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum EmailLog {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    MessageId,
    RequestId,
    ApiClient,
    Sender,
    Recipients,
    Subject,
    Status,
    AttachmentCount,
    AttachmentBytes,
    ErrorMessage,
    SentAt,
}
