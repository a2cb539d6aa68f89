use sea_orm::{sea_query::extension::postgres::Type, ActiveEnum, DbBackend, Schema};
use sea_orm_migration::{
    prelude::*,
    schema::{boolean, big_integer, integer, json_binary, string, text, timestamp, uuid},
};

use crate::database::models::{
    contributor_role::{ContributorRole, PresentationType},
    notification_kind::{DeliveryStatus, NotificationKind},
    payment_status::PaymentStatus,
    submission_status::SubmissionStatus,
    user_role::UserRole,
};

const TABLES_WITH_UPDATED_AT: [&str; 5] = [
    "app_user",
    "abstract_submission",
    "submission_contributor",
    "submission_payment",
    "email_notification",
];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(DbBackend::Postgres);

        manager
            .create_type(schema.create_enum_from_active_enum::<UserRole>())
            .await?;
        manager
            .create_type(schema.create_enum_from_active_enum::<SubmissionStatus>())
            .await?;
        manager
            .create_type(schema.create_enum_from_active_enum::<PresentationType>())
            .await?;
        manager
            .create_type(schema.create_enum_from_active_enum::<ContributorRole>())
            .await?;
        manager
            .create_type(schema.create_enum_from_active_enum::<PaymentStatus>())
            .await?;
        manager
            .create_type(schema.create_enum_from_active_enum::<NotificationKind>())
            .await?;
        manager
            .create_type(schema.create_enum_from_active_enum::<DeliveryStatus>())
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AppUser::Table)
                    .if_not_exists()
                    .col(uuid(AppUser::Id).primary_key())
                    .col(timestamp(AppUser::CreatedAt).default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(timestamp(AppUser::UpdatedAt).default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(string(AppUser::Email).unique_key())
                    .col(string(AppUser::Name))
                    .col(
                        ColumnDef::new(AppUser::Role)
                            .custom(UserRole::name())
                            .not_null()
                            .default("user"),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AbstractSubmission::Table)
                    .if_not_exists()
                    .col(uuid(AbstractSubmission::Id).primary_key())
                    .col(
                        timestamp(AbstractSubmission::CreatedAt)
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .col(
                        timestamp(AbstractSubmission::UpdatedAt)
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .col(uuid(AbstractSubmission::UserId))
                    .col(string(AbstractSubmission::Title))
                    .col(text(AbstractSubmission::AbstractBody))
                    .col(json_binary(AbstractSubmission::Keywords))
                    .col(
                        ColumnDef::new(AbstractSubmission::Status)
                            .custom(SubmissionStatus::name())
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(AbstractSubmission::PresentationType)
                            .custom(PresentationType::name())
                            .not_null()
                            .default("oral"),
                    )
                    .col(big_integer(AbstractSubmission::RegistrationFeeCents).default(0))
                    .col(string(AbstractSubmission::Currency))
                    .col(boolean(AbstractSubmission::RequiresPayment).default(false))
                    .col(ColumnDef::new(AbstractSubmission::ReviewedBy).uuid().null())
                    .col(
                        ColumnDef::new(AbstractSubmission::ReviewedAt)
                            .timestamp()
                            .null(),
                    )
                    .col(ColumnDef::new(AbstractSubmission::ReviewComment).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-abstract_submission-user_id")
                            .from(AbstractSubmission::Table, AbstractSubmission::UserId)
                            .to(AppUser::Table, AppUser::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-abstract_submission-status")
                    .table(AbstractSubmission::Table)
                    .col(AbstractSubmission::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SubmissionContributor::Table)
                    .if_not_exists()
                    .col(uuid(SubmissionContributor::Id).primary_key())
                    .col(
                        timestamp(SubmissionContributor::CreatedAt)
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .col(
                        timestamp(SubmissionContributor::UpdatedAt)
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .col(uuid(SubmissionContributor::SubmissionId))
                    .col(string(SubmissionContributor::Name))
                    .col(string(SubmissionContributor::Email))
                    .col(
                        ColumnDef::new(SubmissionContributor::Affiliation)
                            .string()
                            .null(),
                    )
                    .col(ColumnDef::new(SubmissionContributor::Country).string().null())
                    .col(
                        ColumnDef::new(SubmissionContributor::Role)
                            .custom(ContributorRole::name())
                            .not_null(),
                    )
                    .col(boolean(SubmissionContributor::IsPrimaryContact).default(false))
                    .col(integer(SubmissionContributor::Position))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-submission_contributor-submission_id")
                            .from(
                                SubmissionContributor::Table,
                                SubmissionContributor::SubmissionId,
                            )
                            .to(AbstractSubmission::Table, AbstractSubmission::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-submission_contributor-submission_id-position")
                    .table(SubmissionContributor::Table)
                    .col(SubmissionContributor::SubmissionId)
                    .col(SubmissionContributor::Position)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SubmissionPayment::Table)
                    .if_not_exists()
                    .col(uuid(SubmissionPayment::Id).primary_key())
                    .col(
                        timestamp(SubmissionPayment::CreatedAt)
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .col(
                        timestamp(SubmissionPayment::UpdatedAt)
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .col(uuid(SubmissionPayment::SubmissionId).unique_key())
                    .col(string(SubmissionPayment::ProofPath))
                    .col(string(SubmissionPayment::OriginalFilename))
                    .col(string(SubmissionPayment::ContentType))
                    .col(big_integer(SubmissionPayment::AmountCents))
                    .col(string(SubmissionPayment::Currency))
                    .col(
                        ColumnDef::new(SubmissionPayment::Status)
                            .custom(PaymentStatus::name())
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(SubmissionPayment::ReviewedBy).uuid().null())
                    .col(
                        ColumnDef::new(SubmissionPayment::ReviewedAt)
                            .timestamp()
                            .null(),
                    )
                    .col(ColumnDef::new(SubmissionPayment::ReviewNote).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-submission_payment-submission_id")
                            .from(SubmissionPayment::Table, SubmissionPayment::SubmissionId)
                            .to(AbstractSubmission::Table, AbstractSubmission::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EmailNotification::Table)
                    .if_not_exists()
                    .col(uuid(EmailNotification::Id).primary_key())
                    .col(
                        timestamp(EmailNotification::CreatedAt)
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .col(
                        timestamp(EmailNotification::UpdatedAt)
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .col(uuid(EmailNotification::SubmissionId))
                    .col(string(EmailNotification::Recipient))
                    .col(string(EmailNotification::Subject))
                    .col(text(EmailNotification::BodyText))
                    .col(text(EmailNotification::BodyHtml))
                    .col(
                        ColumnDef::new(EmailNotification::Kind)
                            .custom(NotificationKind::name())
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailNotification::Status)
                            .custom(DeliveryStatus::name())
                            .not_null()
                            .default("pending"),
                    )
                    .col(integer(EmailNotification::RetryCount).default(0))
                    .col(ColumnDef::new(EmailNotification::SentVia).string().null())
                    .col(ColumnDef::new(EmailNotification::SentAt).timestamp().null())
                    .col(ColumnDef::new(EmailNotification::LastError).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-email_notification-submission_id")
                            .from(EmailNotification::Table, EmailNotification::SubmissionId)
                            .to(AbstractSubmission::Table, AbstractSubmission::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-email_notification-submission_id")
                    .table(EmailNotification::Table)
                    .col(EmailNotification::SubmissionId)
                    .to_owned(),
            )
            .await?;

        for table in TABLES_WITH_UPDATED_AT {
            manager
                .get_connection()
                .execute_unprepared(&format!(
                    "CREATE TRIGGER update_{table}_updated_at
                        BEFORE UPDATE ON {table}
                        FOR EACH ROW
                        EXECUTE FUNCTION update_updated_at_column();"
                ))
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in TABLES_WITH_UPDATED_AT {
            manager
                .get_connection()
                .execute_unprepared(&format!(
                    "DROP TRIGGER IF EXISTS update_{table}_updated_at ON {table};"
                ))
                .await?;
        }

        manager
            .drop_table(Table::drop().table(EmailNotification::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SubmissionPayment::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SubmissionContributor::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AbstractSubmission::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AppUser::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(DeliveryStatus::name()).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(NotificationKind::name()).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(PaymentStatus::name()).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(ContributorRole::name()).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(PresentationType::name()).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(SubmissionStatus::name()).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(UserRole::name()).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AppUser {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    Email,
    Name,
    Role,
}

#[derive(DeriveIden)]
enum AbstractSubmission {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    UserId,
    Title,
    AbstractBody,
    Keywords,
    Status,
    PresentationType,
    RegistrationFeeCents,
    Currency,
    RequiresPayment,
    ReviewedBy,
    ReviewedAt,
    ReviewComment,
}

#[derive(DeriveIden)]
enum SubmissionContributor {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    SubmissionId,
    Name,
    Email,
    Affiliation,
    Country,
    Role,
    IsPrimaryContact,
    Position,
}

#[derive(DeriveIden)]
enum SubmissionPayment {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    SubmissionId,
    ProofPath,
    OriginalFilename,
    ContentType,
    AmountCents,
    Currency,
    Status,
    ReviewedBy,
    ReviewedAt,
    ReviewNote,
}

#[derive(DeriveIden)]
enum EmailNotification {
    Table,
    Id,
    CreatedAt,
    UpdatedAt,
    SubmissionId,
    Recipient,
    Subject,
    BodyText,
    BodyHtml,
    Kind,
    Status,
    RetryCount,
    SentVia,
    SentAt,
    LastError,
}
