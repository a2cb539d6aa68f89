use sea_orm::DeriveActiveEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Lifecycle of a queued job.
///
/// - `Pending` → `Running` → `Completed`
/// - `Pending` → `Running` → `PendingRetry` → `Running` → …
/// - `Running` → `Failed` once the error is permanent or retries are exhausted
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "job_status")]
pub enum JobStatus {
    /// Waiting for its first attempt.
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,

    /// Waiting for `next_execution_at` after a transient failure.
    #[sea_orm(string_value = "pending_retry")]
    PendingRetry,

    /// Claimed by a worker.
    #[sea_orm(string_value = "running")]
    Running,

    #[sea_orm(string_value = "completed")]
    Completed,

    #[sea_orm(string_value = "failed")]
    Failed,
}

impl JobStatus {
    /// Statuses that count towards the queue backlog.
    pub const WAITING: [Self; 2] = [Self::Pending, Self::PendingRetry];

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}
