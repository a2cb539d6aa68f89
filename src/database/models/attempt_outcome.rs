use sea_orm::DeriveActiveEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// How one run of a job ended, as recorded on `job_execution`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "attempt_outcome")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttemptOutcome {
    #[sea_orm(string_value = "succeeded")]
    Succeeded,
    /// The job returned an error; `failure_reason` holds it
    #[sea_orm(string_value = "errored")]
    Errored,
    /// The worker gave up waiting, or recovery found the job stuck
    #[sea_orm(string_value = "timed_out")]
    TimedOut,
}
