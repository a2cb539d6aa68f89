use std::str::FromStr;

use thiserror::Error;

use super::Job;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expression}' for '{name}': {reason}")]
    InvalidCron {
        name: String,
        expression: String,
        reason: String,
    },
    #[error("Failed to serialize arguments for '{0}': {1}")]
    Arguments(String, serde_json::Error),
}

/// A job enqueued whenever its cron schedule fires.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    /// Human readable label used in logs
    pub name: String,
    pub job_name: &'static str,
    pub arguments: serde_json::Value,
    pub schedule: cron::Schedule,
}

impl ScheduledJob {
    /// Builds a schedule entry, checking the cron expression up front.
    pub fn new<J: Job>(
        name: &str,
        arguments: J::Arguments,
        cron_expression: &str,
    ) -> Result<Self, ScheduleError> {
        let schedule = cron::Schedule::from_str(cron_expression).map_err(|e| ScheduleError::InvalidCron {
            name: name.to_string(),
            expression: cron_expression.to_string(),
            reason: e.to_string(),
        })?;

        let arguments = serde_json::to_value(arguments)
            .map_err(|e| ScheduleError::Arguments(name.to_string(), e))?;

        Ok(Self {
            name: name.to_string(),
            job_name: J::name(),
            arguments,
            schedule,
        })
    }
}
