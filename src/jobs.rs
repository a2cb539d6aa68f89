mod advisory_lock;
pub mod cleanup_email_logs_job;
pub mod job_registry;
pub mod job_supervisor;
mod maintenance;
pub mod scheduled_job;
mod scheduler;
pub mod send_email_job;
pub mod send_notification_job;
mod worker;

use std::future::Future;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::{app::App, config::EmailApiConfig};

use self::{
    cleanup_email_logs_job::CleanupEmailLogsJob,
    job_registry::JobRegistry,
    scheduled_job::{ScheduleError, ScheduledJob},
    send_email_job::SendEmailJob,
    send_notification_job::SendNotificationJob,
};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}")]
    FailPermanently(String),
    #[error("{0}")]
    TryAgainLater(String),
}

pub trait Job: Send + Sync {
    type Arguments: Serialize + DeserializeOwned + Send + Sync;

    fn execute(
        app: &App,
        arguments: Self::Arguments,
    ) -> impl Future<Output = Result<(), JobError>> + Send;

    fn name() -> &'static str;

    /// Runs once the worker has given up on a job: after a permanent error,
    /// after the last retry, or when the arguments cannot be parsed.
    fn on_failure(
        app: &App,
        arguments: serde_json::Value,
        reason: String,
    ) -> impl Future<Output = ()> + Send {
        let _ = (app, arguments, reason);
        async {}
    }
}

/// Every job the workers know how to run.
#[must_use]
pub fn registry() -> JobRegistry {
    let mut registry = JobRegistry::new();
    registry.register_job::<SendNotificationJob>();
    registry.register_job::<SendEmailJob>();
    registry.register_job::<CleanupEmailLogsJob>();
    registry
}

/// Periodic jobs enqueued by the scheduler.
pub fn schedule(config: &EmailApiConfig) -> Result<Vec<ScheduledJob>, ScheduleError> {
    Ok(vec![ScheduledJob::new::<CleanupEmailLogsJob>(
        "email log retention",
        cleanup_email_logs_job::CleanupEmailLogsArguments {
            retention_days: config.log_retention_days,
            batch_size: config.log_cleanup_batch_size,
        },
        &config.log_cleanup_cron,
    )?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_every_job() {
        let registry = registry();
        let mut names: Vec<_> = registry.job_names().collect();
        names.sort_unstable();

        assert_eq!(
            names,
            vec!["cleanup_email_logs", "send_email", "send_notification"]
        );
    }

    #[test]
    fn test_schedule_rejects_invalid_cron() {
        let config: EmailApiConfig = serde_json::from_value(serde_json::json!({
            "api_keys": [],
            "log_cleanup_cron": "every night"
        }))
        .expect("valid email api config");

        assert!(matches!(
            schedule(&config),
            Err(ScheduleError::InvalidCron { .. })
        ));
    }

    #[test]
    fn test_default_schedule_runs_log_cleanup() {
        let config: EmailApiConfig =
            serde_json::from_value(serde_json::json!({ "api_keys": [] }))
                .expect("valid email api config");

        let schedule = schedule(&config).expect("default cron parses");

        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].job_name, "cleanup_email_logs");
        assert_eq!(schedule[0].arguments["retention_days"], 90);
    }
}
