use std::{
    fmt,
    time::{Duration, Instant},
};

use sea_orm::{
    sea_query::{LockBehavior, LockType},
    ActiveModelTrait, DatabaseConnection, DbErr, QuerySelect, Set, TransactionTrait,
};
use sqlx::postgres::PgListener;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::{
    app::App,
    config::WorkerQueueConfig,
    database::models::{attempt_outcome::AttemptOutcome, job, job_execution, job_status::JobStatus},
    jobs::JobError,
};

use super::job_registry::JobRegistry;

const JOB_CHANNEL: &str = "job_new";
/// Upper bound on how long a listening worker sleeps without a notification.
const FALLBACK_POLL_INTERVAL: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How an idle worker waits for new work.
enum Idle {
    Listening(PgListener),
    Polling,
}

impl Idle {
    async fn connect(worker_name: &str, db: &DatabaseConnection) -> Self {
        let listener = async {
            let mut listener = PgListener::connect_with(db.get_postgres_connection_pool()).await?;
            listener.listen(JOB_CHANNEL).await?;
            Ok::<_, sqlx::Error>(listener)
        };

        match listener.await {
            Ok(listener) => {
                debug!(worker = worker_name, "Listening on '{JOB_CHANNEL}'");
                Self::Listening(listener)
            }
            Err(e) => {
                warn!(worker = worker_name, "Cannot LISTEN on '{JOB_CHANNEL}', polling instead: {e}");
                Self::Polling
            }
        }
    }

    /// Returns once new work may be available.
    async fn wait(&mut self, worker_name: &str) {
        match self {
            Self::Listening(listener) => match timeout(FALLBACK_POLL_INTERVAL, listener.recv()).await {
                Ok(Ok(_)) | Err(_) => {}
                Ok(Err(e)) => {
                    error!(worker = worker_name, "Job listener failed, switching to polling: {e}");
                    *self = Self::Polling;
                    sleep(POLL_INTERVAL).await;
                }
            },
            Self::Polling => sleep(POLL_INTERVAL).await,
        }
    }
}

/// Claims and runs jobs of the pool's types until a database error stops it.
pub async fn worker(
    worker_name: &str,
    worker_config: &WorkerQueueConfig,
    app: App,
    job_registry: &JobRegistry,
) -> Result<(), DbErr> {
    let mut idle = Idle::connect(worker_name, app.db.as_ref()).await;

    loop {
        let mut drained = 0_u32;
        while let Some(claimed) = claim_next(worker_config, app.db.as_ref()).await? {
            run_claimed(&claimed, worker_name, worker_config, &app, job_registry).await?;
            drained += 1;
        }
        if drained > 0 {
            debug!(worker = worker_name, jobs = drained, "Queue drained");
        }

        idle.wait(worker_name).await;
    }
}

/// What one run of a job produced.
enum Attempt {
    Succeeded,
    Errored(JobError),
    TimedOut(Duration),
}

impl Attempt {
    const fn outcome(&self) -> AttemptOutcome {
        match self {
            Self::Succeeded => AttemptOutcome::Succeeded,
            Self::Errored(_) => AttemptOutcome::Errored,
            Self::TimedOut(_) => AttemptOutcome::TimedOut,
        }
    }

    fn failure_reason(&self) -> Option<String> {
        match self {
            Self::Succeeded => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::Errored(e) => write!(f, "{e}"),
            Self::TimedOut(limit) => write!(f, "timed out after {}s", limit.as_secs()),
        }
    }
}

async fn run_claimed(
    claimed: &job::Model,
    worker_name: &str,
    worker_config: &WorkerQueueConfig,
    app: &App,
    job_registry: &JobRegistry,
) -> Result<(), DbErr> {
    let limit = Duration::from_secs(u64::from(worker_config.job_timeout));
    let started = Instant::now();

    let attempt = match timeout(
        limit,
        job_registry.execute(app, &claimed.r#type, &claimed.arguments),
    )
    .await
    {
        Ok(Ok(())) => Attempt::Succeeded,
        Ok(Err(e)) => Attempt::Errored(e),
        Err(_) => Attempt::TimedOut(limit),
    };
    let elapsed = started.elapsed();

    record_execution(claimed, worker_name, &attempt, elapsed, app.db.as_ref()).await?;

    let mut update: job::ActiveModel = claimed.clone().into();
    match next_step(&attempt, claimed.retry_count, worker_config) {
        NextStep::Complete => {
            info!(
                worker = worker_name,
                job_id = %claimed.id,
                job_type = %claimed.r#type,
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "✅ Job completed"
            );
            update.status = Set(JobStatus::Completed);
            update.last_error = Set(None);
            update.update(app.db.as_ref()).await?;
        }
        NextStep::RetryIn(delay_seconds) => {
            warn!(
                worker = worker_name,
                job_id = %claimed.id,
                job_type = %claimed.r#type,
                retry = claimed.retry_count + 1,
                delay_seconds,
                "⚠️ Job will be retried: {attempt}"
            );
            let delay = chrono::Duration::seconds(i64::try_from(delay_seconds).unwrap_or(i64::MAX));
            update.status = Set(JobStatus::PendingRetry);
            update.retry_count = Set(claimed.retry_count + 1);
            update.next_execution_at = Set(Some(chrono::Utc::now().naive_utc() + delay));
            update.last_error = Set(attempt.failure_reason());
            update.update(app.db.as_ref()).await?;
        }
        NextStep::GiveUp => {
            let reason = attempt.failure_reason().unwrap_or_default();
            error!(
                worker = worker_name,
                job_id = %claimed.id,
                job_type = %claimed.r#type,
                attempts = claimed.retry_count + 1,
                "❌ Job failed: {reason}"
            );
            update.status = Set(JobStatus::Failed);
            update.last_error = Set(Some(reason.clone()));
            update.update(app.db.as_ref()).await?;

            job_registry
                .give_up(app, &claimed.r#type, &claimed.arguments, reason)
                .await;
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum NextStep {
    Complete,
    RetryIn(u64),
    GiveUp,
}

/// Decides what happens to a job after an attempt. `retry_count` is the number
/// of retries already made before this attempt.
fn next_step(attempt: &Attempt, retry_count: i32, worker_config: &WorkerQueueConfig) -> NextStep {
    match attempt {
        Attempt::Succeeded => NextStep::Complete,
        Attempt::Errored(JobError::FailPermanently(_)) => NextStep::GiveUp,
        Attempt::Errored(JobError::TryAgainLater(_)) | Attempt::TimedOut(_) => {
            if retry_count < worker_config.max_retries {
                NextStep::RetryIn(worker_config.retry_delay_seconds(retry_count))
            } else {
                NextStep::GiveUp
            }
        }
    }
}

/// Marks the oldest due job as running and hands it out, skipping rows other
/// workers hold.
async fn claim_next(
    worker_config: &WorkerQueueConfig,
    db: &DatabaseConnection,
) -> Result<Option<job::Model>, DbErr> {
    let txn = db.begin().await?;
    let now = chrono::Utc::now().naive_utc();

    let due = job::Entity::due(&worker_config.jobs, worker_config.max_retries, now)
        .limit(1)
        .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
        .one(&txn)
        .await?;

    let Some(due) = due else {
        txn.commit().await?;
        return Ok(None);
    };

    let mut running: job::ActiveModel = due.clone().into();
    running.status = Set(JobStatus::Running);
    let claimed = running.update(&txn).await?;

    txn.commit().await?;
    Ok(Some(claimed))
}

async fn record_execution(
    claimed: &job::Model,
    worker_name: &str,
    attempt: &Attempt,
    elapsed: Duration,
    db: &DatabaseConnection,
) -> Result<(), DbErr> {
    let finished_at = chrono::Utc::now().naive_utc();
    let execution_time_ms = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);

    job_execution::ActiveModel {
        id: Set(uuid::Uuid::new_v4()),
        job_id: Set(claimed.id),
        worker: Set(worker_name.to_string()),
        outcome: Set(attempt.outcome()),
        started_at: Set(finished_at - chrono::Duration::milliseconds(execution_time_ms)),
        finished_at: Set(finished_at),
        execution_time_ms: Set(execution_time_ms),
        failure_reason: Set(attempt.failure_reason()),
        created_at: Set(finished_at),
    }
    .insert(db)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_config() -> WorkerQueueConfig {
        WorkerQueueConfig {
            jobs: vec!["send_notification".to_string()],
            count: 1,
            job_timeout: 30,
            max_retries: 3,
            retry_backoff_seconds: vec![60, 300, 900],
        }
    }

    #[test]
    fn test_transient_failures_follow_backoff_steps() {
        let config = pool_config();
        let failure = || Attempt::Errored(JobError::TryAgainLater("smtp down".to_string()));

        assert_eq!(next_step(&failure(), 0, &config), NextStep::RetryIn(60));
        assert_eq!(next_step(&failure(), 1, &config), NextStep::RetryIn(300));
        assert_eq!(next_step(&failure(), 2, &config), NextStep::RetryIn(900));
        assert_eq!(next_step(&failure(), 3, &config), NextStep::GiveUp);
    }

    #[test]
    fn test_timeouts_are_retried() {
        let attempt = Attempt::TimedOut(Duration::from_secs(30));

        assert_eq!(next_step(&attempt, 0, &pool_config()), NextStep::RetryIn(60));
        assert_eq!(attempt.failure_reason().as_deref(), Some("timed out after 30s"));
        assert_eq!(attempt.outcome(), AttemptOutcome::TimedOut);
    }

    #[test]
    fn test_permanent_failures_are_not_retried() {
        let attempt = Attempt::Errored(JobError::FailPermanently("bad address".to_string()));

        assert_eq!(next_step(&attempt, 0, &pool_config()), NextStep::GiveUp);
        assert_eq!(attempt.failure_reason().as_deref(), Some("bad address"));
    }

    #[test]
    fn test_success_completes() {
        assert_eq!(
            next_step(&Attempt::Succeeded, 2, &pool_config()),
            NextStep::Complete
        );
        assert_eq!(Attempt::Succeeded.failure_reason(), None);
    }
}
