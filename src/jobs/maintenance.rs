//! Housekeeping on the `job` table: recovering jobs whose worker vanished and
//! purging finished jobs past their retention.

use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    config::{CleanupConfig, WorkerQueueConfig, WorkersConfig},
    database::models::{attempt_outcome::AttemptOutcome, job, job_execution, job_status::JobStatus},
};

const RECOVERY_INTERVAL: Duration = Duration::from_secs(300);
const RECOVERY_WORKER: &str = "recovery";
const PURGE_BATCH_PAUSE: Duration = Duration::from_millis(100);

/// Running jobs last touched before this are treated as abandoned.
fn stuck_cutoff(pool: &WorkerQueueConfig, now: NaiveDateTime) -> NaiveDateTime {
    now - chrono::Duration::seconds(i64::from(pool.job_timeout) * 2)
}

/// `None` when the retention reaches past the earliest representable time.
fn retention_cutoff(retention_seconds: u64, now: NaiveDateTime) -> Option<NaiveDateTime> {
    i64::try_from(retention_seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|age| now.checked_sub_signed(age))
}

/// Returns on the first database error so the advisory lock wrapper restarts it.
pub(super) async fn run_recovery(workers: &WorkersConfig, db: &DatabaseConnection) {
    loop {
        match recover_stuck_jobs(workers, db, chrono::Utc::now().naive_utc()).await {
            Ok(0) => debug!("🏥 No stuck jobs"),
            Ok(recovered) => info!(recovered, "🏥 Recovered stuck jobs"),
            Err(e) => {
                error!("❌ Stuck job recovery failed: {e}");
                return;
            }
        }

        sleep(RECOVERY_INTERVAL).await;
    }
}

async fn recover_stuck_jobs(
    workers: &WorkersConfig,
    db: &DatabaseConnection,
    now: NaiveDateTime,
) -> Result<usize, DbErr> {
    let mut recovered = 0;

    for (pool_name, pool) in &workers.workers {
        let stuck = job::Entity::find()
            .filter(job::Column::Status.eq(JobStatus::Running))
            .filter(job::Column::Type.is_in(pool.jobs.iter().map(String::as_str)))
            .filter(job::Column::UpdatedAt.lte(stuck_cutoff(pool, now)))
            .all(db)
            .await?;

        for stuck_job in stuck {
            let running_for = now.signed_duration_since(stuck_job.updated_at);
            let reason = format!(
                "Abandoned after running for {}s in pool '{pool_name}'",
                running_for.num_seconds()
            );
            warn!(job_id = %stuck_job.id, job_type = %stuck_job.r#type, "🏥 {reason}");

            job_execution::ActiveModel {
                id: Set(Uuid::new_v4()),
                job_id: Set(stuck_job.id),
                worker: Set(RECOVERY_WORKER.to_string()),
                outcome: Set(AttemptOutcome::TimedOut),
                started_at: Set(stuck_job.updated_at),
                finished_at: Set(now),
                execution_time_ms: Set(running_for.num_milliseconds()),
                failure_reason: Set(Some(reason.clone())),
                created_at: Set(now),
            }
            .insert(db)
            .await?;

            let mut reset: job::ActiveModel = stuck_job.into();
            reset.status = Set(JobStatus::Pending);
            reset.last_error = Set(Some(reason));
            reset.update(db).await?;

            recovered += 1;
        }
    }

    Ok(recovered)
}

pub(super) async fn run_cleanup(config: &CleanupConfig, db: &DatabaseConnection) {
    loop {
        if let Err(e) = purge_finished_jobs(config, db).await {
            error!("🧹 Failed to purge finished jobs: {e}");
        }

        sleep(Duration::from_secs(config.interval_seconds)).await;
    }
}

async fn purge_finished_jobs(config: &CleanupConfig, db: &DatabaseConnection) -> Result<(), DbErr> {
    let now = chrono::Utc::now().naive_utc();

    let completed = match retention_cutoff(config.completed_retention_seconds, now) {
        Some(cutoff) => purge(db, JobStatus::Completed, cutoff, config.batch_size).await?,
        None => 0,
    };
    let failed = match retention_cutoff(config.failed_retention_seconds, now) {
        Some(cutoff) => purge(db, JobStatus::Failed, cutoff, config.batch_size).await?,
        None => 0,
    };

    if completed + failed > 0 {
        info!(completed, failed, "🧹 Purged finished jobs");
    }
    Ok(())
}

/// Deletes jobs in `status` last updated before `cutoff`, `batch_size` at a time.
/// Their executions go with them through the cascading foreign key.
async fn purge(
    db: &DatabaseConnection,
    status: JobStatus,
    cutoff: NaiveDateTime,
    batch_size: usize,
) -> Result<u64, DbErr> {
    let mut deleted = 0;

    loop {
        let ids: Vec<Uuid> = job::Entity::find()
            .select_only()
            .column(job::Column::Id)
            .filter(job::Column::Status.eq(status))
            .filter(job::Column::UpdatedAt.lte(cutoff))
            .order_by_asc(job::Column::UpdatedAt)
            .limit(batch_size as u64)
            .into_tuple()
            .all(db)
            .await?;

        if ids.is_empty() {
            return Ok(deleted);
        }

        deleted += job::Entity::delete_many()
            .filter(job::Column::Id.is_in(ids))
            .exec(db)
            .await?
            .rows_affected;

        sleep(PURGE_BATCH_PAUSE).await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use sea_orm::{DatabaseBackend, MockDatabase};

    use super::*;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .expect("valid timestamp")
    }

    fn pool(job_timeout: u32) -> WorkerQueueConfig {
        WorkerQueueConfig {
            jobs: vec!["send_notification".to_string()],
            count: 1,
            job_timeout,
            max_retries: 3,
            retry_backoff_seconds: vec![60, 300, 900],
        }
    }

    #[test]
    fn test_stuck_cutoff_is_twice_the_timeout() {
        assert_eq!(stuck_cutoff(&pool(300), at(12, 0)), at(11, 50));
    }

    #[test]
    fn test_retention_cutoff() {
        assert_eq!(retention_cutoff(7200, at(12, 0)), Some(at(10, 0)));
    }

    #[test]
    fn test_huge_retention_purges_nothing() {
        assert_eq!(retention_cutoff(u64::MAX, at(12, 0)), None);
        assert_eq!(retention_cutoff(1 << 50, at(12, 0)), None);
    }

    #[tokio::test]
    async fn test_stuck_job_is_reset_and_recorded() {
        let now = at(12, 0);
        let stuck_job = job::Model {
            id: Uuid::new_v4(),
            created_at: at(11, 0),
            updated_at: at(11, 30),
            r#type: "send_notification".to_string(),
            arguments: serde_json::json!({}),
            status: JobStatus::Running,
            retry_count: 1,
            next_execution_at: None,
            last_error: None,
        };
        let execution = job_execution::Model {
            id: Uuid::new_v4(),
            job_id: stuck_job.id,
            worker: RECOVERY_WORKER.to_string(),
            outcome: AttemptOutcome::TimedOut,
            started_at: stuck_job.updated_at,
            finished_at: now,
            execution_time_ms: 1_800_000,
            failure_reason: None,
            created_at: now,
        };
        let reset = job::Model {
            status: JobStatus::Pending,
            ..stuck_job.clone()
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stuck_job]])
            .append_query_results([vec![execution]])
            .append_query_results([vec![reset]])
            .into_connection();
        let workers = WorkersConfig {
            workers: HashMap::from([("mail".to_string(), pool(300))]),
        };

        let recovered = recover_stuck_jobs(&workers, &db, now).await;

        assert_eq!(recovered.ok(), Some(1));
        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains(r#"INSERT INTO "job_execution""#));
        assert!(log.contains(r#"UPDATE "job""#));
        assert!(log.contains("Abandoned after running for 1800s"));
    }
}
