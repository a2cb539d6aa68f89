use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, Statement};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Singleton background tasks that must run on exactly one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundTask {
    Scheduler,
    Cleanup,
    Recovery,
}

impl BackgroundTask {
    /// Postgres advisory lock key; the ASCII of the task name packed into an i64.
    pub const fn key(self) -> i64 {
        match self {
            Self::Scheduler => 0x5343_4845_4455_4C45, // "SCHEDULE"
            Self::Cleanup => 0x434C_4541_4E55_5000,   // "CLEANUP"
            Self::Recovery => 0x5245_434F_5645_5259,  // "RECOVERY"
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Scheduler => "scheduler",
            Self::Cleanup => "job cleanup",
            Self::Recovery => "stuck job recovery",
        }
    }
}

async fn query_lock_function(
    db: &DatabaseConnection,
    function: &str,
    key: i64,
) -> Result<bool, DbErr> {
    let stmt = Statement::from_sql_and_values(
        sea_orm::DatabaseBackend::Postgres,
        format!("SELECT {function}($1)"),
        [key.into()],
    );

    let result = db.query_one(stmt).await?;
    Ok(result
        .and_then(|row| row.try_get_by_index::<bool>(0).ok())
        .unwrap_or(false))
}

pub async fn try_acquire_lock(db: &DatabaseConnection, task: BackgroundTask) -> Result<bool, DbErr> {
    query_lock_function(db, "pg_try_advisory_lock", task.key()).await
}

pub async fn release_lock(db: &DatabaseConnection, task: BackgroundTask) -> Result<bool, DbErr> {
    query_lock_function(db, "pg_advisory_unlock", task.key()).await
}

/// Runs `task_fn` while holding the task's advisory lock, restarting it if it returns.
///
/// Instances that do not get the lock keep polling for it, so a replacement
/// takes over when the holder goes away.
pub async fn run_with_advisory_lock<F, Fut>(
    db: Arc<DatabaseConnection>,
    task: BackgroundTask,
    task_fn: F,
) where
    F: Fn(Arc<DatabaseConnection>) -> Fut,
    Fut: Future<Output = ()>,
{
    let task_name = task.name();
    let mut restart_count = 0;

    loop {
        match try_acquire_lock(&db, task).await {
            Ok(true) => {
                debug!("🔒 Acquired advisory lock for {}", task_name);

                task_fn(Arc::clone(&db)).await;

                match release_lock(&db, task).await {
                    Ok(true) => debug!("🔓 Released advisory lock for {}", task_name),
                    Ok(false) => debug!(
                        "🔓 Advisory lock for {} was already released (possibly by connection close)",
                        task_name
                    ),
                    Err(e) => warn!("Failed to release advisory lock for {}: {}", task_name, e),
                }

                restart_count += 1;
                error!(
                    "💥 {} stopped (restart #{}) - restarting in 10s...",
                    task_name, restart_count
                );

                sleep(Duration::from_secs(10)).await;
            }
            Ok(false) => {
                debug!(
                    "🔒 Advisory lock for {} held by another instance, waiting...",
                    task_name
                );

                // Jitter keeps instances from polling in lockstep
                let sleep_duration =
                    Duration::from_secs(5) + Duration::from_millis(fastrand::u64(0..2000));
                sleep(sleep_duration).await;
            }
            Err(e) => {
                error!("❌ Failed to acquire advisory lock for {}: {}", task_name, e);
                sleep(Duration::from_secs(10)).await;
            }
        }
    }
}
