use std::{collections::BTreeSet, future::Future, sync::Arc, time::Duration};

use sea_orm::DatabaseConnection;
use thiserror::Error;
use tokio::{spawn, time::sleep};
use tracing::{error, info};

use crate::{
    app::App,
    config::{WorkerQueueConfig, WorkersConfig},
    jobs::{
        advisory_lock::{run_with_advisory_lock, BackgroundTask},
        maintenance,
        scheduler::run_scheduler,
        worker::worker,
    },
};

use super::{job_registry::JobRegistry, scheduled_job::ScheduledJob};

const MAX_RESTART_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
#[error("No worker pool configured to handle job type '{0}'")]
pub struct UncoveredJobType(pub String);

/// Checks that every registered job has a worker pool, so nothing sits in the queue forever.
pub fn verify_job_types_have_workers(
    workers_config: &WorkersConfig,
    job_registry: &JobRegistry,
) -> Result<(), UncoveredJobType> {
    let covered: BTreeSet<&str> = workers_config
        .workers
        .values()
        .flat_map(|pool| pool.jobs.iter().map(String::as_str))
        .collect();

    let registered: BTreeSet<&str> = job_registry.job_names().collect();

    registered
        .difference(&covered)
        .next()
        .map_or(Ok(()), |job_type| Err(UncoveredJobType((*job_type).to_string())))
}

/// Starts the worker pools and the singleton tasks, then parks forever.
pub async fn job_supervisor(app: App, job_registry: JobRegistry, job_schedule: Vec<ScheduledJob>) {
    let jobs = app.config.jobs.clone();

    info!("🚀 Starting {} worker pool(s)", jobs.workers.workers.len());
    for (pool_name, pool) in &jobs.workers.workers {
        info!("⚡ Pool '{pool_name}': {} worker(s) for {:?}", pool.count, pool.jobs);
        for index in 0..pool.count {
            spawn(supervise_worker(
                format!("{pool_name}-{index}"),
                pool.clone(),
                app.clone(),
                job_registry.clone(),
            ));
        }
    }

    spawn_singleton(&app.db, BackgroundTask::Scheduler, move |db| {
        run_scheduler(db, job_schedule.clone())
    });

    let workers = jobs.workers.clone();
    spawn_singleton(&app.db, BackgroundTask::Recovery, move |db| {
        let workers = workers.clone();
        async move { maintenance::run_recovery(&workers, &db).await }
    });

    let cleanup = jobs.cleanup;
    spawn_singleton(&app.db, BackgroundTask::Cleanup, move |db| {
        let cleanup = cleanup.clone();
        async move { maintenance::run_cleanup(&cleanup, &db).await }
    });

    std::future::pending::<()>().await;
}

fn spawn_singleton<F, Fut>(db: &Arc<DatabaseConnection>, task: BackgroundTask, task_fn: F)
where
    F: Fn(Arc<DatabaseConnection>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    info!("🔒 Starting {} (single instance)", task.name());
    spawn(run_with_advisory_lock(Arc::clone(db), task, task_fn));
}

/// Keeps one worker running, restarting it with a growing delay after each crash.
async fn supervise_worker(
    worker_name: String,
    pool: WorkerQueueConfig,
    app: App,
    job_registry: JobRegistry,
) {
    let mut crashes: u32 = 0;

    loop {
        if let Err(e) = worker(&worker_name, &pool, app.clone(), &job_registry).await {
            crashes += 1;
            let delay = restart_delay(crashes);
            error!(
                worker = %worker_name,
                crashes,
                "💥 Worker crashed, restarting in {}s: {e}",
                delay.as_secs()
            );
            sleep(delay).await;
        }
    }
}

fn restart_delay(crashes: u32) -> Duration {
    Duration::from_secs(5 * u64::from(crashes)).min(MAX_RESTART_DELAY)
}
