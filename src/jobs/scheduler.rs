use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use tokio::{task::JoinSet, time::sleep};
use tracing::{debug, error, info, warn};

use crate::{job_queue::JobQueue, jobs::scheduled_job::ScheduledJob};

/// Enqueues every entry of `schedule` each time its cron expression fires.
///
/// Runs until all entries stop, which only happens when a schedule has no
/// upcoming times left.
pub async fn run_scheduler(db: Arc<DatabaseConnection>, schedule: Vec<ScheduledJob>) {
    if schedule.is_empty() {
        debug!("📅 Nothing scheduled, scheduler idles");
        return std::future::pending().await;
    }

    info!("📅 Scheduler started with {} entries", schedule.len());

    let mut entries = JoinSet::new();
    for entry in schedule {
        entries.spawn(run_entry(Arc::clone(&db), entry));
    }

    while let Some(finished) = entries.join_next().await {
        if let Err(e) = finished {
            error!("📅 Schedule entry task ended abnormally: {e}");
        }
    }
}

async fn run_entry(db: Arc<DatabaseConnection>, entry: ScheduledJob) {
    let queue = JobQueue::database();

    loop {
        let Some(wait) = time_until_next(&entry.schedule, Utc::now()) else {
            warn!(schedule = %entry.name, "📅 Cron expression has no upcoming runs");
            return;
        };
        debug!(schedule = %entry.name, wait_secs = wait.as_secs(), "📅 Waiting for next run");
        sleep(wait).await;

        match queue
            .enqueue(db.as_ref(), entry.job_name, entry.arguments.clone())
            .await
        {
            Ok(job_id) => info!(schedule = %entry.name, %job_id, "📅 Enqueued scheduled job"),
            Err(e) => error!(schedule = %entry.name, "❌ Failed to enqueue scheduled job: {e}"),
        }
    }
}

/// Time from `now` until the schedule next fires.
fn time_until_next(schedule: &cron::Schedule, now: DateTime<Utc>) -> Option<Duration> {
    schedule
        .after(&now)
        .next()
        .map(|at| (at - now).to_std().unwrap_or_default())
}
