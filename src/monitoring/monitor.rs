use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{
    checks,
    report::{HealthReport, OverallStatus},
};
use crate::app::App;

#[derive(Debug)]
struct CachedReport {
    report: HealthReport,
    taken_at: Instant,
}

/// Runs the health checks and keeps the last report for a short while.
///
/// The lock is held for the whole run, so concurrent callers wait for the
/// in-flight run and then share its result instead of starting their own.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    ttl: Duration,
    last: Arc<Mutex<Option<CachedReport>>>,
}

impl HealthMonitor {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            last: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn report(&self, app: &App) -> HealthReport {
        let mut last = self.last.lock().await;

        if let Some(cached) = last.as_ref() {
            if cached.taken_at.elapsed() < self.ttl {
                let mut report = cached.report.clone();
                report.cached = true;
                return report;
            }
        }

        let report = run_checks(app).await;
        match report.status {
            OverallStatus::Healthy => debug!("Health check passed"),
            status => warn!(
                status = ?status,
                failing = ?report
                    .checks
                    .iter()
                    .filter(|check| check.status != super::CheckStatus::Healthy)
                    .map(|check| check.name.as_str())
                    .collect::<Vec<_>>(),
                "Health check reported problems"
            ),
        }

        *last = Some(CachedReport {
            report: report.clone(),
            taken_at: Instant::now(),
        });
        report
    }

    /// Drops the cached report so the next call runs the checks again.
    pub async fn invalidate(&self) {
        *self.last.lock().await = None;
    }
}

/// Runs every check once, concurrently.
pub async fn run_checks(app: &App) -> HealthReport {
    let monitoring = &app.config.monitoring;

    let (database, smtp, memory, queue) = tokio::join!(
        checks::check_database(app.db.as_ref(), monitoring),
        checks::check_smtp(&app.config.email, monitoring),
        checks::check_memory(monitoring),
        checks::check_queue(&app.job_queue, app.db.as_ref(), monitoring),
    );
    let disk = checks::check_disk(monitoring);
    let cache = checks::check_cache(&app.cache);

    HealthReport::new(vec![database, smtp, disk, memory, queue, cache])
}
