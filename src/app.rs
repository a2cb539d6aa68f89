use std::{sync::Arc, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DatabaseConnection;
use thiserror::Error;

use crate::{
    cache::Cache, config::Config, environment::Environment,
    job_queue::JobQueue, jobs::Job, mailer::Mailer, monitoring::HealthMonitor,
};

/// Shared application state handed to every handler and job.
///
/// The connection sits behind an `Arc`: sea-orm's `mock` feature removes its `Clone`.
#[derive(Clone, Debug)]
pub struct App {
    pub config: Config,
    pub environment: Environment,
    pub db: Arc<DatabaseConnection>,
    pub mailer: Mailer,
    pub job_queue: JobQueue,
    pub cache: Cache,
    pub health: HealthMonitor,
}

impl App {
    pub fn new(
        config: Config,
        environment: Environment,
        db: impl Into<Arc<DatabaseConnection>>,
        mailer: Mailer,
        job_queue: JobQueue,
    ) -> Self {
        let health = HealthMonitor::new(Duration::from_secs(config.monitoring.cache_seconds));

        Self {
            config,
            environment,
            db: db.into(),
            mailer,
            job_queue,
            cache: Cache::new(),
            health,
        }
    }

    pub async fn run_job<J: Job>(&self, arguments: J::Arguments) -> Result<uuid::Uuid, sea_orm::DbErr> {
        self.job_queue.add::<J, _>(self.db.as_ref(), arguments).await
    }
}

#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("Database connection error")]
    DatabaseError(#[from] sea_orm::DbErr),
}

impl IntoResponse for ReadinessError {
    fn into_response(self) -> Response {
        (StatusCode::SERVICE_UNAVAILABLE, self.to_string()).into_response()
    }
}
