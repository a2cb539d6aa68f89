use std::sync::{Arc, Mutex, PoisonError};

use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, NotSet, PaginatorTrait, Set};
use uuid::Uuid;

use crate::{
    database::models::{job, job_status::JobStatus},
    jobs::Job,
};

/// Job queue that can be either real (database) or mock (in-memory) for testing
#[derive(Clone, Debug)]
pub enum JobQueue {
    /// Inserts jobs into the `job` table; the insert trigger wakes the workers
    Database,
    /// Captures jobs in memory for tests
    Mock(Arc<Mutex<Vec<EnqueuedJob>>>),
}

/// A job that was added (captured by mock queue)
#[derive(Debug, Clone)]
pub struct EnqueuedJob {
    pub id: Uuid,
    pub job_type: String,
    pub arguments: serde_json::Value,
}

impl JobQueue {
    pub fn mock() -> Self {
        Self::Mock(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn database() -> Self {
        Self::Database
    }

    /// Enqueues a job. Passing a transaction makes the job part of it.
    pub async fn add<J: Job, C: ConnectionTrait>(
        &self,
        db: &C,
        arguments: J::Arguments,
    ) -> Result<Uuid, DbErr> {
        let arguments = serde_json::to_value(arguments).map_err(|e| DbErr::Json(e.to_string()))?;

        self.enqueue(db, J::name(), arguments).await
    }

    /// Enqueues a job by name with already serialized arguments.
    pub async fn enqueue<C: ConnectionTrait>(
        &self,
        db: &C,
        job_type: &str,
        arguments: serde_json::Value,
    ) -> Result<Uuid, DbErr> {
        let job_id = Uuid::new_v4();

        match self {
            Self::Database => {
                job::ActiveModel {
                    id: Set(job_id),
                    created_at: NotSet,
                    updated_at: NotSet,
                    r#type: Set(job_type.to_string()),
                    arguments: Set(arguments),
                    status: Set(JobStatus::Pending),
                    retry_count: Set(0),
                    next_execution_at: Set(None),
                    last_error: Set(None),
                }
                .insert(db)
                .await?;
            }
            Self::Mock(scheduled) => {
                scheduled
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(EnqueuedJob {
                        id: job_id,
                        job_type: job_type.to_string(),
                        arguments,
                    });
            }
        }

        Ok(job_id)
    }

    /// Number of jobs waiting to run.
    pub async fn backlog<C: ConnectionTrait>(&self, db: &C) -> Result<u64, DbErr> {
        match self {
            Self::Database => job::Entity::waiting().count(db).await,
            Self::Mock(scheduled) => Ok(scheduled
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len() as u64),
        }
    }

    /// Get all enqueued jobs (only available for mock queue)
    pub fn enqueued_jobs(&self) -> Option<Vec<EnqueuedJob>> {
        match self {
            Self::Mock(scheduled) => {
                Some(scheduled.lock().unwrap_or_else(PoisonError::into_inner).clone())
            }
            Self::Database => None,
        }
    }

    /// Get enqueued jobs of a specific type (only available for mock queue)
    pub fn enqueued_jobs_of_type(&self, job_type: &str) -> Option<Vec<EnqueuedJob>> {
        self.enqueued_jobs().map(|jobs| {
            jobs.into_iter()
                .filter(|job| job.job_type == job_type)
                .collect()
        })
    }

    pub fn clear_scheduled_jobs(&self) {
        if let Self::Mock(scheduled) = self {
            scheduled
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};

    use super::*;
    use crate::jobs::send_notification_job::{SendNotificationArguments, SendNotificationJob};

    #[tokio::test]
    async fn test_mock_queue_captures_arguments() {
        let queue = JobQueue::mock();
        let notification_id = Uuid::new_v4();

        let job_id = queue
            .add::<SendNotificationJob, _>(
                &DatabaseConnection::Disconnected,
                SendNotificationArguments { notification_id },
            )
            .await
            .expect("mock enqueue succeeds");

        let jobs = queue.enqueued_jobs_of_type("send_notification").unwrap_or_default();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, job_id);
        assert_eq!(jobs[0].arguments["notification_id"], notification_id.to_string());
        assert_eq!(queue.backlog(&DatabaseConnection::Disconnected).await.ok(), Some(1));

        queue.clear_scheduled_jobs();
        assert!(queue.enqueued_jobs().unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_database_queue_inserts_pending_row() {
        let now = chrono::Utc::now().naive_utc();
        let row = job::Model {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            r#type: "send_email".to_string(),
            arguments: serde_json::json!({}),
            status: JobStatus::Pending,
            retry_count: 0,
            next_execution_at: None,
            last_error: None,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row]])
            .into_connection();

        let result = JobQueue::database()
            .enqueue(&db, "send_email", serde_json::json!({}))
            .await;

        assert!(result.is_ok());
        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);
        assert!(format!("{:?}", log[0]).contains(r#"INSERT INTO "job""#));
    }
}
