use std::{collections::HashMap, fmt, future::Future, marker::PhantomData, pin::Pin, sync::Arc};

use serde_json::Value;

use crate::app::App;

use super::{Job, JobError};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Object-safe face of a [`Job`] so jobs of different argument types share one map.
trait ErasedJob: Send + Sync {
    fn run(&self, app: App, arguments: Value) -> BoxFuture<Result<(), JobError>>;

    fn give_up(&self, app: App, arguments: Value, reason: String) -> BoxFuture<()>;
}

struct Registered<J>(PhantomData<fn() -> J>);

impl<J: Job + 'static> ErasedJob for Registered<J> {
    fn run(&self, app: App, arguments: Value) -> BoxFuture<Result<(), JobError>> {
        Box::pin(async move {
            let arguments = serde_json::from_value::<J::Arguments>(arguments).map_err(|e| {
                JobError::FailPermanently(format!("Invalid arguments for '{}': {e}", J::name()))
            })?;

            J::execute(&app, arguments).await
        })
    }

    fn give_up(&self, app: App, arguments: Value, reason: String) -> BoxFuture<()> {
        Box::pin(async move { J::on_failure(&app, arguments, reason).await })
    }
}

/// Job implementations by name, as stored in `job.type`.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: HashMap<&'static str, Arc<dyn ErasedJob>>,
}

impl fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.jobs.keys()).finish()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_job<J: Job + 'static>(&mut self) {
        self.jobs
            .insert(J::name(), Arc::new(Registered::<J>(PhantomData)));
    }

    pub fn job_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.jobs.keys().copied()
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.jobs.contains_key(job_type)
    }

    /// Runs one attempt. Unknown job types and unreadable arguments fail permanently.
    pub(crate) async fn execute(
        &self,
        app: &App,
        job_type: &str,
        arguments: &Value,
    ) -> Result<(), JobError> {
        let Some(job) = self.jobs.get(job_type) else {
            return Err(JobError::FailPermanently(format!(
                "No job registered for type '{job_type}'"
            )));
        };

        job.run(app.clone(), arguments.clone()).await
    }

    /// Invokes the failure hook of a job that will not be attempted again.
    pub(crate) async fn give_up(&self, app: &App, job_type: &str, arguments: &Value, reason: String) {
        if let Some(job) = self.jobs.get(job_type) {
            job.give_up(app.clone(), arguments.clone(), reason).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::DatabaseConnection;
    use serde_json::json;

    use super::*;
    use crate::{jobs, tests::test_app};

    #[tokio::test]
    async fn test_unknown_job_type_fails_permanently() {
        let app = test_app(DatabaseConnection::Disconnected);

        let result = jobs::registry()
            .execute(&app, "reticulate_splines", &json!({}))
            .await;

        assert!(matches!(result, Err(JobError::FailPermanently(reason)) if reason.contains("reticulate_splines")));
    }

    #[tokio::test]
    async fn test_unreadable_arguments_fail_permanently() {
        let app = test_app(DatabaseConnection::Disconnected);

        let result = jobs::registry()
            .execute(&app, "send_notification", &json!({ "notification_id": "nope" }))
            .await;

        assert!(matches!(result, Err(JobError::FailPermanently(reason)) if reason.contains("Invalid arguments")));
    }

    #[test]
    fn test_debug_lists_job_names() {
        let mut registry = JobRegistry::new();
        registry.register_job::<jobs::send_email_job::SendEmailJob>();

        assert!(registry.contains("send_email"));
        assert_eq!(format!("{registry:?}"), r#"{"send_email"}"#);
    }
}
