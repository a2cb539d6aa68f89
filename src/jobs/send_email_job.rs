use serde::{Deserialize, Serialize};
use tracing::error;

use super::{Job, JobError};
use crate::{
    app::App,
    email_api::{
        request::SendEmailRequest,
        service::{self, SendContext},
    },
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEmailArguments {
    /// Generated when the request was queued and returned to the caller
    pub message_id: String,
    pub request: SendEmailRequest,
    #[serde(default)]
    pub context: SendContext,
}

/// Delivers an Email API request that was accepted through the queue endpoint.
pub struct SendEmailJob;

impl Job for SendEmailJob {
    type Arguments = SendEmailArguments;

    async fn execute(app: &App, arguments: Self::Arguments) -> Result<(), JobError> {
        service::send(
            app,
            &arguments.request,
            Some(arguments.message_id),
            &arguments.context,
        )
        .await
        .map(|_| ())
        .map_err(|failure| failure.error.into())
    }

    fn name() -> &'static str {
        "send_email"
    }

    async fn on_failure(_app: &App, arguments: serde_json::Value, reason: String) {
        let message_id = arguments
            .get("message_id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown");
        error!(message_id, "Giving up on queued email: {reason}");
    }
}
