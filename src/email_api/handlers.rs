use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use tracing::error;
use validator::Validate;

use super::{
    request::SendEmailRequest,
    service::{self, SendContext},
    statistics::{self, StatisticsQuery, DEFAULT_DAYS},
};
use crate::{
    api::{
        api_key::ApiClient, request_logging::RequestId, validated_json::ValidatedJson, ApiError,
        ApiResult,
    },
    app::App,
    emails::generate_message_id,
    jobs::send_email_job::{SendEmailArguments, SendEmailJob},
    monitoring::OverallStatus,
};

fn context(request_id: Option<Extension<RequestId>>, client: Option<Extension<ApiClient>>) -> SendContext {
    SendContext {
        request_id: request_id.map(|Extension(id)| id.0),
        api_client: client.map(|Extension(client)| client.0),
    }
}

/// `POST /api/email/send`
pub async fn send(
    State(app): State<App>,
    request_id: Option<Extension<RequestId>>,
    client: Option<Extension<ApiClient>>,
    ValidatedJson(request): ValidatedJson<SendEmailRequest>,
) -> ApiResult<impl IntoResponse> {
    let context = context(request_id, client);

    let outcome = service::send(&app, &request, None, &context)
        .await
        .map_err(|failure| ApiError::EmailSendFailed {
            message_id: failure.message_id,
            reason: failure.error.to_string(),
        })?;

    Ok(Json(json!({
        "success": true,
        "message_id": outcome.message_id,
        "status": "sent",
        "recipients": outcome.recipients,
        "sent_at": outcome.sent_at,
    })))
}

/// `POST /api/email/queue`
pub async fn queue(
    State(app): State<App>,
    request_id: Option<Extension<RequestId>>,
    client: Option<Extension<ApiClient>>,
    ValidatedJson(request): ValidatedJson<SendEmailRequest>,
) -> ApiResult<impl IntoResponse> {
    let message_id = generate_message_id(&app.config.email.sender());
    let recipients = request.recipient_count();

    let job_id = app
        .run_job::<SendEmailJob>(SendEmailArguments {
            message_id: message_id.clone(),
            request,
            context: context(request_id, client),
        })
        .await
        .map_err(|e| {
            error!("Failed to queue email {message_id}: {e}");
            ApiError::QueueFailed("The email could not be queued".to_string())
        })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "message_id": message_id,
            "job_id": job_id,
            "status": "queued",
            "recipients": recipients,
        })),
    ))
}

/// `GET /api/email/statistics?days=N`
pub async fn statistics(
    State(app): State<App>,
    Query(query): Query<StatisticsQuery>,
) -> ApiResult<impl IntoResponse> {
    query.validate().map_err(ApiError::Validation)?;
    let days = query.days.unwrap_or(DEFAULT_DAYS);

    let statistics = statistics::statistics(&app, days).await?;

    Ok(Json(json!({ "success": true, "statistics": statistics })))
}

/// `GET /api/email/health`
pub async fn health(State(app): State<App>) -> impl IntoResponse {
    let report = app.health.report(&app).await;

    let status = if report.status == OverallStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status, Json(report))
}
