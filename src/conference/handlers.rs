use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::{
    notifications,
    payments::{self, PaymentReviewRequest, PaymentUpload},
    storage::sanitize_filename,
    submissions::{self, CreateSubmissionRequest, ListQuery, ReviewRequest, UpdateSubmissionRequest},
};
use crate::{
    api::{validated_json::ValidatedJson, ApiError, ApiResult},
    app::App,
};

/// `POST /api/submissions`
pub async fn create(
    State(app): State<App>,
    ValidatedJson(request): ValidatedJson<CreateSubmissionRequest>,
) -> ApiResult<impl IntoResponse> {
    let details = submissions::create(&app, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "submission": details })),
    ))
}

/// `GET /api/submissions`
pub async fn list(
    State(app): State<App>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    query.validate().map_err(ApiError::Validation)?;

    let page = submissions::list(&app, &query).await?;

    Ok(Json(json!({ "success": true, "submissions": page })))
}

/// `GET /api/submissions/{id}`
pub async fn show(State(app): State<App>, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let details = submissions::details(&app, id).await?;

    Ok(Json(json!({ "success": true, "submission": details })))
}

/// `PATCH /api/submissions/{id}`
pub async fn update(
    State(app): State<App>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateSubmissionRequest>,
) -> ApiResult<impl IntoResponse> {
    let submission = submissions::update(&app, id, request).await?;

    Ok(Json(json!({ "success": true, "submission": submission })))
}

/// `POST /api/submissions/{id}/review`
pub async fn review(
    State(app): State<App>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ReviewRequest>,
) -> ApiResult<impl IntoResponse> {
    let submission = submissions::review(&app, id, request).await?;

    Ok(Json(json!({ "success": true, "submission": submission })))
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<PaymentUpload> {
    let mut proof = None;
    let mut amount_cents = None;
    let mut currency = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidUpload(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "proof" => {
                let filename = sanitize_filename(field.file_name().unwrap_or("proof"));
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::InvalidUpload(e.body_text()))?;
                proof = Some((filename, data.to_vec()));
            }
            "amount_cents" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidUpload(e.body_text()))?;
                amount_cents = Some(
                    value
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| ApiError::invalid_field("amount_cents", "must be a whole number"))?,
                );
            }
            "currency" => {
                currency = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::InvalidUpload(e.body_text()))?,
                );
            }
            _ => {}
        }
    }

    let (filename, data) =
        proof.ok_or_else(|| ApiError::invalid_field("proof", "a proof file is required"))?;
    let amount_cents =
        amount_cents.ok_or_else(|| ApiError::invalid_field("amount_cents", "is required"))?;

    Ok(PaymentUpload {
        filename,
        data,
        amount_cents,
        currency: currency.filter(|c| !c.trim().is_empty()),
    })
}

/// `POST /api/submissions/{id}/payment`
pub async fn upload_payment(
    State(app): State<App>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let upload = read_upload(multipart).await?;
    let payment = payments::upload(&app, id, upload).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "payment": payment })),
    ))
}

/// `GET /api/submissions/{id}/payment/proof`
pub async fn payment_proof(
    State(app): State<App>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (payment, data) = payments::proof(&app, id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, payment.content_type),
            (
                header::CONTENT_DISPOSITION,
                format!(
                    "attachment; filename=\"{}\"",
                    sanitize_filename(&payment.original_filename)
                ),
            ),
        ],
        data,
    ))
}

/// `POST /api/submissions/{id}/payment/review`
pub async fn review_payment(
    State(app): State<App>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<PaymentReviewRequest>,
) -> ApiResult<impl IntoResponse> {
    let payment = payments::review(&app, id, request).await?;

    Ok(Json(json!({ "success": true, "payment": payment })))
}

/// `GET /api/submissions/{id}/loa`
pub async fn letter_of_acceptance(
    State(app): State<App>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (filename, pdf) = payments::loa(&app, id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, super::letter::LETTER_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        pdf,
    ))
}

/// `GET /api/submissions/{id}/notifications`
pub async fn notifications(
    State(app): State<App>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    submissions::find(app.db.as_ref(), id).await?;
    let notifications = notifications::list_for_submission(app.db.as_ref(), id).await?;

    Ok(Json(json!({ "success": true, "notifications": notifications })))
}
