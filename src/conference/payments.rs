use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect,
    Set, TransactionTrait,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::{
    letter::{self, LetterDetails},
    notifications,
    storage::{StorageError, UploadStorage},
    submissions::{self, Decision},
};
use crate::{
    api::{ApiError, ApiResult},
    app::App,
    database::models::{
        abstract_submission, notification_kind::NotificationKind, payment_status::PaymentStatus,
        submission_payment, submission_status::SubmissionStatus,
    },
};

/// A payment proof as received from the multipart form.
#[derive(Debug, Clone)]
pub struct PaymentUpload {
    pub filename: String,
    pub data: Vec<u8>,
    pub amount_cents: i64,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PaymentReviewRequest {
    pub decision: Decision,
    #[validate(email(message = "must be a valid email address"))]
    pub reviewer_email: String,
    #[serde(default)]
    #[validate(length(max = 5000, message = "must be at most 5000 characters"))]
    pub note: Option<String>,
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::Io(e) => Self::Internal(format!("Upload storage failed: {e}")),
            other => Self::InvalidUpload(other.to_string()),
        }
    }
}

/// Three-letter ISO 4217 style code, upper-cased.
pub fn normalize_currency(currency: &str) -> Option<String> {
    let currency = currency.trim().to_ascii_uppercase();
    (currency.len() == 3 && currency.bytes().all(|b| b.is_ascii_uppercase())).then_some(currency)
}

pub async fn find_payment<C: ConnectionTrait>(
    db: &C,
    submission_id: Uuid,
) -> Result<Option<submission_payment::Model>, DbErr> {
    submission_payment::Entity::find()
        .filter(submission_payment::Column::SubmissionId.eq(submission_id))
        .one(db)
        .await
}

/// Stores a proof for an approved submission, replacing a pending or
/// rejected one. An approved payment is frozen.
pub async fn upload(
    app: &App,
    submission_id: Uuid,
    upload: PaymentUpload,
) -> ApiResult<submission_payment::Model> {
    if upload.amount_cents <= 0 {
        return Err(ApiError::invalid_field("amount_cents", "must be a positive amount"));
    }

    let storage = UploadStorage::from_config(&app.config.storage);
    let kind = storage.inspect(&upload.data)?;

    let txn = app.db.begin().await?;

    let submission = abstract_submission::Entity::find_by_id(submission_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or(ApiError::NotFound("Submission"))?;

    if submission.status != SubmissionStatus::Approved {
        return Err(ApiError::PaymentNotAllowed(
            "Payments can only be made for approved submissions".to_string(),
        ));
    }

    let currency = match upload.currency.as_deref() {
        Some(currency) => normalize_currency(currency)
            .ok_or_else(|| ApiError::invalid_field("currency", "must be a three-letter currency code"))?,
        None => submission.currency.clone(),
    };

    let existing = find_payment(&txn, submission_id).await?;
    if existing.as_ref().is_some_and(|p| !p.status.accepts_upload()) {
        return Err(ApiError::PaymentNotAllowed(
            "The payment has already been approved".to_string(),
        ));
    }

    let stored = storage
        .save_proof(submission_id, &upload.filename, &upload.data)
        .await?;

    let (saved, previous_path) = match existing {
        Some(payment) => {
            let previous_path = payment.proof_path.clone();
            let mut active: submission_payment::ActiveModel = payment.into();
            active.proof_path = Set(stored.path.clone());
            active.original_filename = Set(upload.filename);
            active.content_type = Set(kind.content_type().to_string());
            active.amount_cents = Set(upload.amount_cents);
            active.currency = Set(currency);
            active.status = Set(PaymentStatus::Pending);
            active.reviewed_by = Set(None);
            active.reviewed_at = Set(None);
            active.review_note = Set(None);
            (active.update(&txn).await, Some(previous_path))
        }
        None => {
            let inserted = submission_payment::ActiveModel {
                id: Set(Uuid::new_v4()),
                submission_id: Set(submission_id),
                proof_path: Set(stored.path.clone()),
                original_filename: Set(upload.filename),
                content_type: Set(kind.content_type().to_string()),
                amount_cents: Set(upload.amount_cents),
                currency: Set(currency),
                status: Set(PaymentStatus::Pending),
                reviewed_by: Set(None),
                reviewed_at: Set(None),
                review_note: Set(None),
                ..Default::default()
            }
            .insert(&txn)
            .await;
            (inserted, None)
        }
    };

    let committed = match saved {
        Ok(payment) => txn.commit().await.map(|()| payment),
        Err(e) => Err(e),
    };
    let payment = match committed {
        Ok(payment) => payment,
        Err(e) => {
            // The row never landed, so neither should the file
            discard(&storage, &stored.path).await;
            return Err(e.into());
        }
    };

    if let Some(previous) = previous_path.filter(|p| p != &payment.proof_path) {
        discard(&storage, &previous).await;
    }

    info!(
        submission_id = %submission_id,
        payment_id = %payment.id,
        bytes = upload.data.len(),
        "Payment proof uploaded"
    );

    Ok(payment)
}

async fn discard(storage: &UploadStorage, path: &str) {
    if let Err(e) = storage.remove(path).await {
        warn!(path, "Failed to remove payment proof: {e}");
    }
}

pub async fn review(
    app: &App,
    submission_id: Uuid,
    request: PaymentReviewRequest,
) -> ApiResult<submission_payment::Model> {
    let reviewer =
        super::access::authorize_admin(app.db.as_ref(), &app.config.access, &request.reviewer_email)
            .await?;
    let next = request.decision.payment_status();

    let txn = app.db.begin().await?;

    let submission = submissions::find(&txn, submission_id).await?;
    let payment = submission_payment::Entity::find()
        .filter(submission_payment::Column::SubmissionId.eq(submission_id))
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or(ApiError::NotFound("Payment"))?;

    if payment.status != PaymentStatus::Pending || !payment.status.can_transition_to(next) {
        return Err(ApiError::InvalidStatusTransition(format!(
            "Cannot change payment status from {} to {next}",
            payment.status
        )));
    }

    let submitter = submissions::submitter(&txn, &submission).await?;

    let mut active: submission_payment::ActiveModel = payment.into();
    active.status = Set(next);
    active.reviewed_by = Set(Some(reviewer.id));
    active.reviewed_at = Set(Some(chrono::Utc::now().naive_utc()));
    active.review_note = Set(request.note.clone());
    let payment = active.update(&txn).await?;

    let kind = match request.decision {
        Decision::Approve => NotificationKind::PaymentApproved,
        Decision::Reject => NotificationKind::PaymentRejected,
    };
    let ctx = notifications::context(app, &submission, &submitter, request.note);
    notifications::queue(app, &txn, kind, &submitter, &ctx).await?;

    txn.commit().await?;

    info!(
        submission_id = %submission_id,
        reviewer = %reviewer.email,
        status = %payment.status,
        "Payment reviewed"
    );

    Ok(payment)
}

/// The stored proof and its metadata.
pub async fn proof(app: &App, submission_id: Uuid) -> ApiResult<(submission_payment::Model, Vec<u8>)> {
    let payment = find_payment(app.db.as_ref(), submission_id)
        .await?
        .ok_or(ApiError::NotFound("Payment"))?;

    let data = UploadStorage::from_config(&app.config.storage)
        .read(&payment.proof_path)
        .await
        .map_err(|e| match e {
            StorageError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ApiError::NotFound("Payment proof")
            }
            other => other.into(),
        })?;

    Ok((payment, data))
}

pub async fn letter_details<C: ConnectionTrait>(
    db: &C,
    submission: &abstract_submission::Model,
) -> Result<LetterDetails, DbErr> {
    let authors = submissions::contributors(db, submission.id)
        .await?
        .into_iter()
        .map(|contributor| contributor.name)
        .collect();

    Ok(LetterDetails {
        submission_id: submission.id,
        title: submission.title.clone(),
        authors,
        presentation_type: submission.presentation_type.to_string(),
        approved_at: submission.reviewed_at,
    })
}

/// Renders the Letter of Acceptance once the payment is approved.
pub async fn loa(app: &App, submission_id: Uuid) -> ApiResult<(String, Vec<u8>)> {
    let submission = submissions::find(app.db.as_ref(), submission_id).await?;
    let payment = find_payment(app.db.as_ref(), submission_id).await?;

    if !submissions::loa_available(payment.as_ref()) {
        return Err(ApiError::LoaUnavailable(
            "The letter of acceptance is available once the payment is approved".to_string(),
        ));
    }

    let details = letter_details(app.db.as_ref(), &submission).await?;
    let pdf = letter::render_blocking(&app.config.conference, &details)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((details.filename(), pdf))
}

#[cfg(test)]
mod tests {
    use sea_orm::{DatabaseBackend, MockDatabase};

    use super::*;
    use crate::{
        database::models::user_role::UserRole,
        tests::{fixtures, test_app},
    };

    const PDF: &[u8] = b"%PDF-1.7 proof";

    fn proof_upload() -> PaymentUpload {
        PaymentUpload {
            filename: "receipt.pdf".to_string(),
            data: PDF.to_vec(),
            amount_cents: 15_000,
            currency: Some("eur".to_string()),
        }
    }

    #[test]
    fn test_normalize_currency() {
        assert_eq!(normalize_currency(" eur ").as_deref(), Some("EUR"));
        assert_eq!(normalize_currency("EURO"), None);
        assert_eq!(normalize_currency("E1R"), None);
    }

    #[tokio::test]
    async fn test_upload_rejects_unknown_file_type() {
        let app = test_app(sea_orm::DatabaseConnection::Disconnected);
        let mut proof = proof_upload();
        proof.data = b"MZ executable".to_vec();

        let result = upload(&app, Uuid::new_v4(), proof).await;

        assert!(matches!(result, Err(ApiError::InvalidUpload(_))));
    }

    #[tokio::test]
    async fn test_upload_requires_approved_submission() {
        let submission = fixtures::submission(SubmissionStatus::Pending);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![submission.clone()]])
            .into_connection();
        let app = test_app(db);

        let result = upload(&app, submission.id, proof_upload()).await;

        assert!(matches!(result, Err(ApiError::PaymentNotAllowed(_))));
    }

    #[tokio::test]
    async fn test_approved_payment_is_frozen() {
        let submission = fixtures::submission(SubmissionStatus::Approved);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![submission.clone()]])
            .append_query_results([vec![fixtures::payment(submission.id, PaymentStatus::Approved)]])
            .into_connection();
        let app = test_app(db);

        let result = upload(&app, submission.id, proof_upload()).await;

        assert!(matches!(result, Err(ApiError::PaymentNotAllowed(_))));
    }

    #[tokio::test]
    async fn test_first_upload_stores_proof() {
        let dir = tempfile::tempdir().expect("temp dir");
        let submission = fixtures::submission(SubmissionStatus::Approved);
        let stored = fixtures::payment(submission.id, PaymentStatus::Pending);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![submission.clone()]])
            .append_query_results([Vec::<submission_payment::Model>::new()])
            .append_query_results([vec![stored.clone()]])
            .into_connection();
        let mut app = test_app(db);
        app.config.storage.upload_dir = dir.path().display().to_string();

        let payment = upload(&app, submission.id, proof_upload())
            .await
            .expect("upload succeeds");

        assert_eq!(payment.id, stored.id);
        assert!(dir.path().join("payments").join(submission.id.to_string()).is_dir());
    }

    #[tokio::test]
    async fn test_review_requires_pending_payment() {
        let submission = fixtures::submission(SubmissionStatus::Approved);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![fixtures::user("chair@example.org", UserRole::Admin)]])
            .append_query_results([vec![submission.clone()]])
            .append_query_results([vec![fixtures::payment(submission.id, PaymentStatus::Rejected)]])
            .into_connection();
        let app = test_app(db);

        let result = review(
            &app,
            submission.id,
            PaymentReviewRequest {
                decision: Decision::Approve,
                reviewer_email: "chair@example.org".to_string(),
                note: None,
            },
        )
        .await;

        assert!(matches!(result, Err(ApiError::InvalidStatusTransition(_))));
    }

    #[tokio::test]
    async fn test_loa_unavailable_before_payment_approval() {
        let submission = fixtures::submission(SubmissionStatus::Approved);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![submission.clone()]])
            .append_query_results([vec![fixtures::payment(submission.id, PaymentStatus::Pending)]])
            .into_connection();
        let app = test_app(db);

        let result = loa(&app, submission.id).await;

        assert!(matches!(result, Err(ApiError::LoaUnavailable(_))));
    }
}
