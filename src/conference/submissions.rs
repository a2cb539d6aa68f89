use std::collections::HashSet;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ItemsAndPagesNumber,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidateEmail, ValidationError};

use super::{access, notifications};
use crate::{
    api::{ApiError, ApiResult},
    app::App,
    database::models::{
        abstract_submission,
        contributor_role::{ContributorRole, PresentationType},
        notification_kind::NotificationKind,
        payment_status::PaymentStatus,
        submission_contributor, submission_payment,
        submission_status::SubmissionStatus,
        user,
    },
};

pub const MAX_KEYWORDS: usize = 10;
pub const MAX_KEYWORD_CHARS: usize = 50;
pub const DEFAULT_PER_PAGE: u64 = 20;

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_contributors"))]
pub struct CreateSubmissionRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub submitter_email: String,
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub submitter_name: String,
    #[validate(length(min = 1, max = 300, message = "must be between 1 and 300 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 10000, message = "must be between 1 and 10000 characters"))]
    pub abstract_body: String,
    #[serde(default)]
    #[validate(custom(function = "validate_keywords"))]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub presentation_type: PresentationType,
    #[validate(
        length(min = 1, max = 20, message = "must list between 1 and 20 contributors"),
        nested
    )]
    pub contributors: Vec<ContributorRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ContributorRequest {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 255, message = "must be at most 255 characters"))]
    pub affiliation: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub country: Option<String>,
    pub role: ContributorRole,
    #[serde(default)]
    pub is_primary_contact: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_update"))]
pub struct UpdateSubmissionRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 300, message = "must be between 1 and 300 characters"))]
    pub title: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 10000, message = "must be between 1 and 10000 characters"))]
    pub abstract_body: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub presentation_type: Option<PresentationType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub const fn submission_status(self) -> SubmissionStatus {
        match self {
            Self::Approve => SubmissionStatus::Approved,
            Self::Reject => SubmissionStatus::Rejected,
        }
    }

    pub const fn payment_status(self) -> PaymentStatus {
        match self {
            Self::Approve => PaymentStatus::Approved,
            Self::Reject => PaymentStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReviewRequest {
    pub decision: Decision,
    #[validate(email(message = "must be a valid email address"))]
    pub reviewer_email: String,
    #[serde(default)]
    #[validate(length(max = 5000, message = "must be at most 5000 characters"))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<SubmissionStatus>,
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100, message = "must be between 1 and 100"))]
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionDetails {
    #[serde(flatten)]
    pub submission: abstract_submission::Model,
    pub contributors: Vec<submission_contributor::Model>,
    pub payment: Option<submission_payment::Model>,
    pub loa_available: bool,
}

#[derive(Debug, Serialize)]
pub struct SubmissionPage {
    pub items: Vec<abstract_submission::Model>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
}

fn error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

fn validate_keywords(keywords: &[String]) -> Result<(), ValidationError> {
    if keywords.len() > MAX_KEYWORDS {
        return Err(error("keywords", "at most 10 keywords are allowed"));
    }
    if keywords
        .iter()
        .any(|k| k.trim().is_empty() || k.chars().count() > MAX_KEYWORD_CHARS)
    {
        return Err(error(
            "keywords",
            "keywords must be non-empty and at most 50 characters",
        ));
    }
    Ok(())
}

fn validate_contributors(request: &CreateSubmissionRequest) -> Result<(), ValidationError> {
    let contributors = &request.contributors;

    if contributors.iter().filter(|c| c.is_primary_contact).count() != 1 {
        return Err(error(
            "primary_contact",
            "exactly one contributor must be the primary contact",
        ));
    }
    if !contributors.iter().any(|c| c.role == ContributorRole::Author) {
        return Err(error("author", "at least one contributor must be an author"));
    }

    let mut seen = HashSet::new();
    if !contributors
        .iter()
        .all(|c| c.email.validate_email() && seen.insert(access::normalize_email(&c.email)))
    {
        return Err(error(
            "contributors",
            "contributor emails must be valid and unique",
        ));
    }

    Ok(())
}

fn validate_update(request: &UpdateSubmissionRequest) -> Result<(), ValidationError> {
    request
        .keywords
        .as_deref()
        .map_or(Ok(()), validate_keywords)
}

fn clean_keywords(keywords: &[String]) -> serde_json::Value {
    serde_json::json!(keywords.iter().map(|k| k.trim()).collect::<Vec<_>>())
}

/// Only a paid-for, verified submission gets a letter.
pub fn loa_available(payment: Option<&submission_payment::Model>) -> bool {
    payment.is_some_and(|p| p.status == PaymentStatus::Approved)
}

pub async fn find<C: ConnectionTrait>(db: &C, id: Uuid) -> ApiResult<abstract_submission::Model> {
    abstract_submission::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ApiError::NotFound("Submission"))
}

pub async fn submitter<C: ConnectionTrait>(
    db: &C,
    submission: &abstract_submission::Model,
) -> ApiResult<user::Model> {
    user::Entity::find_by_id(submission.user_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("Submitter of {} is missing", submission.id)))
}

pub async fn contributors<C: ConnectionTrait>(
    db: &C,
    submission_id: Uuid,
) -> Result<Vec<submission_contributor::Model>, sea_orm::DbErr> {
    submission_contributor::Entity::find()
        .filter(submission_contributor::Column::SubmissionId.eq(submission_id))
        .order_by_asc(submission_contributor::Column::Position)
        .all(db)
        .await
}

pub async fn create(app: &App, request: CreateSubmissionRequest) -> ApiResult<SubmissionDetails> {
    access::ensure_can_submit(&app.config.access, &request.submitter_email)?;

    let submitter =
        access::find_or_create_user(app.db.as_ref(), &request.submitter_email, &request.submitter_name)
            .await?;

    let fee = app.config.conference.registration_fee_cents.max(0);
    let txn = app.db.begin().await?;

    let submission = abstract_submission::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(submitter.id),
        title: Set(request.title.trim().to_string()),
        abstract_body: Set(request.abstract_body),
        keywords: Set(clean_keywords(&request.keywords)),
        status: Set(SubmissionStatus::Pending),
        presentation_type: Set(request.presentation_type),
        registration_fee_cents: Set(fee),
        currency: Set(app.config.conference.currency.clone()),
        requires_payment: Set(fee > 0),
        reviewed_by: Set(None),
        reviewed_at: Set(None),
        review_comment: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut contributors = Vec::with_capacity(request.contributors.len());
    for (position, contributor) in request.contributors.into_iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| ApiError::invalid_field("contributors", "too many contributors"))?;
        contributors.push(
            submission_contributor::ActiveModel {
                id: Set(Uuid::new_v4()),
                submission_id: Set(submission.id),
                name: Set(contributor.name.trim().to_string()),
                email: Set(access::normalize_email(&contributor.email)),
                affiliation: Set(contributor.affiliation),
                country: Set(contributor.country),
                role: Set(contributor.role),
                is_primary_contact: Set(contributor.is_primary_contact),
                position: Set(position),
                ..Default::default()
            }
            .insert(&txn)
            .await?,
        );
    }

    let ctx = notifications::context(app, &submission, &submitter, None);
    notifications::queue(app, &txn, NotificationKind::SubmissionReceived, &submitter, &ctx)
        .await?;

    txn.commit().await?;

    info!(submission_id = %submission.id, submitter = %submitter.email, "Submission created");

    Ok(SubmissionDetails {
        submission,
        contributors,
        payment: None,
        loa_available: false,
    })
}

pub async fn list(app: &App, query: &ListQuery) -> ApiResult<SubmissionPage> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, 100);

    let mut select = abstract_submission::Entity::find();
    if let Some(status) = query.status {
        select = select.filter(abstract_submission::Column::Status.eq(status));
    }

    let paginator = select
        .order_by_desc(abstract_submission::Column::CreatedAt)
        .paginate(app.db.as_ref(), per_page);
    let ItemsAndPagesNumber {
        number_of_items,
        number_of_pages,
    } = paginator.num_items_and_pages().await?;
    let items = paginator.fetch_page(page - 1).await?;

    Ok(SubmissionPage {
        items,
        page,
        per_page,
        total: number_of_items,
        total_pages: number_of_pages,
    })
}

pub async fn details(app: &App, id: Uuid) -> ApiResult<SubmissionDetails> {
    let submission = find(app.db.as_ref(), id).await?;
    let contributors = contributors(app.db.as_ref(), id).await?;
    let payment = submission_payment::Entity::find()
        .filter(submission_payment::Column::SubmissionId.eq(id))
        .one(app.db.as_ref())
        .await?;

    Ok(SubmissionDetails {
        loa_available: loa_available(payment.as_ref()),
        submission,
        contributors,
        payment,
    })
}

pub async fn update(
    app: &App,
    id: Uuid,
    request: UpdateSubmissionRequest,
) -> ApiResult<abstract_submission::Model> {
    let txn = app.db.begin().await?;

    let submission = abstract_submission::Entity::find_by_id(id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or(ApiError::NotFound("Submission"))?;

    if !submission.is_editable() {
        return Err(ApiError::InvalidStatusTransition(format!(
            "Submission is {} and can no longer be edited",
            submission.status
        )));
    }

    let mut active: abstract_submission::ActiveModel = submission.into();
    if let Some(title) = request.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(body) = request.abstract_body {
        active.abstract_body = Set(body);
    }
    if let Some(keywords) = request.keywords {
        active.keywords = Set(clean_keywords(&keywords));
    }
    if let Some(presentation_type) = request.presentation_type {
        active.presentation_type = Set(presentation_type);
    }

    let updated = active.update(&txn).await?;
    txn.commit().await?;

    Ok(updated)
}

pub async fn review(
    app: &App,
    id: Uuid,
    request: ReviewRequest,
) -> ApiResult<abstract_submission::Model> {
    let reviewer =
        access::authorize_admin(app.db.as_ref(), &app.config.access, &request.reviewer_email).await?;
    let next = request.decision.submission_status();

    let txn = app.db.begin().await?;

    let submission = abstract_submission::Entity::find_by_id(id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or(ApiError::NotFound("Submission"))?;

    if !submission.status.can_transition_to(next) {
        return Err(ApiError::InvalidStatusTransition(format!(
            "Cannot change status from {} to {next}",
            submission.status
        )));
    }

    let submitter = submitter(&txn, &submission).await?;

    let mut active: abstract_submission::ActiveModel = submission.into();
    active.status = Set(next);
    active.reviewed_by = Set(Some(reviewer.id));
    active.reviewed_at = Set(Some(chrono::Utc::now().naive_utc()));
    active.review_comment = Set(request.comment.clone());
    let submission = active.update(&txn).await?;

    let ctx = notifications::context(app, &submission, &submitter, request.comment);
    match request.decision {
        Decision::Approve => {
            notifications::queue(app, &txn, NotificationKind::Approval, &submitter, &ctx).await?;
            if submission.requires_payment {
                notifications::queue(app, &txn, NotificationKind::PaymentRequest, &submitter, &ctx)
                    .await?;
            }
        }
        Decision::Reject => {
            notifications::queue(app, &txn, NotificationKind::Rejection, &submitter, &ctx).await?;
        }
    }

    txn.commit().await?;

    info!(
        submission_id = %submission.id,
        reviewer = %reviewer.email,
        status = %submission.status,
        "Submission reviewed"
    );

    Ok(submission)
}
