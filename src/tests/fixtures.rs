//! Model values for `MockDatabase` query results.

use chrono::Utc;
use uuid::Uuid;

use crate::database::models::{
    abstract_submission,
    contributor_role::PresentationType,
    email_notification,
    notification_kind::{DeliveryStatus, NotificationKind},
    payment_status::PaymentStatus,
    submission_payment,
    submission_status::SubmissionStatus,
    user,
    user_role::UserRole,
};

fn now() -> chrono::NaiveDateTime {
    Utc::now().naive_utc()
}

pub fn user(email: &str, role: UserRole) -> user::Model {
    user::Model {
        id: Uuid::new_v4(),
        created_at: now(),
        updated_at: now(),
        email: email.to_string(),
        name: "Test User".to_string(),
        role,
    }
}

pub fn submission(status: SubmissionStatus) -> abstract_submission::Model {
    abstract_submission::Model {
        id: Uuid::new_v4(),
        created_at: now(),
        updated_at: now(),
        user_id: Uuid::new_v4(),
        title: "Ownership Types in Practice".to_string(),
        abstract_body: "We study ownership.".to_string(),
        keywords: serde_json::json!(["rust"]),
        status,
        presentation_type: PresentationType::Oral,
        registration_fee_cents: 10_000,
        currency: "USD".to_string(),
        requires_payment: true,
        reviewed_by: None,
        reviewed_at: None,
        review_comment: None,
    }
}

pub fn payment(submission_id: Uuid, status: PaymentStatus) -> submission_payment::Model {
    submission_payment::Model {
        id: Uuid::new_v4(),
        created_at: now(),
        updated_at: now(),
        submission_id,
        proof_path: format!("payments/{submission_id}/proof.pdf"),
        original_filename: "proof.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        amount_cents: 10_000,
        currency: "USD".to_string(),
        status,
        reviewed_by: None,
        reviewed_at: None,
        review_note: None,
    }
}

pub fn notification(submission_id: Uuid) -> email_notification::Model {
    email_notification::Model {
        id: Uuid::new_v4(),
        created_at: now(),
        updated_at: now(),
        submission_id,
        recipient: "author@example.org".to_string(),
        subject: "[Test Conference] Submission received".to_string(),
        body_text: "Dear author,".to_string(),
        body_html: "<p>Dear author,</p>".to_string(),
        kind: NotificationKind::SubmissionReceived,
        status: DeliveryStatus::Pending,
        retry_count: 0,
        sent_via: None,
        sent_at: None,
        last_error: None,
    }
}
