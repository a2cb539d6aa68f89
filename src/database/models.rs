pub mod attempt_outcome;
pub mod abstract_submission;
pub mod contributor_role;
pub mod email_log;
pub mod email_notification;
pub mod job;
pub mod job_execution;
pub mod job_status;
pub mod notification_kind;
pub mod payment_status;
pub mod submission_contributor;
pub mod submission_payment;
pub mod submission_status;
pub mod user;
pub mod user_role;
