use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};

use super::{setup_test, setup_test_with, test_app, TestUtils};
use crate::monitoring::{checks::DATABASE, CheckStatus};

fn email() -> Value {
    json!({
        "to": ["author@example.org"],
        "cc": ["chair@example.org"],
        "subject": "Programme update",
        "text": "The programme has been published.",
        "html": "<p>The programme has been published.</p>"
    })
}

#[tokio::test]
async fn test_send_delivers_through_mailer() {
    let t = setup_test();
    let (name, value) = TestUtils::api_key();

    let response = t
        .server
        .post("/api/email/send")
        .add_header(name, value)
        .json(&email())
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "sent");
    assert_eq!(body["recipients"], 2);
    assert!(body["message_id"].as_str().is_some_and(|id| id.starts_with('<')));

    let messages = t.mailer.messages().unwrap_or_default();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].envelope().to().len(), 2);
}

#[tokio::test]
async fn test_send_reports_transport_failure() {
    let t = setup_test();
    if let Some(mock) = t.mailer.as_mock() {
        mock.set_failure(Some("relay refused"));
    }
    let (name, value) = TestUtils::api_key();

    let response = t
        .server
        .post("/api/email/send")
        .add_header(name, value)
        .json(&email())
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "EMAIL_SEND_FAILED");
    assert!(body["message_id"].is_string());
}

#[tokio::test]
async fn test_send_rejects_invalid_request() {
    let t = setup_test();
    let (name, value) = TestUtils::api_key();
    let mut request = email();
    request["to"] = json!(["not-an-address"]);
    request["subject"] = json!("");

    let response = t
        .server
        .post("/api/email/send")
        .add_header(name, value)
        .json(&request)
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
    assert!(body["errors"]["to"].is_array());
    assert!(body["errors"]["subject"].is_array());
    assert!(t.mailer.messages().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_send_rejects_malformed_json() {
    let t = setup_test();
    let (name, value) = TestUtils::api_key();

    let response = t
        .server
        .post("/api/email/send")
        .add_header(name, value)
        .content_type("application/json")
        .bytes("{\"to\": [".into())
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "INVALID_JSON");
}

#[tokio::test]
async fn test_send_reports_oversized_body_as_validation_error() {
    let mut app = test_app(DatabaseConnection::Disconnected);
    app.config.email_api.max_request_bytes = 4 * 1024;
    let t = setup_test_with(app);
    let (name, value) = TestUtils::api_key();
    let mut request = email();
    request["attachments"] =
        json!([{ "filename": "slides.pdf", "content": STANDARD.encode(vec![7_u8; 8 * 1024]) }]);

    let response = t
        .server
        .post("/api/email/send")
        .add_header(name, value)
        .json(&request)
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
    assert!(body["errors"]["attachments"][0]
        .as_str()
        .is_some_and(|message| message.contains("25 MiB")));
    assert!(t.mailer.messages().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_queue_enqueues_send_job() {
    let t = setup_test();
    let (name, value) = TestUtils::api_key();

    let response = t
        .server
        .post("/api/email/queue")
        .add_header(name, value)
        .json(&email())
        .await;

    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["status"], "queued");

    let jobs = t.job_queue.enqueued_jobs_of_type("send_email").unwrap_or_default();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].arguments["message_id"], body["message_id"]);
    assert!(t.mailer.messages().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_statistics_rejects_out_of_range_days() {
    let t = setup_test();
    let (name, value) = TestUtils::api_key();

    let response = t
        .server
        .get("/api/email/statistics")
        .add_query_param("days", 91)
        .add_header(name, value)
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert!(body["errors"]["days"].is_array());
}

#[tokio::test]
async fn test_statistics_hides_database_errors() {
    let t = setup_test();
    let (name, value) = TestUtils::api_key();

    let response = t
        .server
        .get("/api/email/statistics")
        .add_header(name, value)
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "INTERNAL_ERROR");
    assert_eq!(body["message"], "An internal error occurred");
}

#[tokio::test]
async fn test_health_reports_database_and_caches() {
    let t = setup_test();

    let first: Value = {
        let (name, value) = TestUtils::api_key();
        t.server
            .get("/api/email/health")
            .add_header(name, value)
            .await
            .json()
    };
    let second: Value = {
        let (name, value) = TestUtils::api_key();
        t.server
            .get("/api/email/health")
            .add_header(name, value)
            .await
            .json()
    };

    let database = first["checks"]
        .as_array()
        .and_then(|checks| checks.iter().find(|check| check["name"] == DATABASE))
        .cloned()
        .unwrap_or_default();
    assert_eq!(database["status"], json!(CheckStatus::Critical));
    assert_eq!(first["cached"], false);
    assert_eq!(second["cached"], true);
    assert_eq!(first["checked_at"], second["checked_at"]);
}
