use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{setup_test, setup_test_with, test_app, TestUtils};

fn submission() -> Value {
    json!({
        "submitter_email": "ada@example.org",
        "submitter_name": "Ada Lovelace",
        "title": "Analytical Engines",
        "abstract_body": "Notes on the engine.",
        "keywords": ["computing"],
        "presentation_type": "poster",
        "contributors": [
            { "name": "Ada Lovelace", "email": "ada@example.org", "role": "author", "is_primary_contact": true }
        ]
    })
}

#[tokio::test]
async fn test_create_requires_allowed_email() {
    let mut app = test_app(DatabaseConnection::Disconnected);
    app.config.access.allow_list = vec!["charles@example.org".to_string()];
    let t = setup_test_with(app);
    let (name, value) = TestUtils::api_key();

    let response = t
        .server
        .post("/api/submissions")
        .add_header(name, value)
        .json(&submission())
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "EMAIL_NOT_ALLOWED");
}

#[tokio::test]
async fn test_create_requires_single_primary_contact() {
    let t = setup_test();
    let (name, value) = TestUtils::api_key();
    let mut request = submission();
    request["contributors"] = json!([
        { "name": "Ada Lovelace", "email": "ada@example.org", "role": "author", "is_primary_contact": true },
        { "name": "Charles Babbage", "email": "charles@example.org", "role": "co_author", "is_primary_contact": true }
    ]);

    let response = t
        .server
        .post("/api/submissions")
        .add_header(name, value)
        .json(&request)
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_list_rejects_large_pages() {
    let t = setup_test();
    let (name, value) = TestUtils::api_key();

    let response = t
        .server
        .get("/api/submissions")
        .add_query_param("per_page", 500)
        .add_header(name, value)
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert!(body["errors"]["per_page"].is_array());
}

#[tokio::test]
async fn test_payment_upload_requires_proof() {
    let t = setup_test();
    let (name, value) = TestUtils::api_key();
    let form = MultipartForm::new().add_text("amount_cents", "10000");

    let response = t
        .server
        .post(&format!("/api/submissions/{}/payment", Uuid::new_v4()))
        .add_header(name, value)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert!(body["errors"]["proof"].is_array());
}

#[tokio::test]
async fn test_payment_upload_rejects_unknown_file_type() {
    let t = setup_test();
    let (name, value) = TestUtils::api_key();
    let form = MultipartForm::new()
        .add_text("amount_cents", "10000")
        .add_part(
            "proof",
            Part::bytes(b"just some text".to_vec())
                .file_name("receipt.txt")
                .mime_type("text/plain"),
        );

    let response = t
        .server
        .post(&format!("/api/submissions/{}/payment", Uuid::new_v4()))
        .add_header(name, value)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "INVALID_UPLOAD");
}

#[tokio::test]
async fn test_show_hides_database_errors() {
    let t = setup_test();
    let (name, value) = TestUtils::api_key();

    let response = t
        .server
        .get(&format!("/api/submissions/{}", Uuid::new_v4()))
        .add_header(name, value)
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["message"], "An internal error occurred");
}
