use std::collections::HashSet;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use lettre::message::{header::ContentType, Mailbox};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateEmail, ValidationError};

use crate::emails::{EmailAttachment, EmailError, OutgoingEmail};

pub const MAX_TOTAL_RECIPIENTS: usize = 100;
pub const MAX_BODY_BYTES: usize = 1024 * 1024;
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_TOTAL_ATTACHMENT_BYTES: usize = 25 * 1024 * 1024;

/// Body of `POST /api/email/send` and `POST /api/email/queue`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_request"))]
pub struct SendEmailRequest {
    #[validate(
        length(min = 1, max = 50, message = "must contain between 1 and 50 addresses"),
        custom(function = "validate_addresses")
    )]
    pub to: Vec<String>,
    #[serde(default)]
    #[validate(
        length(max = 50, message = "must contain at most 50 addresses"),
        custom(function = "validate_addresses")
    )]
    pub cc: Vec<String>,
    #[serde(default)]
    #[validate(
        length(max = 50, message = "must contain at most 50 addresses"),
        custom(function = "validate_addresses")
    )]
    pub bcc: Vec<String>,
    #[serde(default)]
    #[validate(email(message = "must be a valid email address"))]
    pub reply_to: Option<String>,
    #[validate(
        length(min = 1, max = 255, message = "must be between 1 and 255 characters"),
        custom(function = "validate_subject")
    )]
    pub subject: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    #[validate(length(max = 10, message = "at most 10 attachments are allowed"), nested)]
    pub attachments: Vec<AttachmentRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_content_type"))]
pub struct AttachmentRequest {
    #[validate(
        length(min = 1, max = 255, message = "must be between 1 and 255 characters"),
        custom(function = "validate_filename")
    )]
    pub filename: String,
    /// Base64 encoded file content
    #[validate(custom(function = "validate_content"))]
    pub content: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

fn error(code: &'static str, message: String) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

fn validate_addresses(addresses: &[String]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();

    for address in addresses {
        if !address.validate_email() {
            return Err(error("email", format!("'{address}' is not a valid email address")));
        }
        if !seen.insert(address.to_lowercase()) {
            return Err(error("duplicate", format!("'{address}' is listed more than once")));
        }
    }

    Ok(())
}

fn validate_subject(subject: &str) -> Result<(), ValidationError> {
    if subject.contains(['\r', '\n']) {
        return Err(error("line_break", "must not contain line breaks".to_string()));
    }
    Ok(())
}

fn validate_filename(filename: &str) -> Result<(), ValidationError> {
    if filename.contains(['/', '\\']) || filename == "." || filename == ".." {
        return Err(error(
            "path_separator",
            "must be a plain file name without path separators".to_string(),
        ));
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<(), ValidationError> {
    let size = decoded_len(content)
        .ok_or_else(|| error("base64", "must be valid base64".to_string()))?;

    if size == 0 {
        return Err(error("empty", "must not be empty".to_string()));
    }
    if size > MAX_ATTACHMENT_BYTES {
        return Err(error("size", "must decode to at most 10 MiB".to_string()));
    }
    Ok(())
}

fn validate_content_type(attachment: &AttachmentRequest) -> Result<(), ValidationError> {
    match &attachment.content_type {
        Some(content_type) if ContentType::parse(content_type).is_err() => Err(error(
            "content_type",
            format!("'{content_type}' is not a valid MIME type"),
        )),
        _ => Ok(()),
    }
}

/// Checks that involve more than one field.
fn validate_request(request: &SendEmailRequest) -> Result<(), ValidationError> {
    if request.recipient_count() > MAX_TOTAL_RECIPIENTS {
        return Err(error(
            "recipients",
            format!("at most {MAX_TOTAL_RECIPIENTS} recipients are allowed across to, cc and bcc"),
        ));
    }

    let mut seen = HashSet::new();
    for address in request.to.iter().chain(&request.cc).chain(&request.bcc) {
        if !seen.insert(address.to_lowercase()) {
            return Err(error(
                "duplicate",
                format!("'{address}' appears in more than one recipient list"),
            ));
        }
    }

    match (&request.text, &request.html) {
        (None, None) => {
            return Err(error("body", "either text or html is required".to_string()));
        }
        (text, html) => {
            let too_large = |body: &Option<String>| body.as_ref().is_some_and(|b| b.len() > MAX_BODY_BYTES);
            if too_large(text) || too_large(html) {
                return Err(error("body", "text and html must each be at most 1 MiB".to_string()));
            }
        }
    }

    let total: usize = request
        .attachments
        .iter()
        .filter_map(|attachment| decoded_len(&attachment.content))
        .sum();
    if total > MAX_TOTAL_ATTACHMENT_BYTES {
        return Err(error(
            "attachments",
            "attachments must total at most 25 MiB".to_string(),
        ));
    }

    Ok(())
}

fn decoded_len(content: &str) -> Option<usize> {
    STANDARD.decode(content.trim()).ok().map(|bytes| bytes.len())
}

impl SendEmailRequest {
    pub fn recipient_count(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }

    /// The `{to, cc, bcc}` object stored on the audit row.
    pub fn recipients_json(&self) -> serde_json::Value {
        serde_json::json!({ "to": self.to, "cc": self.cc, "bcc": self.bcc })
    }

    /// Decodes attachments and parses addresses. Expects a validated request.
    pub fn to_outgoing(&self) -> Result<OutgoingEmail, EmailError> {
        let parse_all = |addresses: &[String]| {
            addresses
                .iter()
                .map(|address| address.parse::<Mailbox>())
                .collect::<Result<Vec<_>, _>>()
        };

        let attachments = self
            .attachments
            .iter()
            .map(AttachmentRequest::decode)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OutgoingEmail {
            to: parse_all(&self.to)?,
            cc: parse_all(&self.cc)?,
            bcc: parse_all(&self.bcc)?,
            reply_to: self.reply_to.as_deref().map(str::parse).transpose()?,
            subject: self.subject.clone(),
            text: self.text.clone(),
            html: self.html.clone(),
            attachments,
        })
    }
}

impl AttachmentRequest {
    fn decode(&self) -> Result<EmailAttachment, EmailError> {
        let data = STANDARD
            .decode(self.content.trim())
            .map_err(|e| EmailError::MailerError(format!("Invalid attachment content: {e}")))?;

        let content_type = self.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&self.filename)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

        Ok(EmailAttachment {
            filename: self.filename.clone(),
            content_type,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::api::api_error::field_messages;

    fn request(value: serde_json::Value) -> SendEmailRequest {
        serde_json::from_value(value).expect("request deserializes")
    }

    fn errors_of(request: &SendEmailRequest) -> BTreeMap<String, Vec<String>> {
        request
            .validate()
            .map_err(|e| field_messages(&e))
            .expect_err("validation fails")
    }

    fn valid() -> serde_json::Value {
        json!({
            "to": ["author@example.org"],
            "subject": "Your abstract",
            "text": "Thank you"
        })
    }

    #[test]
    fn test_minimal_request_is_valid() {
        assert!(request(valid()).validate().is_ok());
    }

    #[test]
    fn test_requires_a_recipient() {
        let mut value = valid();
        value["to"] = json!([]);

        assert!(errors_of(&request(value)).contains_key("to"));
    }

    #[test]
    fn test_rejects_invalid_address() {
        let mut value = valid();
        value["cc"] = json!(["not-an-email"]);

        let errors = errors_of(&request(value));

        assert_eq!(errors["cc"], vec!["'not-an-email' is not a valid email address"]);
    }

    #[test]
    fn test_duplicates_within_a_field_ignore_case() {
        let mut value = valid();
        value["to"] = json!(["a@example.org", "A@Example.org"]);

        assert!(errors_of(&request(value)).contains_key("to"));
    }

    #[test]
    fn test_duplicates_across_fields() {
        let mut value = valid();
        value["bcc"] = json!(["Author@example.org"]);

        let errors = errors_of(&request(value));

        assert!(errors["__all__"][0].contains("more than one recipient list"));
    }

    #[test]
    fn test_total_recipient_limit() {
        let addresses = |prefix: &str| {
            (0..50)
                .map(|i| format!("{prefix}{i}@example.org"))
                .collect::<Vec<_>>()
        };
        let mut value = valid();
        value["to"] = json!(addresses("to"));
        value["cc"] = json!(addresses("cc"));
        value["bcc"] = json!(["one-more@example.org"]);

        let errors = errors_of(&request(value));

        assert!(errors["__all__"][0].contains("at most 100 recipients"));
    }

    #[test]
    fn test_subject_rejects_line_breaks() {
        let mut value = valid();
        value["subject"] = json!("Hello\r\nBcc: victim@example.org");

        assert!(errors_of(&request(value)).contains_key("subject"));
    }

    #[test]
    fn test_subject_length() {
        let mut value = valid();
        value["subject"] = json!("x".repeat(256));

        assert!(errors_of(&request(value)).contains_key("subject"));
    }

    #[test]
    fn test_requires_a_body() {
        let request = request(json!({ "to": ["a@example.org"], "subject": "Hi" }));

        assert_eq!(
            errors_of(&request)["__all__"],
            vec!["either text or html is required"]
        );
    }

    #[test]
    fn test_body_size_limit() {
        let mut value = valid();
        value["html"] = json!("x".repeat(MAX_BODY_BYTES + 1));

        assert!(errors_of(&request(value)).contains_key("__all__"));
    }

    #[test]
    fn test_attachment_rules() {
        let mut value = valid();
        value["attachments"] = json!([
            { "filename": "ok.txt", "content": STANDARD.encode("hello") },
            { "filename": "../etc/passwd", "content": STANDARD.encode("x") },
            { "filename": "bad.bin", "content": "***not base64***" },
            { "filename": "empty.txt", "content": "" },
            { "filename": "weird.txt", "content": STANDARD.encode("x"), "content_type": "not a mime" }
        ]);

        let errors = errors_of(&request(value));

        assert!(!errors.keys().any(|key| key.starts_with("attachments[0]")));
        assert!(errors.contains_key("attachments[1].filename"));
        assert!(errors.contains_key("attachments[2].content"));
        assert!(errors.contains_key("attachments[3].content"));
        assert!(errors.contains_key("attachments[4].__all__"));
    }

    fn attachment_of(size: usize) -> serde_json::Value {
        json!({ "filename": "poster.bin", "content": STANDARD.encode(vec![0_u8; size]) })
    }

    #[test]
    fn test_attachment_size_limit() {
        let mut value = valid();
        value["attachments"] = json!([attachment_of(MAX_ATTACHMENT_BYTES)]);
        assert!(request(value).validate().is_ok());

        let mut value = valid();
        value["attachments"] = json!([attachment_of(MAX_ATTACHMENT_BYTES + 1)]);
        let errors = errors_of(&request(value));

        assert_eq!(
            errors["attachments[0].content"],
            vec!["must decode to at most 10 MiB"]
        );
    }

    #[test]
    fn test_total_attachment_limit() {
        let nine_mib = 9 * 1024 * 1024;
        let mut value = valid();
        value["attachments"] = json!(vec![attachment_of(nine_mib); 3]);

        let errors = errors_of(&request(value));

        assert!(!errors.keys().any(|key| key.starts_with("attachments[")));
        assert_eq!(errors["__all__"], vec!["attachments must total at most 25 MiB"]);
    }

    #[test]
    fn test_too_many_attachments() {
        let attachment = json!({ "filename": "a.txt", "content": STANDARD.encode("a") });
        let mut value = valid();
        value["attachments"] = json!(vec![attachment; 11]);

        assert!(errors_of(&request(value)).contains_key("attachments"));
    }

    #[test]
    fn test_to_outgoing_guesses_content_type() {
        let mut value = valid();
        value["attachments"] = json!([
            { "filename": "program.pdf", "content": STANDARD.encode("%PDF") },
            { "filename": "notes", "content": STANDARD.encode("n"), "content_type": "text/markdown" }
        ]);
        let request = request(value);

        let outgoing = request.to_outgoing().expect("converts");

        assert_eq!(outgoing.attachments[0].content_type, "application/pdf");
        assert_eq!(outgoing.attachments[0].data, b"%PDF");
        assert_eq!(outgoing.attachments[1].content_type, "text/markdown");
        assert_eq!(outgoing.recipient_count(), 1);
    }
}
