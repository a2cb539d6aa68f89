use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    Message,
};
use thiserror::Error;
use uuid::Uuid;

use crate::{app::App, jobs::JobError};

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(#[from] lettre::address::AddressError),
    #[error("Failed to build email: {0}")]
    BuilderError(#[from] lettre::error::Error),
    #[error("Failed to send email: {0}")]
    TransportError(#[from] lettre::transport::smtp::Error),
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),
    #[error("Email has neither a text nor an html body")]
    EmptyBody,
    #[error("Mailer error: {0}")]
    MailerError(String),
}

impl From<EmailError> for JobError {
    fn from(error: EmailError) -> Self {
        match error {
            EmailError::InvalidRecipient(e) => Self::FailPermanently(e.to_string()),
            e @ (EmailError::InvalidContentType(_) | EmailError::EmptyBody) => {
                Self::FailPermanently(e.to_string())
            }
            EmailError::BuilderError(e) => Self::TryAgainLater(e.to_string()),
            EmailError::TransportError(e) => Self::TryAgainLater(e.to_string()),
            EmailError::MailerError(e) => Self::TryAgainLater(e),
        }
    }
}

/// A file attached to an outgoing message.
#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Everything needed to assemble one message, independent of the transport.
#[derive(Debug, Clone, Default)]
pub struct OutgoingEmail {
    pub to: Vec<Mailbox>,
    pub cc: Vec<Mailbox>,
    pub bcc: Vec<Mailbox>,
    pub reply_to: Option<Mailbox>,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<EmailAttachment>,
}

impl OutgoingEmail {
    /// A single-recipient message with both a text and an html body.
    pub fn to_one(
        recipient: &str,
        subject: impl Into<String>,
        text: String,
        html: String,
    ) -> Result<Self, EmailError> {
        Ok(Self {
            to: vec![recipient.parse()?],
            subject: subject.into(),
            text: Some(text),
            html: Some(html),
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_attachment(mut self, attachment: EmailAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn recipient_count(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }

    /// Assembles the MIME message: text/html alternatives, wrapped in a mixed
    /// part when there are attachments.
    pub fn build(self, sender: Mailbox, message_id: &str) -> Result<Message, EmailError> {
        let mut builder = Message::builder()
            .from(sender)
            .subject(self.subject)
            .message_id(Some(message_id.to_string()));

        for mailbox in self.to {
            builder = builder.to(mailbox);
        }
        for mailbox in self.cc {
            builder = builder.cc(mailbox);
        }
        for mailbox in self.bcc {
            builder = builder.bcc(mailbox);
        }
        if let Some(reply_to) = self.reply_to {
            builder = builder.reply_to(reply_to);
        }

        let body = match (self.text, self.html) {
            (Some(text), Some(html)) => Body::Multi(MultiPart::alternative_plain_html(text, html)),
            (Some(text), None) => Body::Single(SinglePart::plain(text)),
            (None, Some(html)) => Body::Single(SinglePart::html(html)),
            (None, None) => return Err(EmailError::EmptyBody),
        };

        if self.attachments.is_empty() {
            return Ok(match body {
                Body::Single(part) => builder.singlepart(part)?,
                Body::Multi(part) => builder.multipart(part)?,
            });
        }

        let mut mixed = match body {
            Body::Single(part) => MultiPart::mixed().singlepart(part),
            Body::Multi(part) => MultiPart::mixed().multipart(part),
        };
        for attachment in self.attachments {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|_| EmailError::InvalidContentType(attachment.content_type.clone()))?;
            mixed = mixed.singlepart(Attachment::new(attachment.filename).body(attachment.data, content_type));
        }

        Ok(builder.multipart(mixed)?)
    }
}

enum Body {
    Single(SinglePart),
    Multi(MultiPart),
}

/// A globally unique Message-ID in the sender's domain, angle brackets included.
pub fn generate_message_id(sender: &Mailbox) -> String {
    format!("<{}@{}>", Uuid::new_v4(), sender.email.domain())
}

/// Builds and sends `email` with the configured sender, returning its Message-ID.
pub async fn send_email(
    app: &App,
    email: OutgoingEmail,
    message_id: Option<String>,
) -> Result<String, EmailError> {
    let sender = app.config.email.sender();
    let message_id = message_id.unwrap_or_else(|| generate_message_id(&sender));

    let message = email.build(sender, &message_id)?;
    app.mailer.send(message).await?;

    Ok(message_id)
}
