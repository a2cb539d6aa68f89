use std::{
    fmt::{self, Debug},
    sync::{Arc, Mutex, PoisonError},
};

use lettre::{
    transport::smtp::authentication::Credentials, AsyncSmtpTransport, AsyncTransport, Message,
    Tokio1Executor,
};

use crate::{config::EmailConfig, emails::EmailError};

/// Mock transport that captures sent emails for testing.
///
/// It can also be told to refuse messages, which lets tests drive the retry paths.
#[derive(Clone, Default)]
pub struct MockTransport {
    messages: Arc<Mutex<Vec<Message>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn send(&self, message: Message) -> Result<(), EmailError> {
        if let Some(reason) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(EmailError::MailerError(reason));
        }

        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        Ok(())
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Makes every following send fail with `reason`; `None` restores delivery.
    pub fn set_failure(&self, reason: Option<&str>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = reason.map(str::to_string);
    }
}

/// Mailer that can be either a real SMTP transport or a mock for testing.
#[derive(Clone)]
pub enum Mailer {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    Mock(MockTransport),
}

impl Debug for Mailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Smtp(_) => f.debug_tuple("Mailer::Smtp").finish(),
            Self::Mock(_) => f.debug_tuple("Mailer::Mock").finish(),
        }
    }
}

impl Mailer {
    pub fn mock() -> Self {
        Self::Mock(MockTransport::new())
    }

    pub fn smtp(transport: AsyncSmtpTransport<Tokio1Executor>) -> Self {
        Self::Smtp(transport)
    }

    /// Builds the transport described by the `email` configuration section.
    pub fn from_config(config: &EmailConfig) -> Result<Self, EmailError> {
        match config {
            EmailConfig::Mock => Ok(Self::mock()),
            EmailConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
                ..
            } => {
                let mut builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::relay(host)?.port(*port)
                } else {
                    AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(*port)
                };

                if let (Some(username), Some(password)) = (username, password) {
                    builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
                }

                Ok(Self::smtp(builder.build()))
            }
        }
    }

    /// Name recorded as `sent_via` on delivered notifications.
    pub const fn channel(&self) -> &'static str {
        match self {
            Self::Smtp(_) => "smtp",
            Self::Mock(_) => "mock",
        }
    }

    pub async fn send(&self, message: Message) -> Result<(), EmailError> {
        match self {
            Self::Smtp(transport) => {
                transport.send(message).await?;
                Ok(())
            }
            Self::Mock(mock) => mock.send(message),
        }
    }

    /// Get sent emails (only available for mock mailer)
    pub fn messages(&self) -> Option<Vec<Message>> {
        match self {
            Self::Mock(transport) => Some(transport.messages()),
            Self::Smtp(_) => None,
        }
    }

    pub fn clear_messages(&self) {
        if let Self::Mock(transport) = self {
            transport.clear();
        }
    }

    /// The mock transport, when this mailer is one.
    pub const fn as_mock(&self) -> Option<&MockTransport> {
        match self {
            Self::Mock(transport) => Some(transport),
            Self::Smtp(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> Message {
        Message::builder()
            .from("noreply@example.org".parse().expect("valid sender"))
            .to("author@example.org".parse().expect("valid recipient"))
            .subject("Hello")
            .body("Body".to_string())
            .expect("valid message")
    }

    #[tokio::test]
    async fn test_mock_captures_messages() {
        let mailer = Mailer::mock();

        mailer.send(message()).await.expect("mock accepts");

        assert_eq!(mailer.messages().map(|m| m.len()), Some(1));
        assert_eq!(mailer.channel(), "mock");
    }

    #[tokio::test]
    async fn test_mock_failure_is_reported() {
        let mailer = Mailer::mock();
        mailer
            .as_mock()
            .expect("mock mailer")
            .set_failure(Some("connection refused"));

        let error = mailer.send(message()).await.expect_err("mock refuses");

        assert!(matches!(error, EmailError::MailerError(reason) if reason == "connection refused"));
        assert_eq!(mailer.messages().map(|m| m.len()), Some(0));
    }
}
