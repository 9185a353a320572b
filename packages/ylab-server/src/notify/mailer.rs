use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::SmtpConfig;

/// One outgoing HTML email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid address '{0}'")]
    Address(String),
    #[error("Failed to build message: {0}")]
    Build(String),
    #[error("SMTP transport error: {0}")]
    Transport(String),
}

/// Delivery backend for queued emails
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;

    fn name(&self) -> &'static str;
}

/// Delivers through an SMTP relay using STARTTLS
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(config.user.clone(), config.password.clone()))
            .build();

        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.from.parse().map_err(|_| MailError::Address(self.from.clone()))?)
            .to(message.to.parse().map_err(|_| MailError::Address(message.to.clone()))?)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone())
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

/// Used when SMTP credentials are not configured. Logs and drops.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        info!(
            "Email delivery disabled, skipping '{}' to {}",
            message.subject, message.to
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: "Achat confirmé".to_string(),
            html_body: "<p>ok</p>".to_string(),
        }
    }

    #[test]
    fn test_disabled_mailer_accepts_everything() {
        let mailer = DisabledMailer;
        tokio_test::assert_ok!(tokio_test::block_on(mailer.send(&message("team@ylab.fr"))));
        assert_eq!(mailer.name(), "disabled");
    }

    #[tokio::test]
    async fn test_smtp_mailer_rejects_bad_sender() {
        let config = SmtpConfig {
            host: "localhost".to_string(),
            port: 2525,
            user: "user".to_string(),
            password: "pass".to_string(),
            from: "not an address".to_string(),
        };
        let mailer = SmtpMailer::new(&config).unwrap();

        let err = mailer.send(&message("team@ylab.fr")).await.unwrap_err();
        assert!(matches!(err, MailError::Address(addr) if addr == "not an address"));
    }
}
