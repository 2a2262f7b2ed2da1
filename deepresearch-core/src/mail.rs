//! Report delivery over SMTP.
//!
//! A `Mailer` trait seam keeps the network out of tests: the pipeline's
//! deliverer stage only sees the trait, production wires in [`SmtpMailer`]
//! (lettre over STARTTLS), and `--no-deliver` runs use [`NoopMailer`].

use crate::config::DeliveryConfig;
use crate::error::MailError;
use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::info;

/// Trait for sending mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Real SMTP mailer using lettre.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Build the mailer from configuration.
    ///
    /// Resolves the SMTP password from the configured environment variable
    /// up front, so a missing credential fails at startup rather than after
    /// the report has been written.
    pub fn new(config: &DeliveryConfig) -> Result<Self, MailError> {
        let password = config
            .password()
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let creds = Credentials::new(config.username.clone(), password);
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| MailError::Transport(format!("SMTP relay error: {}", e)))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let email = lettre::Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| MailError::InvalidAddress(format!("from address: {}", e)))?,
            )
            .to(to
                .parse()
                .map_err(|e| MailError::InvalidAddress(format!("to address: {}", e)))?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// A mailer that logs instead of sending. Used for `--no-deliver` runs.
#[derive(Default)]
pub struct NoopMailer;

impl NoopMailer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        info!(to, subject, bytes = body.len(), "delivery skipped");
        Ok(())
    }
}

/// A recorded outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// A mock mailer recording sent mail, optionally failing.
#[derive(Default)]
pub struct MockMailer {
    sent: std::sync::Mutex<Vec<SentMail>>,
    fail_with: std::sync::Mutex<Option<String>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail with a transport error.
    pub fn failing(message: &str) -> Self {
        let mailer = Self::default();
        *mailer.fail_with.lock().unwrap() = Some(message.to_string());
        mailer
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return Err(MailError::Transport(message));
        }
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
