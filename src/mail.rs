//! Outgoing account emails (verification and password reset links).
//!
//! Messages are plain text; the link is the only content that matters.
//! [`SmtpMailer`] delivers through the configured relay, [`DisabledMailer`]
//! stands in when no credentials are set.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::SmtpConfig;

/// Upper bound on one SMTP exchange, so a stuck relay cannot hold a request.
const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail delivery is not configured")]
    NotConfigured,
    #[error("invalid email address {0}")]
    InvalidAddress(String),
    #[error("mail transport setup failed: {0}")]
    Transport(String),
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// The mailer for a relay configuration: SMTP when credentials are present,
/// otherwise one that reports every send as not configured.
pub fn mailer_for(smtp: Option<&SmtpConfig>) -> Arc<dyn Mailer> {
    let Some(smtp) = smtp else {
        log::warn!("EMAIL_USER/EMAIL_PASSWORD not set, outgoing mail is disabled");
        return Arc::new(DisabledMailer);
    };

    match SmtpMailer::new(smtp) {
        Ok(mailer) => {
            log::info!("Using SMTP relay {}:{} as {}", smtp.host, smtp.port, smtp.from);
            Arc::new(mailer)
        }
        Err(e) => {
            log::error!("SMTP relay unusable, outgoing mail is disabled: {}", e);
            Arc::new(DisabledMailer)
        }
    }
}

/// Sends through an SMTP relay with STARTTLS and login credentials.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from = parse_mailbox(&config.from)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self { transport, from })
    }

    fn message(&self, to: &str, subject: &str, body: &str) -> Result<Message, MailError> {
        Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(to)?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| MailError::Delivery(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let message = self.message(to, subject, body)?;
        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| MailError::Delivery(e.to_string()))?;
        log::info!("mail to {} accepted by relay ({})", to, response.code());
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .parse()
        .map_err(|_| MailError::InvalidAddress(address.to_string()))
}

/// Writes every message to the log instead of an SMTP relay.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        log::info!("mail to {} | {} | {}", to, subject, body);
        Ok(())
    }
}

/// Used when no relay credentials are configured; every send fails.
#[derive(Debug, Default, Clone)]
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, to: &str, _subject: &str, _body: &str) -> Result<(), MailError> {
        log::warn!("email credentials not configured, mail to {} not sent", to);
        Err(MailError::NotConfigured)
    }
}

pub fn verification_link(frontend_url: &str, token: &str) -> String {
    format!("{}/verify-email?token={}", frontend_url.trim_end_matches('/'), token)
}

pub fn reset_link(frontend_url: &str, token: &str) -> String {
    format!("{}/reset-password?token={}", frontend_url.trim_end_matches('/'), token)
}

pub fn verification_body(name: &str, link: &str) -> String {
    format!(
        "Hi {},\n\nPlease verify your email address by opening this link:\n{}\n\n\
         This link will expire in 24 hours.",
        name, link
    )
}

pub fn reset_body(name: &str, link: &str) -> String {
    format!(
        "Hi {},\n\nYou requested to reset your password. Set a new one here:\n{}\n\n\
         This link will expire in 1 hour. If you didn't request a password reset, \
         please ignore this email.",
        name, link
    )
}
