//! Completion notice by email.
//!
//! One fixed message per run, submitted over implicit TLS (SMTPS, port 465)
//! and authenticated with the sender's app password. Failures are logged and
//! never propagate.

use crate::models::EmailMessage;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::error::Error;
use tracing::{error, info, instrument};

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 465;

/// Sends an [`EmailMessage`].
pub trait Mailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), Box<dyn Error>>;
}

/// SMTPS submission via lettre.
#[derive(Clone)]
pub struct SmtpMailer {
    host: String,
    port: u16,
    password: Option<String>,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl SmtpMailer {
    pub fn new(host: impl Into<String>, port: u16, password: Option<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password,
        }
    }
}

/// Build the MIME message, validating both addresses.
pub fn build_message(message: &EmailMessage) -> Result<Message, Box<dyn Error>> {
    let from: Mailbox = message.from.as_deref().ok_or("missing sender address")?.parse()?;
    let to: Mailbox = message.to.as_deref().ok_or("missing recipient address")?.parse()?;

    Ok(Message::builder()
        .from(from)
        .to(to)
        .subject(message.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())?)
}

impl Mailer for SmtpMailer {
    #[instrument(level = "info", skip_all, fields(host = %self.host, port = self.port))]
    async fn send(&self, message: &EmailMessage) -> Result<(), Box<dyn Error>> {
        let email = build_message(message)?;
        let username = message.from.clone().unwrap_or_default();
        let password = self.password.clone().ok_or("missing email app password")?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)?
            .port(self.port)
            .credentials(Credentials::new(username, password))
            .build();

        transport.send(email).await?;
        Ok(())
    }
}

/// Send the notice, logging the outcome. Returns whether it was sent.
#[instrument(level = "info", skip_all)]
pub async fn notify<M: Mailer>(mailer: &M, message: &EmailMessage) -> bool {
    match mailer.send(message).await {
        Ok(()) => {
            info!(to = ?message.to, "Weekly email report sent successfully");
            true
        }
        Err(e) => {
            error!(error = %e, "Failed to send email report");
            false
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingMailer;
    use super::*;

    fn report() -> EmailMessage {
        EmailMessage::weekly_report(Some("bot@example.com".into()), Some("me@example.com".into()))
    }

    #[test]
    fn test_build_message_uses_fixed_subject() {
        let message = build_message(&report()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("From: bot@example.com"));
        assert!(raw.contains("To: me@example.com"));
        assert!(raw.contains("Content-Type: text/plain"));
    }

    #[test]
    fn test_build_message_requires_addresses() {
        let message = EmailMessage::weekly_report(None, Some("me@example.com".into()));
        assert!(build_message(&message).is_err());

        let message = EmailMessage::weekly_report(Some("not an address".into()), Some("me@example.com".into()));
        assert!(build_message(&message).is_err());
    }

    #[tokio::test]
    async fn test_smtp_mailer_without_password_fails() {
        let mailer = SmtpMailer::new(DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT, None);
        let err = mailer.send(&report()).await.unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[tokio::test]
    async fn test_notify_swallows_failures() {
        let mailer = RecordingMailer {
            fail: true,
            ..Default::default()
        };
        assert!(!notify(&mailer, &report()).await);
        assert_eq!(mailer.attempts.borrow().len(), 1);
    }
}
