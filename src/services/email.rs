// src/services/email.rs

//! Email channel over SMTP.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::{AppError, Result};
use crate::models::EmailConfig;

/// A rendered email with HTML and plain-text alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Delivers rendered emails.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage, recipients: &[String]) -> Result<()>;
}

/// SMTP delivery using the configured relay and credentials.
pub struct SmtpSender {
    config: EmailConfig,
}

impl SmtpSender {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Recipients from the configuration.
    pub fn recipients(&self) -> Vec<String> {
        self.config.recipients()
    }

    fn build_message(&self, message: &EmailMessage, recipients: &[String]) -> Result<Message> {
        let from_addr: Address = self
            .config
            .from
            .parse()
            .map_err(|e| AppError::email(format!("invalid sender '{}': {e}", self.config.from)))?;
        let from_name = Some(self.config.from_name.clone()).filter(|n| !n.trim().is_empty());

        let mut builder = Message::builder()
            .from(Mailbox::new(from_name, from_addr))
            .subject(message.subject.as_str());

        for recipient in recipients {
            let mailbox: Mailbox = recipient
                .parse()
                .map_err(|e| AppError::email(format!("invalid recipient '{recipient}': {e}")))?;
            builder = builder.to(mailbox);
        }

        if !self.config.reply_to.trim().is_empty() {
            let reply_to: Mailbox = self.config.reply_to.parse().map_err(|e| {
                AppError::email(format!("invalid reply-to '{}': {e}", self.config.reply_to))
            })?;
            builder = builder.reply_to(reply_to);
        }

        builder
            .multipart(MultiPart::alternative_plain_html(
                message.text_body.clone(),
                message.html_body.clone(),
            ))
            .map_err(AppError::email)
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let host = self.config.smtp_host.as_str();
        let builder = if self.config.smtp_ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host).map_err(AppError::email)?
        } else if self.config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host).map_err(AppError::email)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };

        Ok(builder
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                self.config.smtp_user.clone(),
                self.config.smtp_pass.clone(),
            ))
            .timeout(Some(Duration::from_secs(self.config.timeout_secs)))
            .build())
    }
}

#[async_trait]
impl EmailSender for SmtpSender {
    async fn send(&self, message: &EmailMessage, recipients: &[String]) -> Result<()> {
        if !self.config.is_valid() {
            return Err(AppError::email(
                "incomplete SMTP configuration (check SMTP_* and EMAIL_* settings)",
            ));
        }
        if recipients.is_empty() {
            return Err(AppError::email("no valid recipients"));
        }

        let email = self.build_message(message, recipients)?;
        let transport = self.build_transport()?;
        transport.send(email).await.map_err(AppError::email)?;

        log::info!("Email sent: {}", message.subject);
        Ok(())
    }
}
