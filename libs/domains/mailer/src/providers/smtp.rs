//! SMTP email provider implementation using lettre.
//!
//! Useful for self-hosted relays and for local development against
//! MailHog/Mailpit.

use super::{EmailProvider, OutboundEmail, SentEmail};
use crate::error::{MailError, MailResult};
use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_flag, env_optional, env_or_default, env_parse};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::{debug, error, info};

/// SMTP configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server host.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Sender email address.
    pub from_email: String,
    /// Sender name.
    pub from_name: String,
    /// SMTP username (optional for dev servers like Mailpit).
    pub username: Option<String>,
    /// SMTP password (optional for dev servers like Mailpit).
    pub password: Option<String>,
    /// Whether to use TLS (false for local dev servers).
    pub use_tls: bool,
}

impl SmtpConfig {
    /// Create a new SMTP configuration.
    pub fn new(host: String, port: u16, from_email: String) -> Self {
        Self {
            host,
            port,
            from_email,
            from_name: "NodeNA".to_string(),
            username: None,
            password: None,
            use_tls: false,
        }
    }

    /// Builder method to set TLS.
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Builder method to set credentials.
    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }
}

impl FromEnv for SmtpConfig {
    /// Defaults target a local Mailpit on port 1025. The sender address is
    /// shared with the Mailgun setup.
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_or_default("SMTP_HOST", "localhost"),
            port: env_parse("SMTP_PORT", 1025)?,
            from_email: env_or_default("MAILGUN_EMAIL", "noreply@localhost"),
            from_name: "NodeNA".to_string(),
            username: env_optional("SMTP_USERNAME"),
            password: env_optional("SMTP_PASSWORD"),
            use_tls: env_flag("SMTP_USE_TLS", false),
        })
    }
}

/// SMTP email provider.
pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl SmtpProvider {
    /// Create a new SMTP provider.
    pub fn new(config: SmtpConfig) -> MailResult<Self> {
        let transport = Self::build_transport(&config)?;
        Ok(Self { transport, config })
    }

    /// Create a provider from environment variables.
    pub fn from_env() -> MailResult<Self> {
        Self::new(SmtpConfig::from_env()?)
    }

    fn build_transport(config: &SmtpConfig) -> MailResult<AsyncSmtpTransport<Tokio1Executor>> {
        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| MailError::ProviderError(format!("Failed to create SMTP relay: {}", e)))?
                .port(config.port)
        } else {
            // Plain connection for local dev servers like Mailpit
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host).port(config.port)
        };

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }

    /// Build a lettre Message from an OutboundEmail.
    fn build_message(&self, email: &OutboundEmail) -> MailResult<Message> {
        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| MailError::InvalidEmail(format!("from: {}", e)))?;

        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| MailError::InvalidEmail(format!("to '{}': {}", email.to, e)))?;

        let mut builder = Message::builder().from(from).to(to).subject(&email.subject);

        if let Some(reply_to) = &email.from {
            let reply_to: Mailbox = reply_to
                .parse()
                .map_err(|e| MailError::InvalidEmail(format!("reply-to '{}': {}", reply_to, e)))?;
            builder = builder.reply_to(reply_to);
        }

        for bcc in &email.bcc {
            let bcc_mailbox: Mailbox = bcc
                .parse()
                .map_err(|e| MailError::InvalidEmail(format!("bcc '{}': {}", bcc, e)))?;
            builder = builder.bcc(bcc_mailbox);
        }

        Ok(builder
            .header(ContentType::TEXT_HTML)
            .body(email.html_body.clone())?)
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, email: &OutboundEmail) -> MailResult<SentEmail> {
        debug!(
            to = %email.to,
            subject = %email.subject,
            host = %self.config.host,
            port = %self.config.port,
            bcc_count = email.bcc.len(),
            has_reply_to = email.from.is_some(),
            "Sending email via SMTP"
        );

        let message = self.build_message(email)?;

        let response = self.transport.send(message).await.map_err(|e| {
            error!(to = %email.to, error = %e, "Failed to send email via SMTP");
            MailError::from(e)
        })?;

        let message_id = response.message().next().map(|s| s.to_string());

        info!(
            to = %email.to,
            message_id = ?message_id,
            "Email sent successfully via SMTP"
        );

        Ok(SentEmail {
            message_id,
            accepted: true,
        })
    }

    fn name(&self) -> &'static str {
        "SMTP"
    }

    async fn health_check(&self) -> MailResult<bool> {
        Ok(self.transport.test_connection().await?)
    }
}
