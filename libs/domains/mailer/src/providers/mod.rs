//! Email provider implementations.
//!
//! This module contains the `EmailProvider` trait and implementations
//! for the outbound mail services the worker can deliver through.

mod log;
mod mailgun;
mod smtp;

pub use log::LogProvider;
pub use mailgun::{MailgunConfig, MailgunProvider};
pub use smtp::{SmtpConfig, SmtpProvider};

use crate::error::{MailError, MailResult};
use async_trait::async_trait;
use std::str::FromStr;
use strum::{Display, EnumString};

/// Represents a sent email with provider-specific message ID.
#[derive(Debug, Clone)]
pub struct SentEmail {
    /// Provider-specific message ID for tracking.
    pub message_id: Option<String>,
    /// Whether the email was accepted for delivery.
    pub accepted: bool,
}

/// Email ready for sending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutboundEmail {
    /// Recipient email address.
    pub to: String,
    /// Address of the member the mail is on behalf of. Delivered as Reply-To,
    /// the envelope sender is always the configured one.
    pub from: Option<String>,
    pub subject: String,
    pub html_body: String,
    /// BCC recipients (email addresses).
    pub bcc: Vec<String>,
}

impl OutboundEmail {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html_body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html_body: html_body.into(),
            ..Default::default()
        }
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_bcc(mut self, bcc: impl Into<String>) -> Self {
        self.bcc.push(bcc.into());
        self
    }
}

/// Trait for email sending providers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send an email.
    async fn send(&self, email: &OutboundEmail) -> MailResult<SentEmail>;

    /// Get the provider name for logging.
    fn name(&self) -> &'static str;

    /// Check if the provider is healthy/configured.
    async fn health_check(&self) -> MailResult<bool>;
}

/// Which provider the worker delivers through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    Mailgun,
    Smtp,
    Log,
}

impl ProviderKind {
    /// Parse a `MAIL_PROVIDER` value.
    pub fn parse(value: &str) -> MailResult<Self> {
        Self::from_str(value.trim()).map_err(|_| {
            MailError::ConfigError(format!(
                "Unknown mail provider '{}', expected mailgun, smtp or log",
                value
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_email_builder() {
        let email = OutboundEmail::new("a@b.com", "Hi", "<p>Hi</p>")
            .with_from("c@d.com")
            .with_bcc("audit@nodena.org");

        assert_eq!(email.to, "a@b.com");
        assert_eq!(email.from.as_deref(), Some("c@d.com"));
        assert_eq!(email.bcc, vec!["audit@nodena.org".to_string()]);
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!(ProviderKind::parse("mailgun").unwrap(), ProviderKind::Mailgun);
        assert_eq!(ProviderKind::parse(" SMTP ").unwrap(), ProviderKind::Smtp);
        assert_eq!(ProviderKind::parse("log").unwrap(), ProviderKind::Log);
        assert!(matches!(
            ProviderKind::parse("sendgrid"),
            Err(MailError::ConfigError(_))
        ));
    }
}
