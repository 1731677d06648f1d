//! Provider that writes emails to the log instead of delivering them.

use super::{EmailProvider, OutboundEmail, SentEmail};
use crate::error::MailResult;
use async_trait::async_trait;
use tracing::{debug, info};

/// Development provider, every email is accepted.
#[derive(Debug, Clone, Default)]
pub struct LogProvider;

impl LogProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailProvider for LogProvider {
    async fn send(&self, email: &OutboundEmail) -> MailResult<SentEmail> {
        info!(
            to = %email.to,
            from = ?email.from,
            subject = %email.subject,
            body_len = email.html_body.len(),
            "Email not delivered (log provider)"
        );
        debug!(html = %email.html_body, "Email body");

        Ok(SentEmail {
            message_id: None,
            accepted: true,
        })
    }

    fn name(&self) -> &'static str {
        "Log"
    }

    async fn health_check(&self) -> MailResult<bool> {
        Ok(true)
    }
}
