//! Publishing mail payloads from request handlers.

use crate::error::MailResult;
use crate::models::{Address, MailKind, MailMessage};
use crate::queues::MailQueue;
use queue_worker::{ChannelPublisher, QueueDef};
use redis::aio::ConnectionManager;
use serde_json::Value;
use tracing::debug;

/// Publishes mail payloads on the mail channel.
#[derive(Clone)]
pub struct MailPublisher {
    channel: ChannelPublisher,
}

impl MailPublisher {
    /// Publish on the default `email` channel.
    pub fn new(redis: ConnectionManager) -> Self {
        Self::with_channel(redis, MailQueue::CHANNEL)
    }

    pub fn with_channel(redis: ConnectionManager, channel: impl Into<String>) -> Self {
        Self {
            channel: ChannelPublisher::new(redis, channel),
        }
    }

    /// Publish an arbitrary payload. Returns the number of subscribers that received it.
    pub async fn publish(&self, message: &MailMessage) -> MailResult<usize> {
        let payload = message.to_json()?;
        let receivers = self.channel.publish(&payload).await?;
        debug!(kind = %message.kind, channel = %self.channel.channel(), receivers, "Published mail");
        Ok(receivers)
    }

    /// Welcome a new user. `verify_url` becomes the `verifyURL` template field.
    pub async fn registration(&self, to: Address, verify_url: Option<&str>) -> MailResult<usize> {
        let mut message = MailMessage::new(MailKind::Registration, to);
        if let Some(url) = verify_url {
            message = message.with_field("verifyURL", url);
        }
        self.publish(&message).await
    }

    /// `to` is expected to carry the reset data, e.g. `resetPasswordToken`.
    pub async fn reset(&self, to: Address, reset_url: Option<&str>) -> MailResult<usize> {
        let mut message = MailMessage::new(MailKind::Reset, to);
        if let Some(url) = reset_url {
            message = message.with_field("resetURL", url);
        }
        self.publish(&message).await
    }

    pub async fn password_changed(&self, to: Address) -> MailResult<usize> {
        self.publish(&MailMessage::new(MailKind::PasswordChanged, to)).await
    }

    /// A message from one member to another.
    pub async fn message(
        &self,
        to: Address,
        from: Address,
        subject: Option<&str>,
        body: &str,
    ) -> MailResult<usize> {
        let mut message = MailMessage::new(MailKind::Message, to)
            .with_from(from)
            .with_field("message", body);
        if let Some(subject) = subject {
            message = message.with_field("subject", subject);
        }
        self.publish(&message).await
    }

    pub async fn subscribe(&self, to: Address, confirm_url: Option<&str>) -> MailResult<usize> {
        let mut message = MailMessage::new(MailKind::Subscribe, to);
        if let Some(url) = confirm_url {
            message = message.with_field("confirmURL", url);
        }
        self.publish(&message).await
    }

    pub async fn subscription_confirm(&self, email: &str) -> MailResult<usize> {
        let message = MailMessage::new(MailKind::SubscriptionConfirm, Address::new(email))
            .with_field("email", Value::String(email.to_string()));
        self.publish(&message).await
    }
}
