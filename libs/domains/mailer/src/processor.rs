//! Mail processor for the queue worker.
//!
//! `MailProcessor` decodes a queued payload, renders the template for its
//! kind and hands the result to the provider or the newsletter.

use crate::error::MailResult;
use crate::models::{MailKind, MailMessage};
use crate::newsletter::Newsletter;
use crate::providers::{EmailProvider, OutboundEmail};
use crate::templates::{MailTemplate, TemplateEngine};
use async_trait::async_trait;
use queue_worker::{ProcessOutcome, QueueError, QueueProcessor};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, trace};

pub const WELCOME_SUBJECT: &str = "Welcome to NodeNA";
pub const RESET_SUBJECT: &str = "Reset your password on NodeNA";
pub const PASSWORD_CHANGED_SUBJECT: &str = "Your NodeNA password has been changed";
pub const SUBSCRIBE_SUBJECT: &str = "Confirm Subscription";

/// Subject of a member-to-member message.
pub fn message_subject(sender_name: &str) -> String {
    format!("{} has sent you a message on NodeNA", sender_name)
}

/// Processor that renders and sends queued mail.
pub struct MailProcessor {
    provider: Arc<dyn EmailProvider>,
    newsletter: Arc<dyn Newsletter>,
    templates: Arc<TemplateEngine>,
}

impl MailProcessor {
    pub fn new(
        provider: Arc<dyn EmailProvider>,
        newsletter: Arc<dyn Newsletter>,
        templates: Arc<TemplateEngine>,
    ) -> Self {
        Self {
            provider,
            newsletter,
            templates,
        }
    }

    /// Decode and handle one raw payload.
    pub async fn handle(&self, payload: &str) -> MailResult<ProcessOutcome> {
        let value: Value = serde_json::from_str(payload)?;

        let Some(kind) = MailKind::from_payload(&value) else {
            trace!(payload = %payload, "Ignoring payload with unknown type");
            return Ok(ProcessOutcome::Ignored);
        };

        let message = MailMessage::from_value(value)?;
        self.dispatch(kind, &message).await?;
        Ok(ProcessOutcome::Handled)
    }

    async fn dispatch(&self, kind: MailKind, message: &MailMessage) -> MailResult<()> {
        debug!(kind = %kind, "Dispatching mail");

        match kind {
            MailKind::Message => {
                let from = message.sender()?;
                let subject = message_subject(from.display_name());
                self.send_templated(MailTemplate::Message, message, subject, Some(&from.email))
                    .await
            }
            MailKind::Registration => {
                self.send_templated(MailTemplate::Welcome, message, WELCOME_SUBJECT.to_string(), None)
                    .await
            }
            MailKind::Reset => {
                self.send_templated(MailTemplate::Reset, message, RESET_SUBJECT.to_string(), None)
                    .await
            }
            MailKind::PasswordChanged => {
                self.send_templated(
                    MailTemplate::PasswordChanged,
                    message,
                    PASSWORD_CHANGED_SUBJECT.to_string(),
                    None,
                )
                .await
            }
            MailKind::Subscribe => {
                let to = message.recipient()?;
                let body = self.templates.render(MailTemplate::Subscribe, message)?;
                self.newsletter.subscribe(&to, SUBSCRIBE_SUBJECT, &body).await
            }
            MailKind::SubscriptionConfirm => self.newsletter.confirm_subscription(message).await,
        }
    }

    async fn send_templated(
        &self,
        template: MailTemplate,
        message: &MailMessage,
        subject: String,
        reply_to: Option<&str>,
    ) -> MailResult<()> {
        let to = message.recipient()?;
        let html = self.templates.render(template, message)?;

        let mut email = OutboundEmail::new(to.email.clone(), subject, html);
        if let Some(reply_to) = reply_to {
            email = email.with_from(reply_to);
        }

        let sent = self.provider.send(&email).await?;

        info!(
            kind = %message.kind,
            to = %to.email,
            provider = %self.provider.name(),
            message_id = ?sent.message_id,
            "Successfully sent email"
        );
        Ok(())
    }
}

#[async_trait]
impl QueueProcessor for MailProcessor {
    async fn process(&self, payload: &str) -> Result<ProcessOutcome, QueueError> {
        Ok(self.handle(payload).await?)
    }

    fn name(&self) -> &'static str {
        "MailProcessor"
    }

    async fn health_check(&self) -> Result<bool, QueueError> {
        Ok(self.provider.health_check().await?)
    }
}

impl Clone for MailProcessor {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            newsletter: Arc::clone(&self.newsletter),
            templates: Arc::clone(&self.templates),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MailError;
    use crate::newsletter::MockNewsletter;
    use crate::providers::{MockEmailProvider, SentEmail};
    use queue_worker::ErrorCategory;

    fn accepted() -> MailResult<SentEmail> {
        Ok(SentEmail {
            message_id: Some("<id@mg>".to_string()),
            accepted: true,
        })
    }

    fn processor(provider: MockEmailProvider, newsletter: MockNewsletter) -> MailProcessor {
        MailProcessor::new(
            Arc::new(provider),
            Arc::new(newsletter),
            Arc::new(TemplateEngine::new().unwrap()),
        )
    }

    fn expect_one_send(subject: &'static str, to: &'static str) -> MockEmailProvider {
        let mut provider = MockEmailProvider::new();
        provider
            .expect_send()
            .withf(move |email| email.subject == subject && email.to == to && email.from.is_none())
            .times(1)
            .returning(|_| accepted());
        provider.expect_name().return_const("Mock");
        provider
    }

    #[tokio::test]
    async fn test_registration_sends_welcome() {
        let processor = processor(expect_one_send(WELCOME_SUBJECT, "a@b.com"), MockNewsletter::new());

        let outcome = processor
            .process(r#"{"type":"registration","to":{"email":"a@b.com"}}"#)
            .await
            .unwrap();
        assert_eq!(outcome, ProcessOutcome::Handled);
    }

    #[tokio::test]
    async fn test_registration_ignores_unread_sender() {
        let processor = processor(expect_one_send(WELCOME_SUBJECT, "a@b.com"), MockNewsletter::new());

        let outcome = processor
            .process(r#"{"type":"registration","to":{"email":"a@b.com"},"from":"system"}"#)
            .await
            .unwrap();
        assert_eq!(outcome, ProcessOutcome::Handled);
    }

    #[tokio::test]
    async fn test_reset_subject() {
        let processor = processor(expect_one_send(RESET_SUBJECT, "r@b.com"), MockNewsletter::new());

        processor
            .process(r#"{"type":"reset","to":{"email":"r@b.com","resetPasswordToken":"abc"}}"#)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_password_changed_subject() {
        let processor = processor(
            expect_one_send(PASSWORD_CHANGED_SUBJECT, "p@b.com"),
            MockNewsletter::new(),
        );

        processor
            .process(r#"{"type":"password-changed","to":{"email":"p@b.com","name":"Pat"}}"#)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_message_uses_sender_name_and_reply_to() {
        let mut provider = MockEmailProvider::new();
        provider
            .expect_send()
            .withf(|email| {
                email.to == "to@b.com"
                    && email.from.as_deref() == Some("from@b.com")
                    && email.subject == "Sam has sent you a message on NodeNA"
                    && email.html_body.contains("hello there")
            })
            .times(1)
            .returning(|_| accepted());
        provider.expect_name().return_const("Mock");

        let processor = processor(provider, MockNewsletter::new());
        processor
            .process(
                r#"{"type":"message","to":{"email":"to@b.com"},"from":{"email":"from@b.com","name":"Sam"},"message":"hello there"}"#,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_message_without_sender_name_uses_email() {
        let mut provider = MockEmailProvider::new();
        provider
            .expect_send()
            .withf(|email| email.subject == "from@b.com has sent you a message on NodeNA")
            .times(1)
            .returning(|_| accepted());
        provider.expect_name().return_const("Mock");

        let processor = processor(provider, MockNewsletter::new());
        processor
            .process(r#"{"type":"message","to":{"email":"to@b.com"},"from":{"email":"from@b.com"}}"#)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_message_without_sender_is_permanent() {
        let mut provider = MockEmailProvider::new();
        provider.expect_send().never();

        let processor = processor(provider, MockNewsletter::new());
        let err = processor
            .process(r#"{"type":"message","to":{"email":"to@b.com"}}"#)
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Permanent);
    }

    #[tokio::test]
    async fn test_subscribe_renders_and_delegates() {
        let mut provider = MockEmailProvider::new();
        provider.expect_send().never();

        let mut newsletter = MockNewsletter::new();
        newsletter
            .expect_subscribe()
            .withf(|to, subject, body| {
                to.email == "s@b.com" && subject == SUBSCRIBE_SUBJECT && body.contains("s@b.com")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let processor = processor(provider, newsletter);
        processor
            .process(r#"{"type":"subscribe","to":{"email":"s@b.com"}}"#)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_subscription_confirm_passes_payload_through() {
        let mut provider = MockEmailProvider::new();
        provider.expect_send().never();

        let mut newsletter = MockNewsletter::new();
        newsletter
            .expect_confirm_subscription()
            .withf(|payload| {
                payload.kind == "subscription-confirm"
                    && payload.field_str("email") == Some("c@b.com")
                    && payload.field_str("token") == Some("t0k")
            })
            .times(1)
            .returning(|_| Ok(()));

        let processor = processor(provider, newsletter);
        processor
            .process(r#"{"type":"subscription-confirm","email":"c@b.com","token":"t0k"}"#)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_subscription_confirm_keeps_unusual_recipient() {
        let mut newsletter = MockNewsletter::new();
        newsletter
            .expect_confirm_subscription()
            .withf(|payload| {
                payload.field_str("email") == Some("c@b.com")
                    && payload.to == Some(serde_json::json!({"name": "Ann"}))
            })
            .times(1)
            .returning(|_| Ok(()));

        let processor = processor(MockEmailProvider::new(), newsletter);
        let outcome = processor
            .process(r#"{"type":"subscription-confirm","email":"c@b.com","to":{"name":"Ann"}}"#)
            .await
            .unwrap();
        assert_eq!(outcome, ProcessOutcome::Handled);
    }

    #[tokio::test]
    async fn test_health_check_asks_the_provider() {
        let mut provider = MockEmailProvider::new();
        provider.expect_health_check().times(1).returning(|| Ok(false));

        let processor = processor(provider, MockNewsletter::new());
        assert!(!processor.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_kind_touches_nothing() {
        let mut provider = MockEmailProvider::new();
        provider.expect_send().never();
        let mut newsletter = MockNewsletter::new();
        newsletter.expect_subscribe().never();
        newsletter.expect_confirm_subscription().never();

        let processor = processor(provider, newsletter);
        for payload in [r#"{"type":"unknown-kind"}"#, r#"{"to":{"email":"a@b.com"}}"#, "42"] {
            assert_eq!(processor.process(payload).await.unwrap(), ProcessOutcome::Ignored);
        }
    }

    #[tokio::test]
    async fn test_malformed_json_is_permanent() {
        let mut provider = MockEmailProvider::new();
        provider.expect_send().never();

        let processor = processor(provider, MockNewsletter::new());
        let err = processor.process("{not json").await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Permanent);
        assert!(err.to_string().contains("Invalid payload"));
    }

    #[tokio::test]
    async fn test_missing_recipient_is_permanent() {
        let mut provider = MockEmailProvider::new();
        provider.expect_send().never();

        let processor = processor(provider, MockNewsletter::new());
        let err = processor.process(r#"{"type":"registration"}"#).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Permanent);
    }

    #[tokio::test]
    async fn test_provider_failure_is_transient() {
        let mut provider = MockEmailProvider::new();
        provider
            .expect_send()
            .times(1)
            .returning(|_| Err(MailError::ProviderError("connection reset".to_string())));

        let processor = processor(provider, MockNewsletter::new());
        let err = processor
            .process(r#"{"type":"reset","to":{"email":"a@b.com"}}"#)
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Transient);
    }
}
