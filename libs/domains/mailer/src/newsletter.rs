//! Newsletter mailing list membership.

use crate::error::{MailError, MailResult};
use crate::models::{Address, MailMessage};
use crate::providers::{EmailProvider, MailgunConfig, OutboundEmail};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Mailing list collaborator used by the `subscribe` and
/// `subscription-confirm` kinds.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Newsletter: Send + Sync {
    /// Register `to` as an unconfirmed member and send the confirmation email.
    async fn subscribe(&self, to: &Address, subject: &str, body: &str) -> MailResult<()>;

    /// Mark the member named by the payload as subscribed.
    async fn confirm_subscription(&self, payload: &MailMessage) -> MailResult<()>;

    fn name(&self) -> &'static str;
}

/// Address a confirmation refers to: the top-level `email` field, else `to.email`.
pub fn confirmation_address(payload: &MailMessage) -> MailResult<&str> {
    payload
        .field_str("email")
        .or_else(|| {
            payload
                .to
                .as_ref()
                .and_then(|to| to.get("email"))
                .and_then(Value::as_str)
        })
        .filter(|email| !email.trim().is_empty())
        .ok_or(MailError::MissingField("email"))
}

/// Newsletter backed by a Mailgun mailing list.
pub struct MailgunNewsletter {
    config: MailgunConfig,
    list: String,
    client: Client,
    provider: Arc<dyn EmailProvider>,
}

impl MailgunNewsletter {
    /// Fails when no list address is configured.
    pub fn new(config: MailgunConfig, provider: Arc<dyn EmailProvider>) -> MailResult<Self> {
        let list = config
            .newsletter_list
            .clone()
            .ok_or_else(|| MailError::ConfigError("MAILGUN_NEWSLETTER not set".to_string()))?;

        Ok(Self {
            config,
            list,
            client: Client::new(),
            provider,
        })
    }

    fn members_url(&self) -> String {
        format!("{}/lists/{}/members", self.config.base_url(), self.list)
    }

    fn member_form(to: &Address) -> Vec<(&'static str, String)> {
        vec![
            ("address", to.email.clone()),
            ("name", to.name.clone().unwrap_or_default()),
            ("subscribed", "no".to_string()),
            ("upsert", "yes".to_string()),
        ]
    }

    fn confirm_form(address: &str) -> Vec<(&'static str, String)> {
        vec![
            ("members", json!([{ "address": address }]).to_string()),
            ("subscribed", "yes".to_string()),
            ("upsert", "yes".to_string()),
        ]
    }

    async fn post_form(&self, url: String, form: &[(&'static str, String)]) -> MailResult<()> {
        let response = self
            .client
            .post(url)
            .basic_auth("api", Some(&self.config.api_key))
            .form(form)
            .send()
            .await
            .map_err(|e| MailError::NewsletterError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        error!(list = %self.list, status = %status, body = %body, "Mailgun list API error");
        Err(match MailError::from_status(status.as_u16(), body) {
            MailError::ProviderError(message) => MailError::NewsletterError(message),
            rejected => rejected,
        })
    }
}

#[async_trait]
impl Newsletter for MailgunNewsletter {
    async fn subscribe(&self, to: &Address, subject: &str, body: &str) -> MailResult<()> {
        debug!(list = %self.list, email = %to.email, "Adding pending list member");

        // Member creation is best effort, the confirmation mail goes out regardless
        if let Err(e) = self.post_form(self.members_url(), &Self::member_form(to)).await {
            warn!(list = %self.list, email = %to.email, error = %e, "Failed to add list member");
        }

        self.provider
            .send(&OutboundEmail::new(to.email.clone(), subject, body))
            .await?;

        info!(list = %self.list, email = %to.email, "Subscription confirmation sent");
        Ok(())
    }

    async fn confirm_subscription(&self, payload: &MailMessage) -> MailResult<()> {
        let address = confirmation_address(payload)?;

        self.post_form(format!("{}.json", self.members_url()), &Self::confirm_form(address))
            .await?;

        info!(list = %self.list, email = %address, "Subscription confirmed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Mailgun"
    }
}

/// Development newsletter: membership changes are only logged.
pub struct LocalNewsletter {
    provider: Arc<dyn EmailProvider>,
}

impl LocalNewsletter {
    pub fn new(provider: Arc<dyn EmailProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Newsletter for LocalNewsletter {
    async fn subscribe(&self, to: &Address, subject: &str, body: &str) -> MailResult<()> {
        info!(email = %to.email, "Newsletter member pending (local)");
        self.provider
            .send(&OutboundEmail::new(to.email.clone(), subject, body))
            .await?;
        Ok(())
    }

    async fn confirm_subscription(&self, payload: &MailMessage) -> MailResult<()> {
        let address = confirmation_address(payload)?;
        info!(email = %address, "Newsletter member subscribed (local)");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Local"
    }
}
