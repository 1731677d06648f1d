//! Mailgun email provider implementation.

use super::{EmailProvider, OutboundEmail, SentEmail};
use crate::error::{MailError, MailResult};
use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_optional, env_or_default, env_required};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info};

pub const DEFAULT_API_URL: &str = "https://api.mailgun.net/v3";

/// Mailgun API configuration.
#[derive(Debug, Clone)]
pub struct MailgunConfig {
    /// Mailgun private API key.
    pub api_key: String,
    /// Sending domain.
    pub domain: String,
    /// Sender email address.
    pub from_email: String,
    /// Sender name.
    pub from_name: String,
    /// Mailing list address for the newsletter.
    pub newsletter_list: Option<String>,
    /// Address copied on every outgoing email.
    pub bcc: Option<String>,
    /// Mailgun API base URL (defaults to production).
    pub api_url: String,
}

impl MailgunConfig {
    /// Create a new Mailgun configuration.
    pub fn new(api_key: String, domain: String, from_email: String) -> Self {
        Self {
            api_key,
            domain,
            from_email,
            from_name: "NodeNA".to_string(),
            newsletter_list: None,
            bcc: None,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    pub fn with_newsletter_list(mut self, list: impl Into<String>) -> Self {
        self.newsletter_list = Some(list.into());
        self
    }

    pub fn with_bcc(mut self, bcc: impl Into<String>) -> Self {
        self.bcc = Some(bcc.into());
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// `Name <address>` used as the envelope sender.
    pub fn sender(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }

    pub(crate) fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

impl FromEnv for MailgunConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(
            env_required("MAILGUN_KEY")?,
            env_required("MAILGUN_DOMAIN")?,
            env_required("MAILGUN_EMAIL")?,
        );
        config.newsletter_list = env_optional("MAILGUN_NEWSLETTER");
        config.bcc = env_optional("MAILGUN_BCC");
        config.api_url = env_or_default("MAILGUN_API_URL", DEFAULT_API_URL);
        Ok(config)
    }
}

/// Mailgun email provider.
pub struct MailgunProvider {
    config: MailgunConfig,
    client: Client,
}

impl MailgunProvider {
    /// Create a new Mailgun provider.
    pub fn new(config: MailgunConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Create a provider from environment variables.
    pub fn from_env() -> MailResult<Self> {
        Ok(Self::new(MailgunConfig::from_env()?))
    }

    pub fn config(&self) -> &MailgunConfig {
        &self.config
    }

    /// Form fields of the messages API call.
    fn form(&self, email: &OutboundEmail) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("from", self.config.sender()),
            ("to", email.to.clone()),
            ("subject", email.subject.clone()),
            ("html", email.html_body.clone()),
        ];

        if let Some(reply_to) = &email.from {
            form.push(("h:Reply-To", reply_to.clone()));
        }

        for bcc in self.config.bcc.iter().chain(email.bcc.iter()) {
            form.push(("bcc", bcc.clone()));
        }

        form
    }
}

#[derive(Debug, Deserialize)]
struct MailgunResponse {
    id: Option<String>,
    #[allow(dead_code)] // Populated by deserialization from the Mailgun API
    message: Option<String>,
}

#[async_trait]
impl EmailProvider for MailgunProvider {
    async fn send(&self, email: &OutboundEmail) -> MailResult<SentEmail> {
        debug!(
            to = %email.to,
            subject = %email.subject,
            domain = %self.config.domain,
            bcc_count = email.bcc.len(),
            has_reply_to = email.from.is_some(),
            "Sending email via Mailgun"
        );

        let response = self
            .client
            .post(format!("{}/{}/messages", self.config.base_url(), self.config.domain))
            .basic_auth("api", Some(&self.config.api_key))
            .form(&self.form(email))
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                to = %email.to,
                status = %status,
                body = %body,
                "Mailgun API error"
            );
            return Err(MailError::from_status(status.as_u16(), body));
        }

        let message_id = response
            .json::<MailgunResponse>()
            .await
            .ok()
            .and_then(|r| r.id);

        info!(
            to = %email.to,
            message_id = ?message_id,
            "Email sent successfully via Mailgun"
        );

        Ok(SentEmail {
            message_id,
            accepted: true,
        })
    }

    fn name(&self) -> &'static str {
        "Mailgun"
    }

    async fn health_check(&self) -> MailResult<bool> {
        let response = self
            .client
            .get(format!("{}/domains/{}", self.config.base_url(), self.config.domain))
            .basic_auth("api", Some(&self.config.api_key))
            .send()
            .await?;

        Ok(response.status().is_success())
    }
}
