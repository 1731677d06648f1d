//! Error types for the mailer domain.

use queue_worker::{ErrorCategory, QueueError};
use thiserror::Error;

/// Result type for mailer operations.
pub type MailResult<T> = Result<T, MailError>;

/// Errors that can occur while decoding, rendering, or delivering mail.
#[derive(Debug, Error)]
pub enum MailError {
    /// The queued payload is not valid JSON or does not match the expected shape.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// A field required by the message kind is absent.
    #[error("Missing field '{0}' in payload")]
    MissingField(&'static str),

    /// Template registration or rendering failed.
    #[error("Template error: {0}")]
    TemplateError(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    /// Email provider is unreachable or failed temporarily.
    #[error("Email provider error: {0}")]
    ProviderError(String),

    /// Email provider refused the request.
    #[error("Email provider rejected the request ({status}): {message}")]
    ProviderRejected { status: u16, message: String },

    /// Newsletter list operation failed.
    #[error("Newsletter error: {0}")]
    NewsletterError(String),

    /// Redis queue error.
    #[error("Queue error: {0}")]
    QueueError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl MailError {
    /// Whether retrying the same payload could succeed.
    pub fn category(&self) -> ErrorCategory {
        match self {
            MailError::ProviderError(_)
            | MailError::NewsletterError(_)
            | MailError::QueueError(_) => ErrorCategory::Transient,
            MailError::InvalidPayload(_)
            | MailError::MissingField(_)
            | MailError::TemplateError(_)
            | MailError::InvalidEmail(_)
            | MailError::ProviderRejected { .. }
            | MailError::ConfigError(_) => ErrorCategory::Permanent,
        }
    }

    /// Map an HTTP failure status to an error, treating throttling and server
    /// errors as temporary.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 429 || status >= 500 {
            MailError::ProviderError(format!("HTTP {}: {}", status, message))
        } else {
            MailError::ProviderRejected { status, message }
        }
    }
}

impl From<serde_json::Error> for MailError {
    fn from(err: serde_json::Error) -> Self {
        MailError::InvalidPayload(err.to_string())
    }
}

impl From<handlebars::RenderError> for MailError {
    fn from(err: handlebars::RenderError) -> Self {
        MailError::TemplateError(err.to_string())
    }
}

impl From<handlebars::TemplateError> for MailError {
    fn from(err: handlebars::TemplateError) -> Self {
        MailError::TemplateError(err.to_string())
    }
}

impl From<reqwest::Error> for MailError {
    fn from(err: reqwest::Error) -> Self {
        MailError::ProviderError(err.to_string())
    }
}

impl From<lettre::address::AddressError> for MailError {
    fn from(err: lettre::address::AddressError) -> Self {
        MailError::InvalidEmail(err.to_string())
    }
}

impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        MailError::InvalidEmail(format!("Failed to build email message: {}", err))
    }
}

impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        if err.is_permanent() {
            MailError::ProviderRejected {
                status: err
                    .status()
                    .and_then(|code| code.to_string().parse().ok())
                    .unwrap_or(0),
                message: err.to_string(),
            }
        } else {
            MailError::ProviderError(format!("SMTP send failed: {}", err))
        }
    }
}

impl From<redis::RedisError> for MailError {
    fn from(err: redis::RedisError) -> Self {
        MailError::QueueError(err.to_string())
    }
}

impl From<QueueError> for MailError {
    fn from(err: QueueError) -> Self {
        MailError::QueueError(err.to_string())
    }
}

impl From<core_config::ConfigError> for MailError {
    fn from(err: core_config::ConfigError) -> Self {
        MailError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for MailError {
    fn from(err: std::io::Error) -> Self {
        MailError::TemplateError(format!("IO error: {}", err))
    }
}

/// Keep the retry category when handing errors back to the worker.
impl From<MailError> for QueueError {
    fn from(err: MailError) -> Self {
        QueueError::Processing {
            category: err.category(),
            message: err.to_string(),
        }
    }
}
