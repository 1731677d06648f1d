//! Mailer Domain
//!
//! Transactional email for NodeNA, delivered by a background queue worker.
//!
//! # Features
//!
//! - Welcome emails for new users
//! - Password reset and password changed notices
//! - Member-to-member messages
//! - Newsletter subscription and confirmation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ Request Handler │  ← MailPublisher::registration(...)
//! └────────┬────────┘
//!          │ PUBLISH email
//! ┌────────▼────────┐
//! │   Mail Worker   │  ← RPUSH mailQueue, then drain one at a time
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │  MailProcessor  │  ← decode, pick template by `type`, render
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │ Email Provider  │  ← Mailgun, SMTP, log
//! └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_mailer::{Address, MailPublisher};
//!
//! let publisher = MailPublisher::new(redis);
//! publisher
//!     .registration(Address::new("ann@example.com").with_name("Ann"), None)
//!     .await?;
//! ```

pub mod error;
pub mod models;
pub mod newsletter;
pub mod processor;
pub mod providers;
pub mod publisher;
pub mod queues;
pub mod templates;

// Re-export commonly used types
pub use error::{MailError, MailResult};
pub use models::{Address, MailKind, MailMessage};
pub use newsletter::{LocalNewsletter, MailgunNewsletter, Newsletter};
pub use processor::MailProcessor;
pub use providers::{
    EmailProvider, LogProvider, MailgunConfig, MailgunProvider, OutboundEmail, ProviderKind, SentEmail,
    SmtpConfig, SmtpProvider,
};
pub use publisher::MailPublisher;
pub use queues::MailQueue;
pub use templates::{MailTemplate, TemplateEngine};
