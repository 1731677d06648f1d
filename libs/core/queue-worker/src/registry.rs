//! Queue definitions and the processor seam.
//!
//! This module provides:
//! - `QueueDef` trait for domain-specific queue naming
//! - `QueueProcessor` trait implemented by domain job handlers
//! - `ProcessOutcome` describing what a processor did with a payload

use crate::error::QueueError;
use async_trait::async_trait;

/// Queue definition trait.
///
/// Each domain implements this trait to define its queue configuration.
///
/// # Example
///
/// ```rust,ignore
/// use queue_worker::QueueDef;
///
/// pub struct MailQueue;
///
/// impl QueueDef for MailQueue {
///     const QUEUE_NAME: &'static str = "mailQueue";
///     const CHANNEL: &'static str = "email";
/// }
/// ```
pub trait QueueDef: Send + Sync {
    /// The Redis list holding pending jobs.
    const QUEUE_NAME: &'static str;

    /// The pub/sub channel on which new jobs are announced.
    const CHANNEL: &'static str;

    /// Dead letter list for failed jobs. Default: none, failed jobs are dropped.
    const DEAD_LETTER_QUEUE: Option<&'static str> = None;

    fn queue_name() -> &'static str {
        Self::QUEUE_NAME
    }

    fn channel() -> &'static str {
        Self::CHANNEL
    }
}

/// What a processor did with a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The payload was recognized and handled.
    Handled,
    /// The payload was well-formed but not addressed to any handler.
    Ignored,
}

/// Trait for job processors.
///
/// Processors receive the raw payload exactly as it was popped from the queue,
/// so decoding failures surface as processing errors at the cycle boundary.
///
/// # Example
///
/// ```rust,ignore
/// use queue_worker::{ProcessOutcome, QueueError, QueueProcessor};
///
/// struct Echo;
///
/// #[async_trait]
/// impl QueueProcessor for Echo {
///     async fn process(&self, payload: &str) -> Result<ProcessOutcome, QueueError> {
///         println!("{payload}");
///         Ok(ProcessOutcome::Handled)
///     }
///
///     fn name(&self) -> &'static str {
///         "Echo"
///     }
/// }
/// ```
#[async_trait]
pub trait QueueProcessor: Send + Sync {
    /// Process a single raw payload.
    async fn process(&self, payload: &str) -> Result<ProcessOutcome, QueueError>;

    /// Get the processor name for logging and metrics labels.
    fn name(&self) -> &'static str;

    /// Health check for the processor.
    ///
    /// Default: always returns Ok(true).
    async fn health_check(&self) -> Result<bool, QueueError> {
        Ok(true)
    }
}
