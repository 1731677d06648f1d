//! Dead letter handling
//!
//! Jobs whose processing finally fails are wrapped in a `DeadLetter` envelope
//! and appended to a dedicated list, where operators can inspect or replay them.

use crate::error::{ErrorCategory, QueueError};
use crate::queue::WorkQueue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A failed job together with why and when it failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub id: Uuid,
    /// The raw payload exactly as it was popped.
    pub payload: String,
    pub error: String,
    pub category: String,
    /// Total processing attempts made.
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(payload: impl Into<String>, error: &QueueError, attempts: u32) -> Self {
        let category: ErrorCategory = error.category();
        Self {
            id: Uuid::new_v4(),
            payload: payload.into(),
            error: error.to_string(),
            category: category.as_str().to_string(),
            attempts,
            failed_at: Utc::now(),
        }
    }
}

/// Writes dead letters to a queue and replays them on request.
#[derive(Clone)]
pub struct DeadLetterSink {
    queue: Arc<dyn WorkQueue>,
    max_length: Option<usize>,
}

impl DeadLetterSink {
    pub fn new(queue: Arc<dyn WorkQueue>) -> Self {
        Self {
            queue,
            max_length: None,
        }
    }

    /// Keep at most `max_length` dead letters, dropping the oldest.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn name(&self) -> &str {
        self.queue.name()
    }

    /// Append a dead letter to the list, trimming it to the configured cap.
    pub async fn send(&self, letter: &DeadLetter) -> Result<(), QueueError> {
        let json = serde_json::to_string(letter)?;
        self.queue.push_back(&json).await?;

        if let Some(max_length) = self.max_length {
            let dropped = self.queue.trim(max_length).await?;
            if dropped > 0 {
                warn!(
                    queue = %self.queue.name(),
                    dropped = dropped,
                    max_length = max_length,
                    "Dead letter queue full, dropped oldest entries"
                );
            }
        }

        warn!(
            dead_letter_id = %letter.id,
            queue = %self.queue.name(),
            attempts = letter.attempts,
            "Moved job to dead letter queue"
        );
        Ok(())
    }

    /// Number of dead letters waiting.
    pub async fn len(&self) -> Result<usize, QueueError> {
        self.queue.len().await
    }

    /// Pop the oldest dead letter, if any.
    pub async fn pop(&self) -> Result<Option<DeadLetter>, QueueError> {
        match self.queue.pop_front().await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Move up to `limit` dead letters back onto `target`, oldest first.
    ///
    /// Returns how many payloads were replayed.
    pub async fn replay(&self, target: &dyn WorkQueue, limit: usize) -> Result<usize, QueueError> {
        let mut replayed = 0;

        while replayed < limit {
            let Some(letter) = self.pop().await? else {
                break;
            };
            target.push_back(&letter.payload).await?;
            replayed += 1;
        }

        if replayed > 0 {
            info!(
                count = replayed,
                from = %self.queue.name(),
                to = %target.name(),
                "Replayed dead letters"
            );
        }

        Ok(replayed)
    }
}
