//! Work queue abstraction.
//!
//! A `WorkQueue` is an ordered FIFO list supporting push-to-back and
//! pop-from-front. `RedisListQueue` is the persistent implementation;
//! `InMemoryQueue` backs tests and local runs without Redis.

use crate::error::QueueError;
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Append a payload to the back of the queue.
    async fn push_back(&self, payload: &str) -> Result<(), QueueError>;

    /// Remove and return the oldest payload, or `None` when the queue is empty.
    async fn pop_front(&self) -> Result<Option<String>, QueueError>;

    /// Number of pending payloads.
    async fn len(&self) -> Result<usize, QueueError>;

    async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }

    /// Drop the oldest payloads until at most `max_len` remain.
    ///
    /// Returns how many payloads were dropped.
    async fn trim(&self, max_len: usize) -> Result<usize, QueueError> {
        let mut dropped = 0;
        while self.len().await? > max_len {
            if self.pop_front().await?.is_none() {
                break;
            }
            dropped += 1;
        }
        Ok(dropped)
    }

    /// Name of the queue for logging.
    fn name(&self) -> &str;
}

/// Process-local FIFO queue.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    name: String,
    items: Mutex<VecDeque<String>>,
}

impl InMemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Mutex::new(VecDeque::new()),
        }
    }

    /// Snapshot of the pending payloads, oldest first.
    pub async fn snapshot(&self) -> Vec<String> {
        self.items.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl WorkQueue for InMemoryQueue {
    async fn push_back(&self, payload: &str) -> Result<(), QueueError> {
        self.items.lock().await.push_back(payload.to_string());
        Ok(())
    }

    async fn pop_front(&self) -> Result<Option<String>, QueueError> {
        Ok(self.items.lock().await.pop_front())
    }

    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.items.lock().await.len())
    }

    async fn trim(&self, max_len: usize) -> Result<usize, QueueError> {
        let mut items = self.items.lock().await;
        let excess = items.len().saturating_sub(max_len);
        items.drain(..excess);
        Ok(excess)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
