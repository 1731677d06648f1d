//! Worker configuration
//!
//! This module provides `WorkerConfig` for configuring the queue worker.

use crate::registry::QueueDef;
use crate::retry::RetryConfig;

/// Configuration for the queue worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Redis list holding pending jobs
    pub queue_name: String,

    /// Pub/sub channel announcing new jobs
    pub channel: String,

    /// Dead letter list for jobs whose processing finally failed (None = drop them)
    pub dead_letter_queue: Option<String>,

    /// Cap on the dead letter list length (None = unbounded)
    pub dead_letter_max_length: Option<usize>,

    /// Extra attempts for a transiently failing job (0 = at-most-once)
    pub max_retries: u32,

    /// Backoff between job retries
    pub job_retry: RetryConfig,

    /// Backoff after the queue itself fails (pop errors)
    pub queue_backoff: RetryConfig,
}

impl WorkerConfig {
    /// Create a new WorkerConfig from a QueueDef
    pub fn from_queue_def<Q: QueueDef>() -> Self {
        Self {
            queue_name: Q::QUEUE_NAME.to_string(),
            channel: Q::CHANNEL.to_string(),
            dead_letter_queue: Q::DEAD_LETTER_QUEUE.map(str::to_string),
            ..Self::new(Q::QUEUE_NAME, Q::CHANNEL)
        }
    }

    /// Create a new WorkerConfig with explicit values
    pub fn new(queue_name: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            channel: channel.into(),
            dead_letter_queue: None,
            dead_letter_max_length: None,
            max_retries: 0,
            job_retry: RetryConfig::new()
                .with_initial_delay(500)
                .with_max_delay(30_000),
            queue_backoff: RetryConfig::new()
                .with_initial_delay(1000)
                .with_max_delay(30_000),
        }
    }

    /// Set the dead letter list
    pub fn with_dead_letter_queue(mut self, queue: impl Into<String>) -> Self {
        self.dead_letter_queue = Some(queue.into());
        self
    }

    /// Cap the dead letter list length
    pub fn with_dead_letter_max_length(mut self, max_length: usize) -> Self {
        self.dead_letter_max_length = Some(max_length);
        self
    }

    /// Set the number of retries for transient failures
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the initial delay between job retries
    pub fn with_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.job_retry = self.job_retry.with_initial_delay(delay_ms);
        self
    }

    /// Set the backoff used after queue errors
    pub fn with_queue_backoff(mut self, backoff: RetryConfig) -> Self {
        self.queue_backoff = backoff;
        self
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new("queue:jobs", "jobs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestQueue;

    impl QueueDef for TestQueue {
        const QUEUE_NAME: &'static str = "test:queue";
        const CHANNEL: &'static str = "test";
        const DEAD_LETTER_QUEUE: Option<&'static str> = Some("test:dead");
    }

    #[test]
    fn test_from_queue_def() {
        let config = WorkerConfig::from_queue_def::<TestQueue>();

        assert_eq!(config.queue_name, "test:queue");
        assert_eq!(config.channel, "test");
        assert_eq!(config.dead_letter_queue.as_deref(), Some("test:dead"));
        assert_eq!(config.dead_letter_max_length, None);
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_builder_pattern() {
        let config = WorkerConfig::new("my:queue", "my")
            .with_dead_letter_queue("my:dead")
            .with_dead_letter_max_length(1000)
            .with_max_retries(3)
            .with_retry_delay_ms(50);

        assert_eq!(config.queue_name, "my:queue");
        assert_eq!(config.dead_letter_queue.as_deref(), Some("my:dead"));
        assert_eq!(config.dead_letter_max_length, Some(1000));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.job_retry.initial_delay_ms, 50);
    }
}
