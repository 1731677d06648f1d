//! Metrics for queue workers
//!
//! Emitted through the `metrics` facade; they are no-ops until the embedding
//! process installs a recorder.

use crate::error::ErrorCategory;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Queue worker metrics helper
#[derive(Clone)]
pub struct QueueMetrics {
    /// Queue name for labeling
    queue_name: String,
    /// Processor name for labeling
    processor_name: String,
}

impl QueueMetrics {
    pub fn new(queue_name: impl Into<String>, processor_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            processor_name: processor_name.into(),
        }
    }

    /// Record a payload arriving on the channel
    pub fn job_published(&self) {
        counter!(
            "queue_worker_jobs_published_total",
            "queue" => self.queue_name.clone()
        )
        .increment(1);
    }

    /// Record a job being popped for processing
    pub fn job_received(&self) {
        counter!(
            "queue_worker_jobs_received_total",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(1);
    }

    /// Record a job being processed successfully
    pub fn job_processed(&self, duration: Duration) {
        counter!(
            "queue_worker_jobs_processed_total",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone(),
            "status" => "success"
        )
        .increment(1);

        histogram!(
            "queue_worker_job_duration_seconds",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .record(duration.as_secs_f64());
    }

    /// Record a job that no handler claimed
    pub fn job_ignored(&self) {
        counter!(
            "queue_worker_jobs_ignored_total",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(1);
    }

    /// Record a job failing after all attempts
    pub fn job_failed(&self, category: ErrorCategory) {
        counter!(
            "queue_worker_jobs_processed_total",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone(),
            "status" => "failed",
            "category" => category.as_str()
        )
        .increment(1);
    }

    /// Record a retry attempt
    pub fn job_retried(&self) {
        counter!(
            "queue_worker_jobs_retried_total",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(1);
    }

    /// Record a job moved to the dead letter list
    pub fn job_dead_lettered(&self) {
        counter!(
            "queue_worker_jobs_dead_lettered_total",
            "queue" => self.queue_name.clone()
        )
        .increment(1);
    }

    /// Record a queue operation failure (pop/push)
    pub fn queue_error(&self) {
        counter!(
            "queue_worker_queue_errors_total",
            "queue" => self.queue_name.clone()
        )
        .increment(1);
    }

    /// Set whether the worker is currently processing a job
    pub fn set_busy(&self, busy: bool) {
        gauge!(
            "queue_worker_busy",
            "queue" => self.queue_name.clone()
        )
        .set(if busy { 1.0 } else { 0.0 });
    }
}
