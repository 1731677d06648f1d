//! Queue Worker Framework
//!
//! A small Redis-backed work queue consumer for background jobs that are
//! announced on a pub/sub channel and drained one at a time.
//!
//! ## Features
//!
//! - **Channel fan-in**: payloads published on a channel are appended to a FIFO list
//! - **Single in-flight job**: a worker-owned busy flag guarantees at most one
//!   job is being processed at any time
//! - **Explicit drain loop**: no self re-invocation, the loop waits on a notifier
//! - **Retry and dead-lettering**: both opt-in, failed jobs are dropped by default
//! - **Metrics**: counters through the `metrics` facade
//!
//! ## Example
//!
//! ```ignore
//! use queue_worker::{QueueDef, QueueProcessor, QueueWorker, WorkerConfig};
//!
//! struct MailQueue;
//! impl QueueDef for MailQueue {
//!     const QUEUE_NAME: &'static str = "mailQueue";
//!     const CHANNEL: &'static str = "email";
//! }
//!
//! let config = WorkerConfig::from_queue_def::<MailQueue>();
//! let queue = RedisListQueue::new(redis, &config.queue_name);
//! let worker = QueueWorker::new(Arc::new(queue), processor, config);
//! worker.run(shutdown_rx).await?;
//! ```

mod config;
mod dlq;
mod error;
pub mod metrics;
mod queue;
mod redis_list;
mod registry;
mod retry;
mod worker;

pub use config::WorkerConfig;
pub use dlq::{DeadLetter, DeadLetterSink};
pub use error::{ErrorCategory, QueueError};
pub use metrics::QueueMetrics;
pub use queue::{InMemoryQueue, WorkQueue};
pub use redis_list::{connect, connect_with_retry, subscribe, ChannelPublisher, RedisListQueue};
pub use registry::{ProcessOutcome, QueueDef, QueueProcessor};
pub use retry::{retry, retry_with_backoff, RetryConfig};
pub use worker::{CycleOutcome, DrainReport, QueueWorker, WorkerState};
