//! The generic QueueWorker implementation.
//!
//! A worker owns:
//! - the work queue it drains
//! - a processor that handles each payload
//! - a `WorkerState` (busy flag + active message) guarded by an async mutex
//! - a notifier woken by every publish notification
//!
//! Processing is strictly one job at a time: `process_cycle` atomically
//! checks and sets the busy flag before popping, so concurrent triggers can
//! never dispatch two jobs at once.

use crate::config::WorkerConfig;
use crate::dlq::{DeadLetter, DeadLetterSink};
use crate::error::QueueError;
use crate::metrics::QueueMetrics;
use crate::queue::WorkQueue;
use crate::registry::{ProcessOutcome, QueueProcessor};
use futures::stream::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, Notify, watch};
use tracing::{debug, error, info, trace, warn};

/// Diagnostic state of a worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerState {
    pub busy: bool,
    /// Raw payload currently being processed.
    pub active_message: Option<String>,
}

/// Result of a single processing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle was in progress; nothing was popped.
    Busy,
    /// The queue had nothing to pop.
    Empty,
    /// A job was popped and handled.
    Dispatched,
    /// A job was popped but no handler claimed it.
    Ignored,
    /// A job was popped and finally failed (dropped or dead-lettered).
    Failed,
    /// The queue itself failed; nothing was popped.
    QueueError,
}

impl CycleOutcome {
    /// Whether a job was consumed from the queue in this cycle.
    pub fn consumed_job(&self) -> bool {
        matches!(
            self,
            CycleOutcome::Dispatched | CycleOutcome::Ignored | CycleOutcome::Failed
        )
    }
}

/// Tally of a `drain` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub dispatched: usize,
    pub ignored: usize,
    pub failed: usize,
    pub queue_errors: usize,
}

impl DrainReport {
    pub fn consumed(&self) -> usize {
        self.dispatched + self.ignored + self.failed
    }
}

struct DispatchFailure {
    error: QueueError,
    attempts: u32,
}

/// Single-consumer queue worker.
///
/// # Example
///
/// ```rust,ignore
/// let worker = Arc::new(QueueWorker::new(queue, processor, config));
///
/// let listener = {
///     let worker = Arc::clone(&worker);
///     let shutdown = shutdown_rx.clone();
///     tokio::spawn(async move { worker.listen(notifications, shutdown).await })
/// };
///
/// worker.run(shutdown_rx).await?;
/// ```
pub struct QueueWorker<P: QueueProcessor> {
    queue: Arc<dyn WorkQueue>,
    processor: Arc<P>,
    dead_letters: Option<DeadLetterSink>,
    config: WorkerConfig,
    state: Mutex<WorkerState>,
    wakeup: Notify,
    metrics: QueueMetrics,
}

impl<P: QueueProcessor + 'static> QueueWorker<P> {
    /// Create a new worker.
    pub fn new(queue: Arc<dyn WorkQueue>, processor: P, config: WorkerConfig) -> Self {
        Self::with_arc_processor(queue, Arc::new(processor), config)
    }

    /// Create a new worker sharing an existing processor.
    pub fn with_arc_processor(
        queue: Arc<dyn WorkQueue>,
        processor: Arc<P>,
        config: WorkerConfig,
    ) -> Self {
        let metrics = QueueMetrics::new(config.queue_name.clone(), processor.name());

        Self {
            queue,
            processor,
            dead_letters: None,
            config,
            state: Mutex::new(WorkerState::default()),
            wakeup: Notify::new(),
            metrics,
        }
    }

    /// Attach a dead letter sink for jobs that finally fail.
    pub fn with_dead_letters(mut self, sink: DeadLetterSink) -> Self {
        self.dead_letters = Some(sink);
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Snapshot of the current worker state.
    pub async fn state(&self) -> WorkerState {
        self.state.lock().await.clone()
    }

    pub async fn is_busy(&self) -> bool {
        self.state.lock().await.busy
    }

    /// Handle a publish notification: enqueue the payload, then wake the loop.
    pub async fn on_publish(&self, payload: &str) -> Result<(), QueueError> {
        self.queue.push_back(payload).await?;
        self.metrics.job_published();
        self.trigger();
        Ok(())
    }

    /// Wake the run loop.
    ///
    /// A trigger that arrives while the loop is draining is remembered, so no
    /// notification is lost.
    pub fn trigger(&self) {
        self.wakeup.notify_one();
    }

    /// Run one processing cycle: pop at most one job and dispatch it.
    pub async fn process_cycle(&self) -> CycleOutcome {
        {
            let mut state = self.state.lock().await;
            if state.busy {
                info!(queue = %self.queue.name(), "Worker is busy");
                return CycleOutcome::Busy;
            }
            state.busy = true;
        }
        self.metrics.set_busy(true);

        debug!(queue = %self.queue.name(), "Worker task called");
        let outcome = self.run_cycle().await;

        {
            let mut state = self.state.lock().await;
            state.busy = false;
            state.active_message = None;
        }
        self.metrics.set_busy(false);

        outcome
    }

    /// Run cycles until the queue is empty (or a cycle cannot pop).
    pub async fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();

        loop {
            match self.process_cycle().await {
                CycleOutcome::Dispatched => report.dispatched += 1,
                CycleOutcome::Ignored => report.ignored += 1,
                CycleOutcome::Failed => report.failed += 1,
                CycleOutcome::QueueError => {
                    report.queue_errors += 1;
                    break;
                }
                CycleOutcome::Empty | CycleOutcome::Busy => break,
            }
        }

        report
    }

    async fn run_cycle(&self) -> CycleOutcome {
        let payload = match self.queue.pop_front().await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!(queue = %self.queue.name(), "Queue is empty");
                return CycleOutcome::Empty;
            }
            Err(e) => {
                self.metrics.queue_error();
                error!(queue = %self.queue.name(), error = %e, "Failed to pop from queue");
                return CycleOutcome::QueueError;
            }
        };

        self.state.lock().await.active_message = Some(payload.clone());
        self.metrics.job_received();

        let started = Instant::now();
        match self.dispatch(&payload).await {
            Ok(ProcessOutcome::Handled) => {
                self.metrics.job_processed(started.elapsed());
                info!(
                    queue = %self.queue.name(),
                    processor = self.processor.name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Worker task complete"
                );
                CycleOutcome::Dispatched
            }
            Ok(ProcessOutcome::Ignored) => {
                self.metrics.job_ignored();
                trace!(queue = %self.queue.name(), "No handler for payload");
                CycleOutcome::Ignored
            }
            Err(failure) => {
                self.handle_failure(failure).await;
                CycleOutcome::Failed
            }
        }
    }

    /// Process a payload, retrying transient failures as configured.
    async fn dispatch(&self, payload: &str) -> Result<ProcessOutcome, DispatchFailure> {
        let mut attempt: u32 = 0;

        loop {
            match self.processor.process(payload).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.should_retry(attempt, self.config.max_retries) => {
                    let delay = self.config.job_retry.delay_for(attempt);
                    attempt += 1;
                    self.metrics.job_retried();
                    warn!(
                        queue = %self.queue.name(),
                        attempt = attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Job failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(DispatchFailure {
                        error: e,
                        attempts: attempt + 1,
                    });
                }
            }
        }
    }

    async fn handle_failure(&self, failure: DispatchFailure) {
        let active = self.state.lock().await.active_message.clone().unwrap_or_default();
        let category = failure.error.category();
        self.metrics.job_failed(category);

        error!(
            queue = %self.queue.name(),
            processor = self.processor.name(),
            error = %failure.error,
            category = category.as_str(),
            attempts = failure.attempts,
            payload = %active,
            "Failed to process job"
        );

        let Some(sink) = &self.dead_letters else {
            return;
        };

        let letter = DeadLetter::new(active, &failure.error, failure.attempts);
        match sink.send(&letter).await {
            Ok(()) => self.metrics.job_dead_lettered(),
            Err(e) => {
                error!(
                    dead_letter_queue = %sink.name(),
                    error = %e,
                    payload = %letter.payload,
                    "Failed to dead-letter job, dropping it"
                );
            }
        }
    }

    /// Run the drain loop until shutdown.
    ///
    /// Drains whatever is already queued, then sleeps until a publish
    /// notification (or `trigger`) arrives. Queue failures back off
    /// exponentially before the next attempt.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), QueueError> {
        info!(
            queue = %self.queue.name(),
            channel = %self.config.channel,
            processor = self.processor.name(),
            max_retries = self.config.max_retries,
            dead_letter_queue = ?self.dead_letters.as_ref().map(|s| s.name().to_string()),
            "Worker now active"
        );

        let mut consecutive_errors: u32 = 0;

        loop {
            if *shutdown.borrow() {
                info!("Received shutdown signal, stopping worker");
                break;
            }

            match self.process_cycle().await {
                outcome if outcome.consumed_job() => {
                    consecutive_errors = 0;
                    continue;
                }
                CycleOutcome::QueueError => {
                    let delay = self.config.queue_backoff.delay_for(consecutive_errors);
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    warn!(
                        consecutive_errors = consecutive_errors,
                        backoff_ms = delay.as_millis() as u64,
                        "Queue error, backing off"
                    );

                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
                _ => {
                    if consecutive_errors > 0 {
                        info!("Queue recovered after {} errors", consecutive_errors);
                        consecutive_errors = 0;
                    }
                }
            }

            tokio::select! {
                _ = self.wakeup.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Received shutdown signal, stopping worker");
                        break;
                    }
                }
            }
        }

        info!(queue = %self.queue.name(), "Worker stopped");
        Ok(())
    }

    /// Forward channel notifications into the queue until the stream ends or
    /// shutdown is signalled.
    ///
    /// Returns `true` if the stream ended on its own (e.g. the subscription
    /// connection dropped) so the caller can resubscribe.
    pub async fn listen<S>(&self, notifications: S, mut shutdown: watch::Receiver<bool>) -> bool
    where
        S: Stream<Item = String> + Send,
    {
        let mut notifications = std::pin::pin!(notifications);

        loop {
            tokio::select! {
                next = notifications.next() => match next {
                    Some(payload) => {
                        if let Err(e) = self.on_publish(&payload).await {
                            error!(
                                queue = %self.queue.name(),
                                error = %e,
                                payload = %payload,
                                "Failed to enqueue published payload"
                            );
                        }
                    }
                    None => {
                        warn!(channel = %self.config.channel, "Notification stream ended");
                        return true;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return false;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryQueue;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counting {
        calls: AtomicU32,
    }

    #[async_trait]
    impl QueueProcessor for Counting {
        async fn process(&self, payload: &str) -> Result<ProcessOutcome, QueueError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match payload {
                "skip" => Ok(ProcessOutcome::Ignored),
                "boom" => Err(QueueError::permanent("boom")),
                _ => Ok(ProcessOutcome::Handled),
            }
        }

        fn name(&self) -> &'static str {
            "Counting"
        }
    }

    fn worker() -> (Arc<InMemoryQueue>, QueueWorker<Counting>) {
        let queue = Arc::new(InMemoryQueue::new("test:queue"));
        let worker = QueueWorker::new(
            queue.clone(),
            Counting {
                calls: AtomicU32::new(0),
            },
            WorkerConfig::new("test:queue", "test"),
        );
        (queue, worker)
    }

    #[tokio::test]
    async fn test_empty_queue_leaves_worker_idle() {
        let (_, worker) = worker();

        assert_eq!(worker.process_cycle().await, CycleOutcome::Empty);
        assert_eq!(worker.processor().calls.load(Ordering::SeqCst), 0);
        assert_eq!(worker.state().await, WorkerState::default());
    }

    #[tokio::test]
    async fn test_cycle_outcomes() {
        let (queue, worker) = worker();
        for payload in ["ok", "skip", "boom"] {
            worker.on_publish(payload).await.unwrap();
        }

        assert_eq!(worker.process_cycle().await, CycleOutcome::Dispatched);
        assert_eq!(worker.process_cycle().await, CycleOutcome::Ignored);
        assert_eq!(worker.process_cycle().await, CycleOutcome::Failed);
        assert_eq!(worker.process_cycle().await, CycleOutcome::Empty);
        assert!(queue.is_empty().await.unwrap());
        assert!(!worker.is_busy().await);
    }

    #[tokio::test]
    async fn test_drain_report() {
        let (_, worker) = worker();
        for payload in ["a", "boom", "skip", "b"] {
            worker.on_publish(payload).await.unwrap();
        }

        let report = worker.drain().await;
        assert_eq!(
            report,
            DrainReport {
                dispatched: 2,
                ignored: 1,
                failed: 1,
                queue_errors: 0
            }
        );
        assert_eq!(report.consumed(), 4);
    }

    #[test]
    fn test_ignored_and_failed_cycles_are_counted() {
        use crate::metrics::tests::{counter_value, entries};
        use metrics_util::debugging::DebuggingRecorder;

        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        // The local recorder is thread-scoped, so drive the worker on this thread.
        metrics::with_local_recorder(&recorder, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let (_, worker) = worker();
                for payload in ["skip", "skip", "boom", "ok"] {
                    worker.on_publish(payload).await.unwrap();
                }
                worker.drain().await;
            });
        });

        let entries = entries(&snapshotter);
        let labels = [("queue", "test:queue"), ("processor", "Counting")];
        assert_eq!(
            counter_value(&entries, "queue_worker_jobs_ignored_total", &labels),
            Some(2)
        );
        assert_eq!(
            counter_value(
                &entries,
                "queue_worker_jobs_processed_total",
                &[("status", "failed"), ("category", "permanent")]
            ),
            Some(1)
        );
        assert_eq!(
            counter_value(
                &entries,
                "queue_worker_jobs_processed_total",
                &[("status", "success")]
            ),
            Some(1)
        );
        assert_eq!(
            counter_value(&entries, "queue_worker_jobs_published_total", &[("queue", "test:queue")]),
            Some(4)
        );
    }
}
