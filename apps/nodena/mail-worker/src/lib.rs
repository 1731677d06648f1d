//! Mail Worker Service
//!
//! Delivers NodeNA transactional email announced on a Redis channel.
//!
//! ## Architecture
//!
//! ```text
//! Redis Pub/Sub (email)
//!   ↓ (RPUSH)
//! Redis List (mailQueue)
//!   ↓ (LPOP, one job at a time)
//! QueueWorker<MailProcessor>
//!   ↓ (render template by `type`)
//! EmailProvider / Newsletter
//!   ↓
//! Mailgun, SMTP or the log
//! ```
//!
//! ## Features
//!
//! - Single in-flight job, FIFO order
//! - Resubscribes when the pub/sub connection drops
//! - Optional retries and dead letter queue
//! - Graceful shutdown handling

pub mod config;

use config::MailWorkerSettings;
use core_config::{Environment, FromEnv};
use domain_mailer::{
    EmailProvider, LocalNewsletter, LogProvider, MailProcessor, MailgunConfig, MailgunNewsletter,
    MailgunProvider, Newsletter, ProviderKind, SmtpProvider, TemplateEngine,
};
use eyre::{Result, WrapErr};
use queue_worker::{
    DeadLetterSink, QueueProcessor, QueueWorker, RedisListQueue, RetryConfig, subscribe,
};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Run the mail worker
///
/// This is the main entry point for the worker. It:
/// 1. Sets up structured logging (env-aware: JSON for prod, pretty for dev)
/// 2. Builds the provider, newsletter and templates
/// 3. Connects to Redis and subscribes to the mail channel
/// 4. Drains the mail queue until SIGINT or SIGTERM
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - A template cannot be compiled
/// - Redis connection fails
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();

    // Initialize tracing (env-aware: JSON for prod, pretty for dev)
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        "Starting mail worker service"
    );
    info!("Environment: {:?}", environment);

    let settings = MailWorkerSettings::from_env().wrap_err("Failed to load mail worker configuration")?;

    let templates = match &settings.template_dir {
        Some(dir) => TemplateEngine::from_dir(dir)
            .wrap_err_with(|| format!("Failed to load templates from {}", dir.display()))?,
        None => TemplateEngine::new().wrap_err("Failed to compile built-in templates")?,
    };

    let (provider, newsletter) = build_delivery(settings.provider)?;
    info!(
        provider = provider.name(),
        newsletter = newsletter.name(),
        "Mail delivery configured"
    );

    let processor = MailProcessor::new(provider, newsletter, Arc::new(templates));
    check_delivery(&processor).await;

    // Connect to Redis with retry logic
    info!("Connecting to Redis...");
    let client = redis::Client::open(settings.redis.url.as_str()).wrap_err("Invalid Redis URL")?;
    let redis = queue_worker::connect_with_retry(&settings.redis.url, None)
        .await
        .wrap_err("Failed to connect to Redis")?;
    info!("Connected to Redis successfully");

    let worker_config = settings.worker.clone();
    info!(
        queue = %worker_config.queue_name,
        channel = %worker_config.channel,
        dead_letter_queue = ?worker_config.dead_letter_queue,
        max_retries = worker_config.max_retries,
        "Worker configuration loaded"
    );

    let worker = Arc::new(build_worker(redis, processor, worker_config));

    // Set up a shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!("Error waiting for shutdown signal: {}", e);
        }
        let _ = shutdown_tx.send(true);
    });

    let listener = {
        let worker = Arc::clone(&worker);
        let channel = settings.worker.channel.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { listen(worker, client, channel, shutdown).await })
    };

    // Run the worker
    worker
        .run(shutdown_rx)
        .await
        .wrap_err("Mail worker failed")?;

    if let Err(e) = listener.await {
        warn!(error = %e, "Channel listener task failed");
    }

    info!("Mail worker service stopped");
    Ok(())
}

/// Pick the provider and newsletter for the configured delivery mode.
fn build_delivery(kind: ProviderKind) -> Result<(Arc<dyn EmailProvider>, Arc<dyn Newsletter>)> {
    match kind {
        ProviderKind::Mailgun => {
            let config = MailgunConfig::from_env().wrap_err("Failed to load Mailgun configuration")?;
            let provider: Arc<dyn EmailProvider> = Arc::new(MailgunProvider::new(config.clone()));
            let newsletter = MailgunNewsletter::new(config, Arc::clone(&provider))
                .wrap_err("Failed to configure the Mailgun newsletter")?;
            Ok((provider, Arc::new(newsletter)))
        }
        ProviderKind::Smtp => {
            let provider: Arc<dyn EmailProvider> =
                Arc::new(SmtpProvider::from_env().wrap_err("Failed to configure SMTP")?);
            Ok((Arc::clone(&provider), Arc::new(LocalNewsletter::new(provider))))
        }
        ProviderKind::Log => {
            let provider: Arc<dyn EmailProvider> = Arc::new(LogProvider::new());
            Ok((Arc::clone(&provider), Arc::new(LocalNewsletter::new(provider))))
        }
    }
}

/// Probe the provider once at startup. Failures only warn: jobs stay queued
/// and individual sends report their own errors.
async fn check_delivery(processor: &MailProcessor) {
    match processor.health_check().await {
        Ok(true) => info!("Mail provider is reachable"),
        Ok(false) => warn!("Mail provider health check failed"),
        Err(e) => warn!(error = %e, "Mail provider health check errored"),
    }
}

fn build_worker(
    redis: ConnectionManager,
    processor: MailProcessor,
    config: queue_worker::WorkerConfig,
) -> QueueWorker<MailProcessor> {
    let queue = Arc::new(RedisListQueue::new(redis.clone(), config.queue_name.clone()));
    let dead_letters = config
        .dead_letter_queue
        .clone()
        .map(|name| {
            let sink = DeadLetterSink::new(Arc::new(RedisListQueue::new(redis, name)));
            match config.dead_letter_max_length {
                Some(max_length) => sink.with_max_length(max_length),
                None => sink,
            }
        });

    let worker = QueueWorker::new(queue, processor, config);
    match dead_letters {
        Some(sink) => worker.with_dead_letters(sink),
        None => worker,
    }
}

/// Keep the channel subscription alive until shutdown, resubscribing with
/// backoff whenever it drops.
async fn listen(
    worker: Arc<QueueWorker<MailProcessor>>,
    client: redis::Client,
    channel: String,
    mut shutdown: watch::Receiver<bool>,
) {
    let backoff = RetryConfig::new().with_initial_delay(1000).with_max_delay(30_000);
    let mut failures: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        match subscribe(&client, &channel).await {
            Ok(notifications) => {
                failures = 0;
                // Catch up on anything queued while we were not subscribed
                worker.trigger();
                if !worker.listen(notifications, shutdown.clone()).await {
                    break;
                }
            }
            Err(e) => {
                error!(channel = %channel, error = %e, "Failed to subscribe to channel");
            }
        }

        let delay = backoff.delay_for(failures);
        failures = failures.saturating_add(1);
        warn!(channel = %channel, delay_ms = delay.as_millis() as u64, "Resubscribing");

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }

    info!(channel = %channel, "Channel listener stopped");
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
        .wrap_err("Failed to install SIGTERM handler")?;

    #[cfg(unix)]
    let terminate = terminate.recv();

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Option<()>>();

    tokio::select! {
        result = signal::ctrl_c() => {
            result.wrap_err("Failed to listen for Ctrl+C")?;
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }

    Ok(())
}
