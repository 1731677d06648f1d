//! Redis plumbing: connections, the list-backed queue, and the pub/sub channel.

use crate::error::QueueError;
use crate::queue::WorkQueue;
use crate::retry::{retry, retry_with_backoff, RetryConfig};
use async_trait::async_trait;
use futures::future;
use futures::stream::{BoxStream, StreamExt};
use redis::Client;
use redis::aio::ConnectionManager;
use tracing::{debug, info, warn};

/// Connect to Redis and return a ConnectionManager
///
/// The ConnectionManager automatically handles connection failures and reconnections.
pub async fn connect(url: &str) -> redis::RedisResult<ConnectionManager> {
    info!("Attempting to connect to Redis at {}", url);

    let client = Client::open(url)?;
    let manager = ConnectionManager::new(client).await?;

    // Verify connection with PING
    let mut conn = manager.clone();
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;

    info!("Successfully connected to Redis");
    Ok(manager)
}

/// Connect to Redis with automatic retry on failure
pub async fn connect_with_retry(
    url: &str,
    retry_config: Option<RetryConfig>,
) -> redis::RedisResult<ConnectionManager> {
    let url_owned = url.to_string();

    match retry_config {
        Some(config) => retry_with_backoff(|| connect(&url_owned), config).await,
        None => retry(|| connect(&url_owned)).await,
    }
}

/// Subscribe to a pub/sub channel and yield each message payload.
///
/// The stream ends when the subscription connection is lost; callers
/// resubscribe if they want to keep listening.
pub async fn subscribe(client: &Client, channel: &str) -> Result<BoxStream<'static, String>, QueueError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;

    info!(channel = %channel, "Subscribed to channel");

    let channel = channel.to_string();
    let stream = pubsub.into_on_message().filter_map(move |msg| {
        let payload = match msg.get_payload::<String>() {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(channel = %channel, error = %e, "Dropping unreadable channel message");
                None
            }
        };
        future::ready(payload)
    });

    Ok(stream.boxed())
}

/// FIFO queue stored in a Redis list (`RPUSH` to enqueue, `LPOP` to dequeue).
#[derive(Clone)]
pub struct RedisListQueue {
    redis: ConnectionManager,
    key: String,
}

impl RedisListQueue {
    pub fn new(redis: ConnectionManager, key: impl Into<String>) -> Self {
        Self {
            redis,
            key: key.into(),
        }
    }

}

#[async_trait]
impl WorkQueue for RedisListQueue {
    async fn push_back(&self, payload: &str) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();

        let length: i64 = redis::cmd("RPUSH")
            .arg(&self.key)
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        debug!(queue = %self.key, length = length, "Pushed payload");
        Ok(())
    }

    async fn pop_front(&self) -> Result<Option<String>, QueueError> {
        let mut conn = self.redis.clone();

        let payload: Option<String> = redis::cmd("LPOP")
            .arg(&self.key)
            .query_async(&mut conn)
            .await?;

        Ok(payload)
    }

    async fn len(&self) -> Result<usize, QueueError> {
        let mut conn = self.redis.clone();

        let length: usize = redis::cmd("LLEN")
            .arg(&self.key)
            .query_async(&mut conn)
            .await?;

        Ok(length)
    }

    async fn trim(&self, max_len: usize) -> Result<usize, QueueError> {
        let mut conn = self.redis.clone();
        let before = self.len().await?;

        // LTRIM with start > stop empties the list
        let (start, stop) = match max_len {
            0 => (1, 0),
            n => (-(n as i64), -1),
        };
        let _: () = redis::cmd("LTRIM")
            .arg(&self.key)
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await?;

        Ok(before.saturating_sub(max_len))
    }

    fn name(&self) -> &str {
        &self.key
    }
}

/// Publishes payloads on a pub/sub channel.
#[derive(Clone)]
pub struct ChannelPublisher {
    redis: ConnectionManager,
    channel: String,
}

impl ChannelPublisher {
    pub fn new(redis: ConnectionManager, channel: impl Into<String>) -> Self {
        Self {
            redis,
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Publish a payload, returning the number of subscribers that received it.
    ///
    /// Pub/sub is fire-and-forget: with no worker subscribed the payload is lost.
    pub async fn publish(&self, payload: &str) -> Result<usize, QueueError> {
        let mut conn = self.redis.clone();

        let receivers: usize = redis::cmd("PUBLISH")
            .arg(&self.channel)
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        if receivers == 0 {
            warn!(channel = %self.channel, "Published payload but no worker is subscribed");
        } else {
            debug!(channel = %self.channel, receivers = receivers, "Published payload");
        }

        Ok(receivers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires actual Redis
    async fn test_connect() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let result = connect(&redis_url).await;
        assert!(result.is_ok());
    }
}
