//! Redis test infrastructure
//!
//! Provides a `TestRedis` helper that creates a Redis container for testing.

use redis::Client;
use redis::aio::ConnectionManager;
use std::sync::atomic::{AtomicU64, Ordering};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

static KEY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Test Redis wrapper that ensures proper cleanup
///
/// The container is automatically stopped and removed when this struct is dropped.
pub struct TestRedis {
    #[allow(dead_code)]
    container: ContainerAsync<Redis>,
    client: Client,
    pub connection_string: String,
}

impl TestRedis {
    /// Create a new test Redis instance (Redis 8 Alpine image).
    pub async fn new() -> Self {
        let container = Redis::default()
            .with_tag("8-alpine")
            .start()
            .await
            .expect("Failed to start Redis container");

        let host_port = container
            .get_host_port_ipv4(6379)
            .await
            .expect("Failed to get Redis port");

        let connection_string = format!("redis://127.0.0.1:{}", host_port);

        let client = Client::open(connection_string.clone())
            .expect("Failed to create Redis client");

        tracing::info!(port = host_port, "Test Redis ready (Redis 8-alpine)");

        Self {
            container,
            client,
            connection_string,
        }
    }

    /// A client for opening pub/sub connections.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// A reconnecting connection manager, as used by the queue crates.
    pub async fn connection_manager(&self) -> ConnectionManager {
        ConnectionManager::new(self.client.clone())
            .await
            .expect("Failed to create ConnectionManager")
    }

    /// Get the connection string for manual client creation
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// A key name unique within this test process, so tests sharing a
    /// container do not see each other's lists.
    pub fn unique_key(&self, prefix: &str) -> String {
        let n = KEY_COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("{}:test:{}", prefix, n)
    }
}

impl Drop for TestRedis {
    fn drop(&mut self) {
        tracing::debug!("Cleaning up test Redis container");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_list_push_pop() {
        let redis = TestRedis::new().await;
        let mut conn = redis.connection_manager().await;
        let key = redis.unique_key("list");

        let _: i64 = redis::cmd("RPUSH")
            .arg(&key)
            .arg("item1")
            .query_async(&mut conn)
            .await
            .unwrap();
        let item: Option<String> = redis::cmd("LPOP")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .unwrap();
        assert_eq!(item.as_deref(), Some("item1"));
    }
}
