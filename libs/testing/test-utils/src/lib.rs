//! Shared test utilities
//!
//! - `TestRedis`: Redis container with automatic cleanup
//!
//! Tests using these helpers need a running Docker daemon and are marked
//! `#[ignore]` in the crates that use them.
//!
//! ```rust,ignore
//! use test_utils::TestRedis;
//!
//! #[tokio::test]
//! #[ignore] // Requires Docker
//! async fn my_redis_test() {
//!     let redis = TestRedis::new().await;
//!     let manager = redis.connection_manager().await;
//!     let key = redis.unique_key("mailQueue");
//! }
//! ```

mod redis_container;

pub use redis_container::TestRedis;
