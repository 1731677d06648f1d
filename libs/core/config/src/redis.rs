use crate::{env_optional, ConfigError, FromEnv};

/// Redis configuration
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub url: String,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::new("redis://127.0.0.1:6379")
    }
}

impl FromEnv for RedisConfig {
    /// Reads REDIS_URL, then REDIS_HOST, falling back to the local default.
    ///
    /// A bare host (no scheme) is turned into a `redis://` URL.
    fn from_env() -> Result<Self, ConfigError> {
        let raw = env_optional("REDIS_URL").or_else(|| env_optional("REDIS_HOST"));

        Ok(match raw {
            Some(url) if url.contains("://") => Self::new(url),
            Some(host) => Self::new(format!("redis://{}", host)),
            None => Self::default(),
        })
    }
}
