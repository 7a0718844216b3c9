//! Redis implementation of [`CacheClient`].

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ClientError;
use crate::probes::cache::CacheClient;

/// Redis client over a `ConnectionManager`, which reconnects on its own.
#[derive(Clone)]
pub struct RedisCacheClient {
    connection_manager: redis::aio::ConnectionManager,
}

impl std::fmt::Debug for RedisCacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheClient")
            .field("connection_manager", &"ConnectionManager")
            .finish()
    }
}

impl RedisCacheClient {
    /// Connects to `url`.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let client = redis::Client::open(url)
            .map_err(|e| ClientError::Unavailable(format!("invalid Redis URL: {}", e)))?;

        let connection_manager = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| ClientError::Unavailable(format!("failed to connect to Redis: {}", e)))?;

        debug!(url = %redact_url(url), "Redis health client connected");
        Ok(Self { connection_manager })
    }
}

fn command_error(command: &str, err: redis::RedisError) -> ClientError {
    if err.is_connection_refusal() || err.is_io_error() || err.is_timeout() {
        ClientError::Unavailable(format!("Redis {} failed: {}", command, err))
    } else {
        ClientError::Command(format!("Redis {} failed: {}", command, err))
    }
}

#[async_trait]
impl CacheClient for RedisCacheClient {
    async fn ping(&self) -> Result<String, ClientError> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| command_error("PING", e))
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), ClientError> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| command_error("SET", e))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(|e| command_error("GET", e))
    }

    async fn delete(&self, key: &str) -> Result<(), ClientError> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| command_error("DEL", e))
    }

    async fn info(&self) -> Result<String, ClientError> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("INFO")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| command_error("INFO", e))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, ClientError> {
        let mut conn = self.connection_manager.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        // SCAN rather than KEYS, which blocks the server.
        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| command_error("SCAN", e))?;

            keys.extend(batch);
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }
}

/// Redacts the password of a Redis URL for logging.
fn redact_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let prefix = &url[..=colon_pos];
            let suffix = &url[at_pos..];
            return format!("{}***{}", prefix, suffix);
        }
    }
    url.to_string()
}
