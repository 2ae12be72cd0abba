//! Redis-backed state store for multi-instance coordination.
//!
//! Uses Redis for atomic operations and automatic expiration of state data.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use super::StateStore;
use crate::error::{OrchestratorError, OrchestratorResult};

/// Redis-backed state storage.
#[derive(Clone)]
pub struct RedisStateStore {
    conn: ConnectionManager,
}

impl RedisStateStore {
    /// Connect to Redis.
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    pub async fn connect(redis_url: &str) -> OrchestratorResult<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| {
            OrchestratorError::StateStoreUnavailable(format!("Redis connection error: {}", e))
        })?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            OrchestratorError::StateStoreUnavailable(format!(
                "Redis connection manager error: {}",
                e
            ))
        })?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn get(&self, key: &str) -> OrchestratorResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| OrchestratorError::StateStoreUnavailable(e.to_string()))?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> OrchestratorResult<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| OrchestratorError::StateStoreUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn incr_ex(&self, key: &str, ttl: Duration) -> OrchestratorResult<u64> {
        let mut conn = self.conn.clone();

        // Lua script so the increment and the expiry arm atomically.
        let script = Script::new(
            r#"
            local value = redis.call('INCR', KEYS[1])
            if value == 1 then
                redis.call('EXPIRE', KEYS[1], ARGV[1])
            end
            return value
        "#,
        );

        let value: i64 = script
            .key(key)
            .arg(ttl.as_secs().max(1))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| OrchestratorError::StateStoreUnavailable(e.to_string()))?;

        Ok(value.max(0) as u64)
    }

    async fn delete(&self, key: &str) -> OrchestratorResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| OrchestratorError::StateStoreUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}
