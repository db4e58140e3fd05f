//! Redis-backed store

use std::time::Duration;

use async_trait::async_trait;
use market_core::{MarketError, MarketResult};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError, Script};
use tracing::info;

use super::KeyValueStore;

/// INCR and, only when the key has no TTL yet, PEXPIRE in one atomic step
const INCR_WITH_EXPIRY_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {count, ttl}
"#;

fn store_error(e: RedisError) -> MarketError {
    MarketError::store(format!("redis: {}", e))
}

fn millis(ttl: Duration) -> u64 {
    ttl.as_millis().clamp(1, u64::MAX as u128) as u64
}

/// A `KeyValueStore` over a multiplexed Redis connection
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    incr_script: Script,
}

impl RedisStore {
    pub async fn connect(url: &str) -> MarketResult<Self> {
        let client = redis::Client::open(url).map_err(store_error)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(store_error)?;

        info!("Connected to Redis");

        Ok(Self {
            conn,
            incr_script: Script::new(INCR_WITH_EXPIRY_SCRIPT),
        })
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> MarketResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key).await.map_err(store_error)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> MarketResult<()> {
        let mut conn = self.conn.clone();
        if ttl.is_zero() {
            conn.set::<_, _, ()>(key, value).await.map_err(store_error)
        } else {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("PX")
                .arg(millis(ttl))
                .query_async::<_, ()>(&mut conn)
                .await
                .map_err(store_error)
        }
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> MarketResult<bool> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if !ttl.is_zero() {
            cmd.arg("PX").arg(millis(ttl));
        }

        let reply: Option<String> = cmd.query_async(&mut conn).await.map_err(store_error)?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> MarketResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(store_error)
    }

    async fn exists(&self, key: &str) -> MarketResult<bool> {
        let mut conn = self.conn.clone();
        conn.exists::<_, bool>(key).await.map_err(store_error)
    }

    async fn incr_with_expiry(&self, key: &str, window: Duration) -> MarketResult<(u64, Duration)> {
        let mut conn = self.conn.clone();
        let (count, ttl_ms): (i64, i64) = self
            .incr_script
            .key(key)
            .arg(millis(window))
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;

        Ok((
            count.max(0) as u64,
            Duration::from_millis(ttl_ms.max(0) as u64),
        ))
    }
}
