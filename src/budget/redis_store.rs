//! Redis-backed spend store.
//!
//! Uses [`redis::aio::ConnectionManager`] for automatic reconnection. Both
//! mutations run as Lua scripts so the read, the write and the TTL check
//! happen in one server-side step.
//!
//! Each spend key is a hash with a `total` field and a `period` field. The
//! period id comes from a per-key sequence (`{key}:periods`, no TTL) and is
//! assigned when the key first gets its expiry.
//!
//! Gated behind the `redis_backend` Cargo feature.

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Script};

use crate::budget::store::{PeriodId, ReserveResult, SpendStore, StoreError};

/// KEYS[1] = spend key, KEYS[2] = period sequence,
/// ARGV[1] = amount, ARGV[2] = limit, ARGV[3] = period seconds.
const RESERVE_SCRIPT: &str = r#"
local total = redis.call('HINCRBY', KEYS[1], 'total', ARGV[1])
if redis.call('TTL', KEYS[1]) < 0 then
    redis.call('HSET', KEYS[1], 'period', redis.call('INCR', KEYS[2]))
    redis.call('EXPIRE', KEYS[1], ARGV[3])
end
local period = tonumber(redis.call('HGET', KEYS[1], 'period'))
if total > tonumber(ARGV[2]) then
    return {0, total, period}
end
return {1, total, period}
"#;

/// KEYS[1] = spend key, ARGV[1] = amount, ARGV[2] = period id or "" for any.
const RELEASE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return 0
end
if ARGV[2] ~= '' and redis.call('HGET', KEYS[1], 'period') ~= ARGV[2] then
    return tonumber(redis.call('HGET', KEYS[1], 'total') or '0')
end
local total = redis.call('HINCRBY', KEYS[1], 'total', -tonumber(ARGV[1]))
if total < 0 then
    redis.call('HSET', KEYS[1], 'total', 0)
    total = 0
end
return total
"#;

fn period_key(key: &str) -> String {
    format!("{key}:periods")
}

fn unavailable(context: &'static str) -> impl Fn(redis::RedisError) -> StoreError {
    move |e| StoreError::Unavailable(format!("{context}: {e}"))
}

/// Redis [`SpendStore`] shared by every gate instance.
pub struct RedisSpendStore {
    conn: redis::aio::ConnectionManager,
    reserve: Script,
    release: Script,
}

impl RedisSpendStore {
    /// Connect to a Redis instance.
    ///
    /// The `url` should be a valid Redis connection string,
    /// e.g. `redis://127.0.0.1:6379` or `redis://:password@host:port/db`.
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(unavailable("Invalid Redis URL"))?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(unavailable("Failed to connect to Redis"))?;
        Ok(Self {
            conn,
            reserve: Script::new(RESERVE_SCRIPT),
            release: Script::new(RELEASE_SCRIPT),
        })
    }
}

#[async_trait]
impl SpendStore for RedisSpendStore {
    async fn reserve(
        &self,
        key: &str,
        amount: i64,
        limit: i64,
        period: Duration,
    ) -> Result<ReserveResult, StoreError> {
        let mut conn = self.conn.clone();
        let (allowed, total, period): (i64, i64, PeriodId) = self
            .reserve
            .key(key)
            .key(period_key(key))
            .arg(amount)
            .arg(limit)
            .arg(period.as_secs().max(1))
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable("Redis reserve script failed"))?;
        Ok(ReserveResult {
            allowed: allowed == 1,
            total,
            period,
        })
    }

    async fn release(
        &self,
        key: &str,
        amount: i64,
        period: Option<PeriodId>,
    ) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        self.release
            .key(key)
            .arg(amount)
            .arg(period.map(|p| p.to_string()).unwrap_or_default())
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable("Redis release script failed"))
    }

    async fn current(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .hget(key, "total")
            .await
            .map_err(unavailable("Redis HGET failed"))?;
        match raw {
            None => Ok(0),
            Some(value) => value.parse().map_err(|_| {
                StoreError::Malformed(format!("{key} holds non-integer '{value}'"))
            }),
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(unavailable("Redis PING failed"))?;
        Ok(())
    }
}
