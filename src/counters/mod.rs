// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared counter store backing rate limits, daily quotas, concurrency
//! slots and provider failure windows.
//!
//! Two implementations: `RedisCounterStore` for cross-instance deployments
//! and `MemoryCounterStore` for single-node use and tests. The Redis store
//! degrades per-call to an embedded in-process map when the connection is
//! down; under partition each process then throttles independently
//! (documented weaker guarantee).

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

pub type CounterResult<T> = std::result::Result<T, CounterError>;

/// Key-addressable counters with atomic increment-with-expiry.
///
/// `incr_with_window` must be atomic: two concurrent calls for the same
/// key observe distinct return values. The window is attached only when
/// the increment creates the key, so the expiry is anchored to the first
/// hit in the window rather than sliding.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key`, creating it with `window` expiry if absent.
    /// Returns the post-increment count.
    async fn incr_with_window(&self, key: &str, window: Duration) -> CounterResult<u64>;

    /// Current count for `key`; 0 for missing or expired keys. Never writes.
    async fn get(&self, key: &str) -> CounterResult<u64>;

    /// Decrement `key`, floored at zero. Returns the post-decrement count.
    async fn decr(&self, key: &str) -> CounterResult<u64>;

    /// Remaining lifetime of `key`, or `None` when missing/expired.
    async fn ttl(&self, key: &str) -> CounterResult<Option<Duration>>;
}

// --- In-process implementation ---

/// Process-local counter map. Same semantics as the Redis store but scoped
/// to a single process; consistency across instances is explicitly not
/// provided.
#[derive(Default)]
pub struct MemoryCounterStore {
    entries: RwLock<HashMap<String, (u64, Instant)>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr_with_window(&self, key: &str, window: Duration) -> CounterResult<u64> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some((count, expiry)) if *expiry > now => {
                *count += 1;
                Ok(*count)
            }
            _ => {
                // Missing or expired: the window restarts with this hit
                entries.insert(key.to_string(), (1, now + window));
                Ok(1)
            }
        }
    }

    async fn get(&self, key: &str) -> CounterResult<u64> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(match entries.get(key) {
            Some((count, expiry)) if *expiry > now => *count,
            _ => 0,
        })
    }

    async fn decr(&self, key: &str) -> CounterResult<u64> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some((count, expiry)) if *expiry > now => {
                *count = count.saturating_sub(1);
                Ok(*count)
            }
            _ => Ok(0),
        }
    }

    async fn ttl(&self, key: &str) -> CounterResult<Option<Duration>> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(match entries.get(key) {
            Some((_, expiry)) if *expiry > now => Some(*expiry - now),
            _ => None,
        })
    }
}

// --- Redis implementation ---

/// INCR + conditional EXPIRE as one atomic unit. NX keeps the window
/// anchored to the first hit; DECR is floored at zero server-side.
const INCR_WITH_WINDOW_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

const DECR_FLOOR_SCRIPT: &str = r#"
local count = redis.call('GET', KEYS[1])
if not count or tonumber(count) <= 0 then
    return 0
end
return redis.call('DECR', KEYS[1])
"#;

/// Redis-backed counter store with an embedded in-process fallback map.
///
/// Every operation tries Redis first; on a connection error it logs at
/// debug and serves the same operation from the local map so the request
/// path keeps working without cross-instance consistency.
pub struct RedisCounterStore {
    conn: redis::aio::ConnectionManager,
    incr_script: redis::Script,
    decr_script: redis::Script,
    fallback: MemoryCounterStore,
}

impl RedisCounterStore {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        debug!("Counter store connected: {}", redis_url);
        Ok(Self {
            conn,
            incr_script: redis::Script::new(INCR_WITH_WINDOW_SCRIPT),
            decr_script: redis::Script::new(DECR_FLOOR_SCRIPT),
            fallback: MemoryCounterStore::new(),
        })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr_with_window(&self, key: &str, window: Duration) -> CounterResult<u64> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<u64> = self
            .incr_script
            .key(key)
            .arg(window.as_millis() as u64)
            .invoke_async(&mut conn)
            .await;
        match result {
            Ok(count) => Ok(count),
            Err(e) => {
                warn!("Counter store incr failed, using local fallback: {}", e);
                self.fallback.incr_with_window(key, window).await
            }
        }
    }

    async fn get(&self, key: &str) -> CounterResult<u64> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<Option<u64>> =
            redis::cmd("GET").arg(key).query_async(&mut conn).await;
        match result {
            Ok(count) => Ok(count.unwrap_or(0)),
            Err(e) => {
                debug!("Counter store get failed, using local fallback: {}", e);
                self.fallback.get(key).await
            }
        }
    }

    async fn decr(&self, key: &str) -> CounterResult<u64> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<u64> =
            self.decr_script.key(key).invoke_async(&mut conn).await;
        match result {
            Ok(count) => Ok(count),
            Err(e) => {
                warn!("Counter store decr failed, using local fallback: {}", e);
                self.fallback.decr(key).await
            }
        }
    }

    async fn ttl(&self, key: &str) -> CounterResult<Option<Duration>> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<i64> =
            redis::cmd("PTTL").arg(key).query_async(&mut conn).await;
        match result {
            // PTTL returns -1 (no expiry) and -2 (missing) as negatives
            Ok(ms) if ms >= 0 => Ok(Some(Duration::from_millis(ms as u64))),
            Ok(_) => Ok(None),
            Err(e) => {
                debug!("Counter store ttl failed, using local fallback: {}", e);
                self.fallback.ttl(key).await
            }
        }
    }
}
