//! Answer cache backends and key derivation.
//!
//! Every operation is infallible from the caller's point of view: backend
//! errors are logged at `warn` and treated as a miss or a skipped write.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};

pub const HITS_KEY: &str = "ans:stats:hits";
pub const MISSES_KEY: &str = "ans:stats:misses";

/// Key-value store for generated answers.
#[async_trait]
pub trait AnswerCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64);

    async fn incr(&self, key: &str);
}

/// Derive the cache key for a question and its retrieved evidence.
///
/// The query is trimmed, whitespace-collapsed, and lowercased; tickers and
/// ids are sorted, so neither list's order affects the key.
#[must_use]
pub fn cache_key(query: &str, tickers: &[String], embedding_ids: &[i64]) -> String {
    let normalized = query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let mut tickers: Vec<&str> = tickers.iter().map(String::as_str).collect();
    tickers.sort_unstable();
    let mut ids = embedding_ids.to_vec();
    ids.sort_unstable();
    let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();

    let content = format!("{normalized}|{}|{}", tickers.join(","), ids.join(","));
    format!("ans:{}", hex::encode(Sha256::digest(content.as_bytes())))
}

// ---------------------------------------------------------------------------
// Redis
// ---------------------------------------------------------------------------

/// Redis-backed cache over a reconnecting [`ConnectionManager`].
#[derive(Clone)]
pub struct RedisAnswerCache {
    conn: ConnectionManager,
}

impl RedisAnswerCache {
    /// # Errors
    ///
    /// Returns [`redis::RedisError`] if the URL is invalid or the first
    /// connection cannot be made.
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl AnswerCache for RedisAnswerCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "answer cache read failed");
                None
            }
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) {
        let mut conn = self.conn.clone();
        if let Err(e) = conn.set_ex::<_, _, ()>(key, value, ttl_secs).await {
            tracing::warn!(error = %e, "answer cache write failed");
        }
    }

    async fn incr(&self, key: &str) {
        let mut conn = self.conn.clone();
        if let Err(e) = conn.incr::<_, _, i64>(key, 1).await {
            tracing::debug!(error = %e, key, "answer cache counter update failed");
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Entries {
    /// `None` expiry never lapses.
    values: HashMap<String, (String, Option<Instant>)>,
    counters: HashMap<String, i64>,
}

/// Process-local cache with per-entry expiry, for tests and single-shot CLI use.
#[derive(Default)]
pub struct InMemoryAnswerCache {
    entries: Mutex<Entries>,
}

impl InMemoryAnswerCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value of a counter key; `0` if never incremented.
    #[must_use]
    pub fn counter(&self, key: &str) -> i64 {
        self.entries().counters.get(key).copied().unwrap_or(0)
    }

    /// Number of live (unexpired) answers.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries()
            .values
            .values()
            .filter(|(_, expires)| expires.is_none_or(|at| at > now))
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AnswerCache for InMemoryAnswerCache {
    async fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries();
        let live = entries
            .values
            .get(key)
            .filter(|(_, expires)| expires.is_none_or(|at| at > now))
            .map(|(value, _)| value.clone());
        if live.is_none() {
            entries.values.remove(key);
        }
        live
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) {
        let expires = Instant::now().checked_add(Duration::from_secs(ttl_secs));
        self.entries()
            .values
            .insert(key.to_string(), (value.to_string(), expires));
    }

    async fn incr(&self, key: &str) {
        *self.entries().counters.entry(key.to_string()).or_insert(0) += 1;
    }
}

/// Cache that stores nothing. Used when no cache backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl AnswerCache for NoopCache {
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl_secs: u64) {}

    async fn incr(&self, _key: &str) {}
}
