//! ResponseCache — TTL key/value memoization for AI responses and listings.
//!
//! Cache unavailability must degrade performance, never correctness: every
//! backend failure is logged and turned into a miss or a no-op, so callers
//! never see an error from this layer.

use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

/// Session listings go stale within minutes of a mutation anyway.
pub const SESSIONS_TTL_SECS: u64 = 300;
/// AI explanations are deterministic per prompt; keep them for an hour.
pub const AI_RESPONSES_TTL_SECS: u64 = 3600;

pub fn sessions_key(owner_id: Uuid) -> String {
    format!("sessions:user:{owner_id}")
}

pub fn explanation_key(prompt_hash: &str) -> String {
    format!("ai:response:{prompt_hash}")
}

pub fn bulk_explanation_key(bulk_hash: &str) -> String {
    format!("ai:bulk:{bulk_hash}")
}

/// Shared, last-writer-wins TTL store. Carried in `AppState` as
/// `Arc<dyn ResponseCache>`.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;
    async fn set(&self, key: &str, value: &Value, ttl_secs: u64);
    async fn delete(&self, key: &str);
}

/// Redis-backed cache. Any connection or command failure degrades to a miss.
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Option<redis::aio::MultiplexedConnection> {
        match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!("Redis connection failed, treating as cache miss: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl ResponseCache for RedisCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let mut conn = self.connection().await?;
        let raw = match conn.get::<_, Option<String>>(key).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Cache get failed for '{key}': {e}");
                return None;
            }
        };
        raw.and_then(|s| match serde_json::from_str(&s) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Cache entry '{key}' held invalid JSON, ignoring: {e}");
                None
            }
        })
    }

    async fn set(&self, key: &str, value: &Value, ttl_secs: u64) {
        let Some(mut conn) = self.connection().await else {
            return;
        };
        let payload = value.to_string();
        if let Err(e) = conn.set_ex::<_, _, ()>(key, payload, ttl_secs).await {
            warn!("Cache set failed for '{key}': {e}");
        }
    }

    async fn delete(&self, key: &str) {
        let Some(mut conn) = self.connection().await else {
            return;
        };
        if let Err(e) = conn.del::<_, ()>(key).await {
            warn!("Cache delete failed for '{key}': {e}");
        }
    }
}

/// Stand-in when no `REDIS_URL` is configured: everything is a miss.
pub struct NoopCache;

#[async_trait]
impl ResponseCache for NoopCache {
    async fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    async fn set(&self, _key: &str, _value: &Value, _ttl_secs: u64) {}

    async fn delete(&self, _key: &str) {}
}

/// In-memory cache for tests. TTLs are ignored; tests assert on presence.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryCache {
    entries: std::sync::Mutex<std::collections::HashMap<String, Value>>,
}

#[cfg(test)]
#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    async fn set(&self, key: &str, value: &Value, _ttl_secs: u64) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.clone());
    }

    async fn delete(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}
