//! Redis counter storage
//!
//! Externalizes the fixed-window counters so that multiple processes enforce
//! one shared limit. Window identity is baked into the key; stale windows
//! expire on their own.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use super::{epoch_secs, CounterStore, StoreError, WindowCount};

#[derive(Clone)]
pub struct RedisCounterStore {
    connection: ConnectionManager,
}

impl std::fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCounterStore")
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCounterStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr(&self, key: &str, window_secs: u64) -> Result<WindowCount, StoreError> {
        let now = epoch_secs();
        let window_id = now / window_secs;
        let redis_key = format!("ratelimit:{key}:{window_secs}:{window_id}");

        let mut connection = self.connection.clone();
        let count: u64 = connection
            .incr(&redis_key, 1)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if count == 1 {
            // First hit in this window owns the expiry.
            let _: () = connection
                .expire(&redis_key, window_secs as i64)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }

        Ok(WindowCount {
            count,
            reset_after_secs: window_secs - (now % window_secs),
        })
    }
}
