//! Redis-backed value store client.

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::{StoreError, ValueStore};
use stationview_types::ValueRecord;

/// Value store backed by a Redis connection manager.
///
/// The manager multiplexes one reconnecting connection, so the store is
/// cheap to clone and share across resolutions.
#[derive(Clone)]
pub struct RedisValueStore {
    manager: ConnectionManager,
}

impl RedisValueStore {
    /// Connect to a Redis instance by URL, e.g. `redis://127.0.0.1:6379/0`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(|error| StoreError::value("connect", url, error))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|error| StoreError::value("connect", url, error))?;
        debug!(url, "connected to redis value store");
        Ok(Self { manager })
    }

    /// Wrap an existing connection manager.
    pub fn from_manager(manager: ConnectionManager) -> Self {
        Self { manager }
    }
}

impl fmt::Debug for RedisValueStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisValueStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl ValueStore for RedisValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.manager.clone();
        connection
            .get(key)
            .await
            .map_err(|error| StoreError::value("GET", key, error))
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.manager.clone();
        connection
            .hget(key, field)
            .await
            .map_err(|error| StoreError::value("HGET", key, error))
    }

    async fn hash_get_all(&self, key: &str) -> Result<ValueRecord, StoreError> {
        let mut connection = self.manager.clone();
        connection
            .hgetall(key)
            .await
            .map_err(|error| StoreError::value("HGETALL", key, error))
    }

    async fn hash_get_all_many(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, ValueRecord>, StoreError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut pipeline = redis::pipe();
        for key in keys {
            pipeline.hgetall(key);
        }

        let mut connection = self.manager.clone();
        let fetched: Vec<ValueRecord> = pipeline
            .query_async(&mut connection)
            .await
            .map_err(|error| StoreError::value("HGETALL pipeline", keys.join(","), error))?;

        Ok(keys.iter().cloned().zip(fetched).collect())
    }
}
