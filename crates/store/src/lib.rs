//! Collaborator store contracts and clients.
//!
//! The resolution engine talks to two external collaborators: a key-value
//! store holding the precomputed station documents, the template
//! dictionaries, and the live-value hashes; and a relational store holding
//! the flat station node rows used by the legacy scan path. Both are
//! expressed as injected trait objects so the engine never reaches into
//! global client state and unit tests can substitute in-memory fakes.
//!
//! Production implementations:
//!
//! - [`RedisValueStore`] — the key-value contract over a Redis connection
//!   manager, with a pipelined batch read.
//! - [`PgNodeStore`] — the relational contract over a Postgres pool,
//!   issuing the single node-row scan.
//!
//! In-memory implementations ([`MemoryValueStore`], [`MemoryNodeStore`])
//! back the engine's tests and are usable for embedding.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use stationview_types::{StationNode, ValueRecord};

mod memory;
mod relational;
mod value;

pub use memory::{MemoryNodeStore, MemoryValueStore};
pub use relational::PgNodeStore;
pub use value::RedisValueStore;

/// Errors surfaced by store operations.
///
/// Every variant names the operation and key (or station) that failed so
/// callers can diagnose without retrying; retry and backoff policy belongs
/// to the backend clients, never to the engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A value-store call failed.
    #[error("value store {op} failed for key '{key}'")]
    Value {
        /// Store operation that failed, e.g. `GET` or `HGETALL`.
        op: &'static str,
        /// Key the operation addressed.
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The node-row scan failed.
    #[error("node scan failed for station '{station_id}'")]
    Nodes {
        /// Station whose rows were being fetched.
        station_id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    /// Wrap a failed value-store call with its operation and key.
    pub fn value(
        op: &'static str,
        key: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Value {
            op,
            key: key.into(),
            source: source.into(),
        }
    }

    /// Wrap a failed node scan with its station identifier.
    pub fn nodes(
        station_id: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Nodes {
            station_id: station_id.into(),
            source: source.into(),
        }
    }
}

/// Key-value store contract consumed by the resolution engine.
///
/// Absence is not an error: a missing key yields `None` (or an empty record
/// for hashes); only transport failures surface as [`StoreError`].
#[async_trait]
pub trait ValueStore: Send + Sync {
    /// Plain string read.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Single field read from a hash.
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// Full hash read; absent keys yield an empty record.
    async fn hash_get_all(&self, key: &str) -> Result<ValueRecord, StoreError>;

    /// Batched full-hash read for several keys.
    ///
    /// The default implementation loops [`ValueStore::hash_get_all`];
    /// backends with pipelining override it with a single round trip.
    async fn hash_get_all_many(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, ValueRecord>, StoreError> {
        let mut records = HashMap::with_capacity(keys.len());
        for key in keys {
            records.insert(key.clone(), self.hash_get_all(key).await?);
        }
        Ok(records)
    }
}

/// Relational store contract: the single node-row scan for one station.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// All node rows for a station, ordered by id.
    async fn station_nodes(&self, station_id: &str) -> Result<Vec<StationNode>, StoreError>;
}
