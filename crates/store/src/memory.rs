//! In-memory store implementations.
//!
//! These back the engine's unit and integration tests, and are handy for
//! embedding the engine without external services.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::{NodeStore, StoreError, ValueStore};
use stationview_types::{StationNode, ValueRecord};

/// In-memory implementation of the key-value contract.
#[derive(Debug, Default, Clone)]
pub struct MemoryValueStore {
    strings: Arc<Mutex<HashMap<String, String>>>,
    hashes: Arc<Mutex<HashMap<String, ValueRecord>>>,
}

impl MemoryValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a plain string value.
    pub fn put_string(&self, key: &str, value: &str) {
        self.strings
            .lock()
            .expect("string table lock")
            .insert(key.to_string(), value.to_string());
    }

    /// Store (or extend) a hash with the given field/value pairs.
    pub fn put_hash(&self, key: &str, entries: &[(&str, &str)]) {
        let mut hashes = self.hashes.lock().expect("hash table lock");
        let record = hashes.entry(key.to_string()).or_default();
        for (field, value) in entries {
            record.insert((*field).to_string(), (*value).to_string());
        }
    }
}

#[async_trait]
impl ValueStore for MemoryValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.strings.lock().expect("string table lock").get(key).cloned())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .hashes
            .lock()
            .expect("hash table lock")
            .get(key)
            .and_then(|record| record.get(field).cloned()))
    }

    async fn hash_get_all(&self, key: &str) -> Result<ValueRecord, StoreError> {
        Ok(self
            .hashes
            .lock()
            .expect("hash table lock")
            .get(key)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory implementation of the relational contract.
#[derive(Debug, Default, Clone)]
pub struct MemoryNodeStore {
    stations: Arc<Mutex<HashMap<String, Vec<StationNode>>>>,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the node rows for one station.
    pub fn put_station(&self, station_id: &str, rows: Vec<StationNode>) {
        self.stations
            .lock()
            .expect("station table lock")
            .insert(station_id.to_string(), rows);
    }
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn station_nodes(&self, station_id: &str) -> Result<Vec<StationNode>, StoreError> {
        let mut rows = self
            .stations
            .lock()
            .expect("station table lock")
            .get(station_id)
            .cloned()
            .unwrap_or_default();
        rows.sort_by_key(|row| row.id);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_value_store_reads_back_writes() {
        let store = MemoryValueStore::new();
        store.put_string("svr_stations", "[]");
        store.put_hash("svr_DATA_P1", &[("T", "36.5"), ("F", "98.1")]);

        assert_eq!(store.get("svr_stations").await.unwrap().as_deref(), Some("[]"));
        assert_eq!(
            store.hash_get("svr_DATA_P1", "T").await.unwrap().as_deref(),
            Some("36.5")
        );
        assert_eq!(store.hash_get("svr_DATA_P1", "missing").await.unwrap(), None);
        assert_eq!(store.hash_get_all("svr_DATA_P1").await.unwrap().len(), 2);
        assert!(store.hash_get_all("svr_DATA_P2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn default_batch_read_covers_every_key() {
        let store = MemoryValueStore::new();
        store.put_hash("svr_DATA_P1", &[("T", "1")]);

        let keys = vec!["svr_DATA_P1".to_string(), "svr_DATA_P2".to_string()];
        let records = store.hash_get_all_many(&keys).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records["svr_DATA_P1"]["T"], "1");
        assert!(records["svr_DATA_P2"].is_empty());
    }

    #[tokio::test]
    async fn memory_node_store_orders_rows_by_id() {
        let store = MemoryNodeStore::new();
        store.put_station(
            "0101",
            vec![
                StationNode {
                    id: 3,
                    parent_id: 1,
                    name: "B".into(),
                    ..StationNode::default()
                },
                StationNode {
                    id: 1,
                    parent_id: 1,
                    name: "Root".into(),
                    ..StationNode::default()
                },
            ],
        );

        let rows = store.station_nodes("0101").await.unwrap();
        assert_eq!(rows.iter().map(|row| row.id).collect::<Vec<_>>(), vec![1, 3]);
        assert!(store.station_nodes("absent").await.unwrap().is_empty());
    }
}
