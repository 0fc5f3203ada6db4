//! Station overview resolution entry point.
//!
//! [`OverviewEngine`] wires the collaborator stores, the key space, and the
//! core components together behind the one operation the service layer
//! consumes: [`OverviewEngine::resolve_station_overview`]. The engine holds
//! no per-request state; every resolution loads its own template cache and
//! works on private copies of the two trees, so concurrent resolutions only
//! share the external stores.

use chrono::Utc;
use serde_json::{Map as JsonMap, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::try_join;
use tracing::{debug, info, warn};

use crate::error::OverviewError;
use crate::merge::Merger;
use crate::prefetch::{collect_position_ids, preload_records};
use crate::resolve::AttributeResolver;
use crate::templates::TemplateCache;
use crate::tree::TreeBuilder;
use stationview_store::{NodeStore, ValueStore};
use stationview_types::{KeySpace, StationOverview};

/// The station overview resolution engine.
///
/// Construct one per deployment and share it freely; it is cheap to clone
/// and every resolution is independent.
#[derive(Clone)]
pub struct OverviewEngine {
    values: Arc<dyn ValueStore>,
    nodes: Arc<dyn NodeStore>,
    keys: KeySpace,
    prefetch: bool,
}

impl OverviewEngine {
    /// Engine over the given collaborator stores with the default key space.
    pub fn new(values: Arc<dyn ValueStore>, nodes: Arc<dyn NodeStore>) -> Self {
        Self {
            values,
            nodes,
            keys: KeySpace::default(),
            prefetch: false,
        }
    }

    /// Use a custom key namespace.
    pub fn with_key_space(mut self, keys: KeySpace) -> Self {
        self.keys = keys;
        self
    }

    /// Preload all referenced live-value records in one batched read before
    /// merging, instead of one read per resolved attribute. Resolution
    /// output is identical either way.
    pub fn with_prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }

    /// Resolve the full overview tree for one station.
    ///
    /// The precomputed per-station documents are the primary source; when
    /// either is absent the engine falls back to scanning the station's
    /// node rows and building the tree itself. See the crate docs for the
    /// resolution semantics.
    pub async fn resolve_station_overview(
        &self,
        station_id: &str,
    ) -> Result<StationOverview, OverviewError> {
        let station_id = station_id.trim();
        if station_id.is_empty() {
            return Err(OverviewError::InvalidStationId);
        }

        let started = Instant::now();
        debug!(station_id, "resolving station overview");

        let templates = TemplateCache::load(self.values.as_ref(), &self.keys).await;

        let basic_key = self.keys.basic_documents();
        let index_key = self.keys.index_documents();
        let (basic_raw, index_raw) = try_join!(
            self.values.hash_get(&basic_key, station_id),
            self.values.hash_get(&index_key, station_id),
        )?;

        let (content, cycles) = match (basic_raw, index_raw) {
            (Some(basic_raw), Some(index_raw)) => {
                let (basic, index) = decode_documents(basic_raw, index_raw, station_id).await?;
                (self.merge_documents(basic, &index, &templates).await, Vec::new())
            }
            _ => {
                debug!(station_id, "precomputed documents unavailable; scanning node rows");
                let rows = self.nodes.station_nodes(station_id).await?;
                let resolver = AttributeResolver::new(self.values.as_ref(), &self.keys);
                let built = TreeBuilder::new(&templates, &resolver).build(&rows).await;
                (built.root, built.cycles)
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as i64;
        info!(station_id, elapsed_ms, cycle_count = cycles.len(), "station overview resolved");

        Ok(StationOverview {
            station_id: station_id.to_string(),
            result: true,
            timestamp_utc: Utc::now(),
            elapsed_ms,
            message: String::new(),
            content,
            cycles,
        })
    }

    async fn merge_documents(
        &self,
        mut basic: JsonMap<String, Value>,
        index: &JsonMap<String, Value>,
        templates: &TemplateCache,
    ) -> Value {
        let preloaded = if self.prefetch {
            let nums = collect_position_ids(index);
            match preload_records(self.values.as_ref(), &self.keys, &nums).await {
                Ok(records) => Some(records),
                Err(error) => {
                    warn!(%error, "live value preload failed; resolving per attribute");
                    None
                }
            }
        } else {
            None
        };

        let mut resolver = AttributeResolver::new(self.values.as_ref(), &self.keys);
        if let Some(records) = preloaded.as_ref() {
            resolver = resolver.with_preloaded(records);
        }

        Merger::new(templates, resolver).merge(&mut basic, index).await;
        Value::Object(basic)
    }

    /// Raw station directory document.
    pub async fn all_stations(&self) -> Result<String, OverviewError> {
        self.directory_value(self.keys.stations()).await
    }

    /// Raw station identifier directory document.
    pub async fn all_station_ids(&self) -> Result<String, OverviewError> {
        self.directory_value(self.keys.station_ids()).await
    }

    async fn directory_value(&self, key: String) -> Result<String, OverviewError> {
        match self.values.get(&key).await? {
            Some(value) => Ok(value),
            None => Err(OverviewError::MissingKey { key }),
        }
    }
}

/// Decode the two top-level documents concurrently.
///
/// Both must be JSON objects; anything else is fatal to the request.
async fn decode_documents(
    basic_raw: String,
    index_raw: String,
    station_id: &str,
) -> Result<(JsonMap<String, Value>, JsonMap<String, Value>), OverviewError> {
    let (basic, index) = tokio::join!(
        tokio::task::spawn_blocking(move || serde_json::from_str::<Value>(&basic_raw)),
        tokio::task::spawn_blocking(move || serde_json::from_str::<Value>(&index_raw)),
    );

    let basic = document_object(basic.expect("basic decode task panicked"), "basic", station_id)?;
    let index = document_object(index.expect("index decode task panicked"), "index", station_id)?;
    Ok((basic, index))
}

fn document_object(
    decoded: Result<Value, serde_json::Error>,
    document: &'static str,
    station_id: &str,
) -> Result<JsonMap<String, Value>, OverviewError> {
    match decoded {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(OverviewError::Decode {
            document,
            station_id: station_id.to_string(),
            source: None,
        }),
        Err(error) => Err(OverviewError::Decode {
            document,
            station_id: station_id.to_string(),
            source: Some(error),
        }),
    }
}
