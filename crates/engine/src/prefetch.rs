//! Batched live-value preload.
//!
//! The default merge pass issues one value-store round trip per resolved
//! dynamic/set-item attribute. For skeletons referencing many positions
//! that is the dominant cost, so the engine can instead scan the skeleton
//! once for every position identifier, fetch all of their records in a
//! single batched read, and resolve from the preloaded map.
//!
//! Keys are deduplicated into sorted order before the fetch and results
//! are demultiplexed by key afterwards, so resolution output is identical
//! to the unbatched path.

use serde_json::{Map as JsonMap, Value};
use std::collections::{BTreeSet, HashMap};

use stationview_store::{StoreError, ValueStore};
use stationview_types::keys::{POSITION_ID_KEY, RELATION_POSITION_ID_KEY};
use stationview_types::{KeySpace, ValueRecord};

/// Collect every position identifier referenced anywhere in a skeleton.
pub fn collect_position_ids(skeleton: &JsonMap<String, Value>) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    collect_into(skeleton, &mut ids);
    ids
}

fn collect_into(node: &JsonMap<String, Value>, ids: &mut BTreeSet<String>) {
    for key in [POSITION_ID_KEY, RELATION_POSITION_ID_KEY] {
        if let Some(Value::String(id)) = node.get(key) {
            if !id.is_empty() {
                ids.insert(id.clone());
            }
        }
    }
    for value in node.values() {
        if let Value::Object(child) = value {
            collect_into(child, ids);
        }
    }
}

/// Fetch the live-value records for a set of position identifiers in one
/// batched read, keyed by their full data keys.
pub async fn preload_records(
    values: &dyn ValueStore,
    keys: &KeySpace,
    nums: &BTreeSet<String>,
) -> Result<HashMap<String, ValueRecord>, StoreError> {
    if nums.is_empty() {
        return Ok(HashMap::new());
    }
    let data_keys: Vec<String> = nums.iter().map(|num| keys.data_key(num)).collect();
    values.hash_get_all_many(&data_keys).await
}
