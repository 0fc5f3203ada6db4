//! Shared type definitions for the station overview engine.
//!
//! This crate holds the data model exchanged between the store clients and
//! the resolution engine: station node rows, attribute template definitions,
//! the key-space configuration, and the overview result envelope. Everything
//! here is plain data; the resolution logic lives in `stationview-engine`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub mod keys;

pub use keys::KeySpace;

/// One live-value hash from the value store: field name to raw string value.
///
/// Records live under `{prefix}DATA_{num}` keys and may be absent entirely;
/// an absent record is represented as an empty map.
pub type ValueRecord = HashMap<String, String>;

/// A single row of a station's hierarchy as returned by the relational scan.
///
/// Identity is `id`, unique within one station. `parent_id` may reference a
/// nonexistent row; consumers treat that as an absent parent. The three
/// template references are optional, and an empty string is treated the same
/// as an absent value (legacy rows store `""` rather than NULL).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationNode {
    /// Node identifier, unique within the station.
    pub id: i64,
    /// Identifier of the parent node; may dangle or form a cycle in
    /// malformed data.
    pub parent_id: i64,
    /// Display name used as the key in the assembled tree.
    pub name: String,
    /// Position identifier used to form live-value lookup keys.
    #[serde(default)]
    pub position_id: String,
    /// Related position identifier; participates in the position-selection
    /// rule when the attribute also carries a relation field name.
    #[serde(default)]
    pub relation_position_id: String,
    /// Dynamic template reference, if any.
    #[serde(default)]
    pub dynamic_template_id: Option<String>,
    /// Static template reference, if any.
    #[serde(default)]
    pub static_template_id: Option<String>,
    /// Set-item template reference, if any.
    #[serde(default)]
    pub set_item_template_id: Option<String>,
}

impl StationNode {
    /// Dynamic template id, with empty strings normalized to `None`.
    pub fn dynamic_template(&self) -> Option<&str> {
        template_ref(&self.dynamic_template_id)
    }

    /// Static template id, with empty strings normalized to `None`.
    pub fn static_template(&self) -> Option<&str> {
        template_ref(&self.static_template_id)
    }

    /// Set-item template id, with empty strings normalized to `None`.
    pub fn set_item_template(&self) -> Option<&str> {
        template_ref(&self.set_item_template_id)
    }
}

fn template_ref(id: &Option<String>) -> Option<&str> {
    id.as_deref().map(str::trim).filter(|id| !id.is_empty())
}

/// One attribute definition inside a dynamic or set-item template.
///
/// These definitions do not hold the attribute value themselves; they name
/// the value-store fields (`parno` / `relation_parno`) the engine reads the
/// value from, plus an optional static fallback. Wire names are snake_case
/// as stored in the dictionary hashes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AttributeDef {
    /// Field name selected from the position's live-value record.
    #[serde(default)]
    pub parno: String,
    /// Field name selected when the relation-based position is used.
    #[serde(default)]
    pub relation_parno: String,
    /// Enabled-device flag. Upstream writers store it as the number `1`,
    /// the string `"1"`, or omit it entirely, so decoding is lenient.
    #[serde(default, deserialize_with = "enable_flag")]
    pub is_enable: bool,
    /// Static fallback used when the live record or field is missing.
    #[serde(default)]
    pub para_value: Option<Value>,
}

fn enable_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Bool(flag)) => flag,
        Some(Value::Number(number)) => number.as_f64() == Some(1.0),
        Some(Value::String(text)) => text.trim() == "1",
        _ => false,
    })
}

/// Result envelope returned by a station overview resolution.
///
/// Serialized in the camelCase shape the overview consumers expect, with the
/// merged accumulator tree under `content`. `cycles` lists node ids at which
/// a structural cycle was detected and cut; it is empty on the precomputed
/// document path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationOverview {
    /// Station the overview was resolved for.
    pub station_id: String,
    /// Whether resolution completed. Always `true` in envelopes produced by
    /// the engine; error cases surface as `Err` instead.
    pub result: bool,
    /// Resolution completion time.
    #[serde(rename = "timestampUTC")]
    pub timestamp_utc: DateTime<Utc>,
    /// Wall-clock duration of the resolution in milliseconds.
    pub elapsed_ms: i64,
    /// Diagnostic message; empty on success.
    pub message: String,
    /// The merged overview tree.
    pub content: Value,
    /// Node ids at which parent-pointer cycles were detected and cut.
    pub cycles: Vec<i64>,
}
