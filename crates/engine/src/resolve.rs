//! # Attribute Resolution
//!
//! This module turns one attribute definition into one display value. The
//! interesting part is the position-selection rule: a node carries a
//! position identifier and, optionally, a related position identifier, and
//! each attribute definition names the record field to read for either
//! case. Which live-value record is fetched — and which field is read from
//! it — follows a fixed precedence:
//!
//! 1. `num` defaults to the node's own `positionId`.
//! 2. When both the node's `rPositionId` and the attribute's
//!    `relation_parno` are non-empty, the relation wins: `num` becomes
//!    `rPositionId` and the `relation_parno` field is selected.
//! 3. When the attribute is flagged enabled (`is_enable`), the device's own
//!    position wins unconditionally, overriding the relation rule.
//!
//! The selected record is fetched as the hash `{prefix}DATA_{num}`. A
//! missing record or field is never an error: the value degrades to the
//! definition's `para_value` fallback, or to the empty string.
//!
//! Dynamic and set-item templates share the rule but differ in casing:
//! the set-item path lower-cases attribute names, matches record fields
//! case-insensitively, and lower-cases the resolved value, while the
//! dynamic path preserves case throughout. Static templates skip the rule
//! entirely; their definitions carry the value.

use serde_json::{Map as JsonMap, Value};
use std::collections::HashMap;
use tracing::warn;

use crate::templates::{ResolvedTemplate, StaticTemplate};
use stationview_store::ValueStore;
use stationview_types::keys::{POSITION_ID_KEY, RELATION_POSITION_ID_KEY};
use stationview_types::{AttributeDef, KeySpace, StationNode, ValueRecord};

/// Position context of the node whose attributes are being resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionContext {
    /// The node's own position identifier.
    pub position_id: String,
    /// The node's related position identifier, empty when absent.
    pub relation_position_id: String,
}

impl PositionContext {
    /// Extract the position context from a skeleton node.
    ///
    /// Non-string or absent entries read as empty, which disables the
    /// relation rule for this node.
    pub fn from_skeleton(node: &JsonMap<String, Value>) -> Self {
        Self {
            position_id: string_entry(node, POSITION_ID_KEY),
            relation_position_id: string_entry(node, RELATION_POSITION_ID_KEY),
        }
    }

    /// Extract the position context from a relational node row.
    pub fn from_node(node: &StationNode) -> Self {
        Self {
            position_id: node.position_id.clone(),
            relation_position_id: node.relation_position_id.clone(),
        }
    }
}

fn string_entry(node: &JsonMap<String, Value>, key: &str) -> String {
    match node.get(key) {
        Some(Value::String(text)) => text.clone(),
        _ => String::new(),
    }
}

/// Outcome of the position-selection rule for one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection<'a> {
    /// The resolved position identifier forming the live-value key.
    pub num: &'a str,
    /// The record field the value is read from.
    pub field: &'a str,
    /// Whether the relation rule ended up in effect.
    pub use_relation: bool,
}

/// Apply the position-selection rule to one attribute definition.
///
/// Evaluated in precedence order: default to the node's position, switch to
/// the related position when both relation sides are present, and let an
/// enabled device override the relation unconditionally.
pub fn select_position<'a>(position: &'a PositionContext, def: &'a AttributeDef) -> Selection<'a> {
    let mut num = position.position_id.as_str();
    let mut use_relation = false;

    if !position.relation_position_id.is_empty() && !def.relation_parno.is_empty() {
        num = position.relation_position_id.as_str();
        use_relation = true;
    }
    if def.is_enable {
        num = position.position_id.as_str();
        use_relation = false;
    }

    let field = if use_relation {
        def.relation_parno.as_str()
    } else {
        def.parno.as_str()
    };

    Selection { num, field, use_relation }
}

/// Resolves attribute definitions against the live-value store.
///
/// A resolver is scoped to one resolution session. It can optionally run
/// against a preloaded record map (see [`crate::prefetch`]) instead of
/// issuing one store round trip per attribute; the selection semantics are
/// identical either way.
pub struct AttributeResolver<'a> {
    values: &'a dyn ValueStore,
    keys: &'a KeySpace,
    preloaded: Option<&'a HashMap<String, ValueRecord>>,
}

impl<'a> AttributeResolver<'a> {
    pub fn new(values: &'a dyn ValueStore, keys: &'a KeySpace) -> Self {
        Self {
            values,
            keys,
            preloaded: None,
        }
    }

    /// Resolve from a preloaded record map instead of per-attribute reads.
    pub fn with_preloaded(mut self, records: &'a HashMap<String, ValueRecord>) -> Self {
        self.preloaded = Some(records);
        self
    }

    /// Live record for one position identifier.
    ///
    /// Absent records, and individual fetch failures, degrade to an empty
    /// record so a single unreachable position never aborts a resolution.
    async fn live_record(&self, num: &str) -> ValueRecord {
        let key = self.keys.data_key(num);
        if let Some(preloaded) = self.preloaded {
            return preloaded.get(&key).cloned().unwrap_or_default();
        }
        match self.values.hash_get_all(&key).await {
            Ok(record) => record,
            Err(error) => {
                warn!(key = %key, %error, "live value fetch failed; using fallback value");
                ValueRecord::new()
            }
        }
    }

    /// Resolve one dynamic attribute to its display value.
    pub async fn resolve_dynamic(&self, position: &PositionContext, def: &AttributeDef) -> String {
        let selection = select_position(position, def);
        let record = self.live_record(selection.num).await;
        match record.get(selection.field) {
            Some(value) => value.clone(),
            None => fallback_value(def),
        }
    }

    /// Resolve one set-item attribute to its display value.
    ///
    /// Record fields are matched case-insensitively and the result is
    /// lower-cased, unlike the dynamic path.
    pub async fn resolve_set_item(&self, position: &PositionContext, def: &AttributeDef) -> String {
        let selection = select_position(position, def);
        let record = self.live_record(selection.num).await;
        let wanted = selection.field.to_lowercase();
        let matched = record
            .iter()
            .find(|(field, _)| field.to_lowercase() == wanted)
            .map(|(_, value)| value.clone());
        match matched {
            Some(value) => value.to_lowercase(),
            None => fallback_value(def).to_lowercase(),
        }
    }

    /// Resolve a whole dynamic template onto a node mapping.
    pub async fn apply_dynamic(
        &self,
        node: &mut JsonMap<String, Value>,
        template: &ResolvedTemplate,
        position: &PositionContext,
    ) {
        for (name, def) in template {
            let value = self.resolve_dynamic(position, def).await;
            node.insert(name.clone(), Value::String(value));
        }
    }

    /// Resolve a whole set-item template onto a node mapping, with
    /// lower-cased attribute names.
    pub async fn apply_set_item(
        &self,
        node: &mut JsonMap<String, Value>,
        template: &ResolvedTemplate,
        position: &PositionContext,
    ) {
        for (name, def) in template {
            let value = self.resolve_set_item(position, def).await;
            node.insert(name.to_lowercase(), Value::String(value));
        }
    }
}

/// Resolve a whole static template onto a node mapping.
///
/// Attribute names are lower-cased. Object definitions contribute their
/// `para_value` field (and nothing when it is absent); bare scalars are the
/// value themselves, kept with their original JSON type.
pub fn apply_static(node: &mut JsonMap<String, Value>, template: &StaticTemplate) {
    for (name, def) in template {
        let name = name.to_lowercase();
        match def {
            Value::Object(fields) => {
                if let Some(value) = fields.get("para_value") {
                    node.insert(name, value.clone());
                }
            }
            scalar => {
                node.insert(name, scalar.clone());
            }
        }
    }
}

fn fallback_value(def: &AttributeDef) -> String {
    match &def.para_value {
        Some(value) => scalar_to_string(value),
        None => String::new(),
    }
}

/// String form of a scalar JSON value, matching the display conventions of
/// the overview consumers (null reads as empty).
pub(crate) fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stationview_store::MemoryValueStore;

    fn def(parno: &str, relation_parno: &str, is_enable: bool) -> AttributeDef {
        AttributeDef {
            parno: parno.into(),
            relation_parno: relation_parno.into(),
            is_enable,
            para_value: None,
        }
    }

    fn position(position_id: &str, relation_position_id: &str) -> PositionContext {
        PositionContext {
            position_id: position_id.into(),
            relation_position_id: relation_position_id.into(),
        }
    }

    #[test]
    fn selection_defaults_to_own_position() {
        let position = position("P1", "");
        let def = def("T", "RT", false);
        let selection = select_position(&position, &def);

        assert_eq!(selection.num, "P1");
        assert_eq!(selection.field, "T");
        assert!(!selection.use_relation);
    }

    #[test]
    fn selection_without_relation_field_ignores_relation_position() {
        // Either side of the relation missing keeps the node's own position.
        let position = position("P1", "P2");
        let def = def("T", "", false);
        let selection = select_position(&position, &def);

        assert_eq!(selection.num, "P1");
        assert_eq!(selection.field, "T");
    }

    #[test]
    fn selection_uses_relation_when_both_sides_present() {
        let position = position("P1", "P2");
        let def = def("T", "RT", false);
        let selection = select_position(&position, &def);

        assert_eq!(selection.num, "P2");
        assert_eq!(selection.field, "RT");
        assert!(selection.use_relation);
    }

    #[test]
    fn enabled_device_overrides_relation_rule() {
        let position = position("P1", "P2");
        let def = def("T", "RT", true);
        let selection = select_position(&position, &def);

        assert_eq!(selection.num, "P1");
        assert_eq!(selection.field, "T");
        assert!(!selection.use_relation);
    }

    #[tokio::test]
    async fn dynamic_resolution_reads_selected_field() {
        let store = MemoryValueStore::new();
        store.put_hash("svr_DATA_P1", &[("T", "36.5")]);
        let keys = KeySpace::default();
        let resolver = AttributeResolver::new(&store, &keys);

        let value = resolver
            .resolve_dynamic(&position("P1", ""), &def("T", "RT", false))
            .await;

        assert_eq!(value, "36.5");
    }

    #[tokio::test]
    async fn dynamic_resolution_switches_to_relation_record() {
        let store = MemoryValueStore::new();
        store.put_hash("svr_DATA_P1", &[("T", "36.5")]);
        store.put_hash("svr_DATA_P2", &[("RT", "40.0")]);
        let keys = KeySpace::default();
        let resolver = AttributeResolver::new(&store, &keys);

        let value = resolver
            .resolve_dynamic(&position("P1", "P2"), &def("T", "RT", false))
            .await;

        assert_eq!(value, "40.0");
    }

    #[tokio::test]
    async fn missing_record_falls_back_to_para_value_then_empty() {
        let store = MemoryValueStore::new();
        let keys = KeySpace::default();
        let resolver = AttributeResolver::new(&store, &keys);

        let mut with_fallback = def("T", "", false);
        with_fallback.para_value = Some(json!("standby"));
        let value = resolver
            .resolve_dynamic(&position("P1", ""), &with_fallback)
            .await;
        assert_eq!(value, "standby");

        let value = resolver
            .resolve_dynamic(&position("P1", ""), &def("T", "", false))
            .await;
        assert_eq!(value, "");
    }

    #[tokio::test]
    async fn numeric_para_value_fallback_formats_as_string() {
        let store = MemoryValueStore::new();
        let keys = KeySpace::default();
        let resolver = AttributeResolver::new(&store, &keys);

        let mut with_fallback = def("T", "", false);
        with_fallback.para_value = Some(json!(7));
        let value = resolver
            .resolve_dynamic(&position("P1", ""), &with_fallback)
            .await;

        assert_eq!(value, "7");
    }

    #[tokio::test]
    async fn set_item_resolution_lower_cases_fields_and_values() {
        let store = MemoryValueStore::new();
        store.put_hash("svr_DATA_P1", &[("MODE", "Automatic")]);
        let keys = KeySpace::default();
        let resolver = AttributeResolver::new(&store, &keys);

        let value = resolver
            .resolve_set_item(&position("P1", ""), &def("mode", "", false))
            .await;

        assert_eq!(value, "automatic");
    }

    #[tokio::test]
    async fn dynamic_resolution_preserves_value_case() {
        let store = MemoryValueStore::new();
        store.put_hash("svr_DATA_P1", &[("MODE", "Automatic")]);
        let keys = KeySpace::default();
        let resolver = AttributeResolver::new(&store, &keys);

        let value = resolver
            .resolve_dynamic(&position("P1", ""), &def("MODE", "", false))
            .await;

        assert_eq!(value, "Automatic");
    }

    #[tokio::test]
    async fn preloaded_records_bypass_the_store() {
        let store = MemoryValueStore::new();
        store.put_hash("svr_DATA_P1", &[("T", "live")]);
        let keys = KeySpace::default();

        let mut preloaded = HashMap::new();
        preloaded.insert(
            "svr_DATA_P1".to_string(),
            ValueRecord::from([("T".to_string(), "preloaded".to_string())]),
        );
        let resolver = AttributeResolver::new(&store, &keys).with_preloaded(&preloaded);

        let value = resolver
            .resolve_dynamic(&position("P1", ""), &def("T", "", false))
            .await;

        assert_eq!(value, "preloaded");
    }

    #[test]
    fn static_template_takes_para_value_and_bare_scalars() {
        let template = StaticTemplate::from([
            ("Manufacturer".to_string(), json!({"para_value": "Acme"})),
            ("Channels".to_string(), json!(8)),
            ("Ignored".to_string(), json!({"other": "x"})),
        ]);

        let mut node = JsonMap::new();
        apply_static(&mut node, &template);

        assert_eq!(node.get("manufacturer"), Some(&json!("Acme")));
        assert_eq!(node.get("channels"), Some(&json!(8)));
        assert!(!node.contains_key("ignored"));
    }

    #[test]
    fn position_context_reads_skeleton_keys() {
        let node = json!({
            "positionId": "P1",
            "rPositionId": "P2",
            "name": "Transmitter"
        });

        let context = PositionContext::from_skeleton(node.as_object().unwrap());

        assert_eq!(context.position_id, "P1");
        assert_eq!(context.relation_position_id, "P2");
    }

    #[test]
    fn position_context_treats_non_strings_as_absent() {
        let node = json!({"positionId": 7});

        let context = PositionContext::from_skeleton(node.as_object().unwrap());

        assert_eq!(context.position_id, "");
        assert_eq!(context.relation_position_id, "");
    }
}
