//! Skeleton-into-accumulator merge.
//!
//! The precomputed resolution path starts from two documents: the skeleton
//! (index) tree describing which templates and raw fields each subtree
//! references, and the accumulator (basic) tree the overview is built up
//! into. The merger walks both together, resolving template references
//! through the [`AttributeResolver`] and copying everything else.
//!
//! Three skeleton keys get special treatment: the template reference keys
//! resolve to attributes (the reference id itself is kept as a marker
//! field, never copied as opaque data), and the link key flattens — its
//! children merge directly into the current accumulator node.

use futures_util::future::BoxFuture;
use serde_json::{Map as JsonMap, Value};
use tracing::debug;

use crate::resolve::{AttributeResolver, PositionContext, apply_static};
use crate::templates::TemplateCache;
use stationview_types::keys::{
    DYNAMIC_TEMPLATE_KEY, LINK_KEY, SET_ITEM_TEMPLATE_KEY, STATIC_TEMPLATE_KEY,
};

/// Merges one skeleton tree into one accumulator tree in place.
pub struct Merger<'a> {
    templates: &'a TemplateCache,
    resolver: AttributeResolver<'a>,
}

impl<'a> Merger<'a> {
    pub fn new(templates: &'a TemplateCache, resolver: AttributeResolver<'a>) -> Self {
        Self { templates, resolver }
    }

    /// Merge the skeleton into the accumulator, resolving every template
    /// reference found along the way.
    pub async fn merge(&self, accumulator: &mut JsonMap<String, Value>, skeleton: &JsonMap<String, Value>) {
        self.merge_node(accumulator, skeleton).await;
    }

    fn merge_node<'f>(
        &'f self,
        accumulator: &'f mut JsonMap<String, Value>,
        skeleton: &'f JsonMap<String, Value>,
    ) -> BoxFuture<'f, ()> {
        Box::pin(async move {
            let position = PositionContext::from_skeleton(skeleton);

            if let Some(id) = template_reference(skeleton, DYNAMIC_TEMPLATE_KEY) {
                match self.templates.dynamic_template(id) {
                    Some(template) => {
                        self.resolver.apply_dynamic(accumulator, template, &position).await;
                    }
                    None => debug!(template_id = %id, "dynamic template not in dictionary"),
                }
                accumulator.insert(DYNAMIC_TEMPLATE_KEY.to_string(), Value::String(id.to_string()));
            }

            if let Some(id) = template_reference(skeleton, STATIC_TEMPLATE_KEY) {
                match self.templates.static_template(id) {
                    Some(template) => apply_static(accumulator, template),
                    None => debug!(template_id = %id, "static template not in dictionary"),
                }
                accumulator.insert(STATIC_TEMPLATE_KEY.to_string(), Value::String(id.to_string()));
            }

            if let Some(id) = template_reference(skeleton, SET_ITEM_TEMPLATE_KEY) {
                match self.templates.set_item_template(id) {
                    Some(template) => {
                        self.resolver.apply_set_item(accumulator, template, &position).await;
                    }
                    None => debug!(template_id = %id, "set-item template not in dictionary"),
                }
                accumulator.insert(SET_ITEM_TEMPLATE_KEY.to_string(), Value::String(id.to_string()));
            }

            for (key, value) in skeleton {
                if key == DYNAMIC_TEMPLATE_KEY
                    || key == STATIC_TEMPLATE_KEY
                    || key == SET_ITEM_TEMPLATE_KEY
                {
                    continue;
                }

                match value {
                    Value::Object(child) => {
                        if key == LINK_KEY {
                            // Flattening marker: merge the children up into
                            // the current node, discarding the key itself.
                            self.merge_node(accumulator, child).await;
                            continue;
                        }
                        let slot = accumulator
                            .entry(key.clone())
                            .or_insert_with(|| Value::Object(JsonMap::new()));
                        if !slot.is_object() {
                            // A scalar in the accumulator gives way to the
                            // skeleton's nested structure.
                            *slot = Value::Object(JsonMap::new());
                        }
                        if let Value::Object(child_accumulator) = slot {
                            self.merge_node(child_accumulator, child).await;
                        }
                    }
                    scalar => {
                        accumulator.insert(key.clone(), scalar.clone());
                    }
                }
            }
        })
    }
}

/// Non-empty string template reference on a skeleton node, if present.
fn template_reference<'v>(node: &'v JsonMap<String, Value>, key: &str) -> Option<&'v str> {
    node.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stationview_store::MemoryValueStore;
    use stationview_types::KeySpace;

    async fn merged(store: &MemoryValueStore, basic: Value, index: Value) -> Value {
        let keys = KeySpace::default();
        let templates = TemplateCache::load(store, &keys).await;
        let resolver = AttributeResolver::new(store, &keys);
        let merger = Merger::new(&templates, resolver);

        let mut accumulator = basic.as_object().unwrap().clone();
        merger.merge(&mut accumulator, index.as_object().unwrap()).await;
        Value::Object(accumulator)
    }

    #[tokio::test]
    async fn scalars_overwrite_and_nested_nodes_are_created() {
        let store = MemoryValueStore::new();

        let result = merged(
            &store,
            json!({"name": "old", "kept": "yes"}),
            json!({"name": "new", "child": {"depth": "1"}}),
        )
        .await;

        assert_eq!(
            result,
            json!({"name": "new", "kept": "yes", "child": {"depth": "1"}})
        );
    }

    #[tokio::test]
    async fn link_key_children_merge_one_level_up() {
        let store = MemoryValueStore::new();

        let result = merged(
            &store,
            json!({}),
            json!({"rConfig": {"inner": {"a": "1"}, "flag": "on"}}),
        )
        .await;

        assert_eq!(result, json!({"inner": {"a": "1"}, "flag": "on"}));
        assert!(result.get("rConfig").is_none());
    }

    #[tokio::test]
    async fn dynamic_reference_resolves_attributes_and_keeps_marker() {
        let store = MemoryValueStore::new();
        store.put_hash(
            "svr_dynamic_model",
            &[("M1", r#"{"temp": {"parno": "T", "relation_parno": "RT", "is_enable": 0}}"#)],
        );
        store.put_hash("svr_DATA_P1", &[("T", "36.5")]);

        let result = merged(
            &store,
            json!({}),
            json!({"dynamic_model_id": "M1", "positionId": "P1", "rPositionId": ""}),
        )
        .await;

        assert_eq!(result["temp"], "36.5");
        assert_eq!(result["dynamic_model_id"], "M1");
        // Position context keys are ordinary scalars and copy through.
        assert_eq!(result["positionId"], "P1");
    }

    #[tokio::test]
    async fn unknown_template_reference_keeps_marker_only() {
        let store = MemoryValueStore::new();

        let result = merged(&store, json!({}), json!({"dynamic_model_id": "ghost"})).await;

        assert_eq!(result, json!({"dynamic_model_id": "ghost"}));
    }

    #[tokio::test]
    async fn set_item_reference_lower_cases_names_and_values() {
        let store = MemoryValueStore::new();
        store.put_hash(
            "svr_setitem_model",
            &[("I1", r#"{"Mode": {"parno": "MODE", "relation_parno": ""}}"#)],
        );
        store.put_hash("svr_DATA_P1", &[("MODE", "Automatic")]);

        let result = merged(
            &store,
            json!({}),
            json!({"setitem_model_id": "I1", "positionId": "P1"}),
        )
        .await;

        assert_eq!(result["mode"], "automatic");
        assert_eq!(result["setitem_model_id"], "I1");
    }

    #[tokio::test]
    async fn static_reference_contributes_para_values() {
        let store = MemoryValueStore::new();
        store.put_hash(
            "svr_static_model",
            &[("S1", r#"{"Vendor": {"para_value": "Acme"}, "slots": 4}"#)],
        );

        let result = merged(&store, json!({}), json!({"static_model_id": "S1"})).await;

        assert_eq!(result["vendor"], "Acme");
        assert_eq!(result["slots"], 4);
        assert_eq!(result["static_model_id"], "S1");
    }

    #[tokio::test]
    async fn nested_template_references_resolve_per_node() {
        let store = MemoryValueStore::new();
        store.put_hash(
            "svr_dynamic_model",
            &[("M1", r#"{"temp": {"parno": "T"}}"#)],
        );
        store.put_hash("svr_DATA_P1", &[("T", "20")]);
        store.put_hash("svr_DATA_P2", &[("T", "30")]);

        let result = merged(
            &store,
            json!({"Exciter": {"temp": "stale"}}),
            json!({
                "Exciter": {"dynamic_model_id": "M1", "positionId": "P1"},
                "Amplifier": {"dynamic_model_id": "M1", "positionId": "P2"}
            }),
        )
        .await;

        assert_eq!(result["Exciter"]["temp"], "20");
        assert_eq!(result["Amplifier"]["temp"], "30");
    }

    #[tokio::test]
    async fn accumulator_scalar_gives_way_to_nested_skeleton() {
        let store = MemoryValueStore::new();

        let result = merged(
            &store,
            json!({"slot": "scalar"}),
            json!({"slot": {"a": "1"}}),
        )
        .await;

        assert_eq!(result, json!({"slot": {"a": "1"}}));
    }
}
