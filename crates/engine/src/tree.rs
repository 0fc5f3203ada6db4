//! Station tree construction from flat node rows.
//!
//! The legacy resolution path has no precomputed skeleton document, only
//! the relational node rows. This builder assembles the nested name-keyed
//! tree from those rows with an explicit stack: each node is pushed once
//! unvisited (descend into children) and once visited (assemble from child
//! results), so every node is touched at most twice and total work stays
//! O(N) no matter how malformed the parent pointers are.
//!
//! Malformed structure is cut, not fatal: a parent pointer that closes a
//! cycle is recorded and the offending node resolves to an empty subtree; a
//! child id without a row resolves to an empty subtree named `"unknown"`.
//! The build always completes.

use serde_json::{Map as JsonMap, Value};
use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::resolve::{AttributeResolver, PositionContext, apply_static};
use crate::templates::TemplateCache;
use stationview_types::StationNode;

/// A built station tree plus its structural diagnostics.
#[derive(Debug)]
pub struct BuiltTree {
    /// Name-keyed nested tree, rooted at the smallest-id node.
    pub root: Value,
    /// Node ids at which a parent-pointer cycle was detected and cut.
    pub cycles: Vec<i64>,
}

/// Assembles the station tree from flat rows, annotating each node's
/// attributes through the resolver as it is completed.
pub struct TreeBuilder<'a> {
    templates: &'a TemplateCache,
    resolver: &'a AttributeResolver<'a>,
}

struct Frame {
    id: i64,
    visited: bool,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(templates: &'a TemplateCache, resolver: &'a AttributeResolver<'a>) -> Self {
        Self { templates, resolver }
    }

    /// Build the tree for one station's rows.
    ///
    /// The root is the row with the smallest id; no rows yield an empty
    /// object and no diagnostics.
    pub async fn build(&self, rows: &[StationNode]) -> BuiltTree {
        let mut nodes: HashMap<i64, &StationNode> = HashMap::with_capacity(rows.len());
        let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut root_id: Option<i64> = None;

        for row in rows {
            nodes.insert(row.id, row);
            children.entry(row.parent_id).or_default().push(row.id);
            root_id = Some(root_id.map_or(row.id, |current| current.min(row.id)));
        }
        let Some(root_id) = root_id else {
            return BuiltTree {
                root: Value::Object(JsonMap::new()),
                cycles: Vec::new(),
            };
        };

        let mut processed: HashSet<i64> = HashSet::new();
        let mut on_stack: HashSet<i64> = HashSet::new();
        let mut result: HashMap<i64, JsonMap<String, Value>> = HashMap::new();
        let mut cycles: Vec<i64> = Vec::new();

        let mut stack = vec![Frame {
            id: root_id,
            visited: false,
        }];

        while let Some(frame) = stack.pop() {
            let Some(node) = nodes.get(&frame.id).copied() else {
                // Child id without a row: resolve to an empty subtree.
                result.insert(frame.id, JsonMap::new());
                processed.insert(frame.id);
                continue;
            };

            if !frame.visited {
                if processed.contains(&frame.id) {
                    continue;
                }
                if on_stack.contains(&frame.id) {
                    // Parent pointer closed a cycle: cut it here.
                    cycles.push(frame.id);
                    result.insert(frame.id, JsonMap::new());
                    processed.insert(frame.id);
                    continue;
                }
                on_stack.insert(frame.id);
                stack.push(Frame {
                    id: frame.id,
                    visited: true,
                });
                if let Some(child_ids) = children.get(&frame.id) {
                    for &child_id in child_ids {
                        if !processed.contains(&child_id) {
                            stack.push(Frame {
                                id: child_id,
                                visited: false,
                            });
                        }
                    }
                }
            } else {
                let mut assembled = JsonMap::new();
                if let Some(child_ids) = children.get(&frame.id) {
                    for &child_id in child_ids {
                        let subtree = result.remove(&child_id).unwrap_or_default();
                        let child_name = nodes
                            .get(&child_id)
                            .map_or("unknown", |child| child.name.as_str());
                        assembled.insert(child_name.to_string(), Value::Object(subtree));
                    }
                }

                self.annotate(&mut assembled, node).await;

                on_stack.remove(&frame.id);
                result.insert(frame.id, assembled);
                processed.insert(frame.id);
            }
        }

        if !cycles.is_empty() {
            warn!(?cycles, "cut parent-pointer cycles while building station tree");
        }

        BuiltTree {
            root: Value::Object(result.remove(&root_id).unwrap_or_default()),
            cycles,
        }
    }

    /// Resolve whichever template references the row carries onto the node.
    async fn annotate(&self, node: &mut JsonMap<String, Value>, row: &StationNode) {
        let position = PositionContext::from_node(row);

        if let Some(id) = row.dynamic_template() {
            if let Some(template) = self.templates.dynamic_template(id) {
                self.resolver.apply_dynamic(node, template, &position).await;
            }
        }
        if let Some(id) = row.static_template() {
            if let Some(template) = self.templates.static_template(id) {
                apply_static(node, template);
            }
        }
        if let Some(id) = row.set_item_template() {
            if let Some(template) = self.templates.set_item_template(id) {
                self.resolver.apply_set_item(node, template, &position).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stationview_store::MemoryValueStore;
    use stationview_types::KeySpace;

    fn row(id: i64, parent_id: i64, name: &str) -> StationNode {
        StationNode {
            id,
            parent_id,
            name: name.into(),
            ..StationNode::default()
        }
    }

    async fn build(rows: &[StationNode], store: &MemoryValueStore) -> BuiltTree {
        let keys = KeySpace::default();
        let templates = TemplateCache::load(store, &keys).await;
        let resolver = AttributeResolver::new(store, &keys);
        TreeBuilder::new(&templates, &resolver).build(rows).await
    }

    #[tokio::test]
    async fn nests_children_under_smallest_id_root() {
        let store = MemoryValueStore::new();
        let rows = vec![
            row(2, 1, "Transmitter"),
            row(1, 0, "Station"),
            row(3, 2, "Exciter"),
        ];

        let built = build(&rows, &store).await;

        assert_eq!(
            built.root,
            json!({"Transmitter": {"Exciter": {}}})
        );
        assert!(built.cycles.is_empty());
    }

    #[tokio::test]
    async fn empty_input_yields_empty_tree() {
        let store = MemoryValueStore::new();

        let built = build(&[], &store).await;

        assert_eq!(built.root, json!({}));
        assert!(built.cycles.is_empty());
    }

    #[tokio::test]
    async fn cycle_is_cut_and_reported() {
        let store = MemoryValueStore::new();
        // Root and its child point at each other.
        let rows = vec![row(1, 2, "Station"), row(2, 1, "Transmitter")];

        let built = build(&rows, &store).await;

        assert_eq!(built.root, json!({"Transmitter": {"Station": {}}}));
        assert_eq!(built.cycles, vec![1]);
    }

    #[tokio::test]
    async fn self_parented_root_is_cut_and_reported() {
        let store = MemoryValueStore::new();
        let rows = vec![row(1, 1, "Root")];

        let built = build(&rows, &store).await;

        assert_eq!(built.root, json!({"Root": {}}));
        assert_eq!(built.cycles, vec![1]);
    }

    #[tokio::test]
    async fn orphan_rows_leave_reachable_tree_intact() {
        let store = MemoryValueStore::new();
        // Node 9's parent id has no row, so it never attaches to the tree.
        let rows = vec![row(1, 0, "Station"), row(5, 1, "Rack"), row(9, 4, "Orphan")];

        let built = build(&rows, &store).await;

        assert_eq!(built.root, json!({"Rack": {}}));
        assert!(built.cycles.is_empty());
    }

    #[tokio::test]
    async fn annotates_nodes_with_template_attributes() {
        let store = MemoryValueStore::new();
        store.put_hash(
            "svr_dynamic_model",
            &[("M1", r#"{"temp": {"parno": "T", "relation_parno": "RT", "is_enable": 0}}"#)],
        );
        store.put_hash("svr_static_model", &[("S1", r#"{"Vendor": {"para_value": "Acme"}}"#)]);
        store.put_hash("svr_DATA_P1", &[("T", "36.5")]);

        let rows = vec![
            StationNode {
                id: 1,
                parent_id: 0,
                name: "Station".into(),
                ..StationNode::default()
            },
            StationNode {
                id: 2,
                parent_id: 1,
                name: "Transmitter".into(),
                position_id: "P1".into(),
                dynamic_template_id: Some("M1".into()),
                static_template_id: Some("S1".into()),
                ..StationNode::default()
            },
        ];

        let built = build(&rows, &store).await;

        assert_eq!(
            built.root,
            json!({"Transmitter": {"temp": "36.5", "vendor": "Acme"}})
        );
    }

    #[tokio::test]
    async fn duplicate_child_names_collapse_to_last_sibling() {
        let store = MemoryValueStore::new();
        let rows = vec![
            row(1, 0, "Station"),
            row(2, 1, "Unit"),
            row(3, 1, "Unit"),
            row(4, 3, "Meter"),
        ];

        let built = build(&rows, &store).await;

        // Later siblings overwrite earlier ones under the shared name.
        assert_eq!(built.root, json!({"Unit": {"Meter": {}}}));
    }
}
