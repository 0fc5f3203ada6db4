//! Template dictionary cache.
//!
//! The three dictionaries (dynamic, static, set-item) each live in one hash
//! in the value store, keyed by template id with a JSON document per entry.
//! The cache loads all three up front so the merge pass never re-reads a
//! dictionary, and stays immutable for the life of one resolution.
//!
//! Loading is tolerant by design: an entry that fails to decode is skipped
//! individually, and a dictionary whose fetch fails outright degrades to an
//! empty dictionary. Either way resolution proceeds; nodes referencing an
//! absent template simply resolve no attributes from it.

use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use stationview_store::ValueStore;
use stationview_types::{AttributeDef, KeySpace};

/// One dynamic or set-item template: attribute name to definition.
pub type ResolvedTemplate = HashMap<String, AttributeDef>;

/// One static template: attribute name to raw definition value.
pub type StaticTemplate = HashMap<String, Value>;

/// The three template dictionaries for one resolution session.
#[derive(Debug, Default)]
pub struct TemplateCache {
    dynamic: HashMap<String, ResolvedTemplate>,
    statics: HashMap<String, StaticTemplate>,
    set_item: HashMap<String, ResolvedTemplate>,
}

impl TemplateCache {
    /// Load all three dictionaries, one full-hash read each.
    pub async fn load(values: &dyn ValueStore, keys: &KeySpace) -> Self {
        let dynamic = load_resolved(values, &keys.dynamic_dictionary()).await;
        let statics = load_static(values, &keys.static_dictionary()).await;
        let set_item = load_resolved(values, &keys.set_item_dictionary()).await;
        Self {
            dynamic,
            statics,
            set_item,
        }
    }

    /// Dynamic template by id.
    pub fn dynamic_template(&self, id: &str) -> Option<&ResolvedTemplate> {
        self.dynamic.get(id)
    }

    /// Static template by id.
    pub fn static_template(&self, id: &str) -> Option<&StaticTemplate> {
        self.statics.get(id)
    }

    /// Set-item template by id.
    pub fn set_item_template(&self, id: &str) -> Option<&ResolvedTemplate> {
        self.set_item.get(id)
    }
}

async fn load_resolved(values: &dyn ValueStore, key: &str) -> HashMap<String, ResolvedTemplate> {
    let entries = match values.hash_get_all(key).await {
        Ok(entries) => entries,
        Err(error) => {
            warn!(key, %error, "template dictionary fetch failed; continuing with an empty dictionary");
            return HashMap::new();
        }
    };

    let mut templates = HashMap::with_capacity(entries.len());
    for (template_id, raw) in entries {
        match serde_json::from_str::<ResolvedTemplate>(&raw) {
            Ok(template) => {
                templates.insert(template_id, template);
            }
            Err(error) => {
                warn!(key, template_id = %template_id, %error, "skipping undecodable template entry");
            }
        }
    }
    templates
}

async fn load_static(values: &dyn ValueStore, key: &str) -> HashMap<String, StaticTemplate> {
    let entries = match values.hash_get_all(key).await {
        Ok(entries) => entries,
        Err(error) => {
            warn!(key, %error, "template dictionary fetch failed; continuing with an empty dictionary");
            return HashMap::new();
        }
    };

    let mut templates = HashMap::with_capacity(entries.len());
    for (template_id, raw) in entries {
        match serde_json::from_str::<StaticTemplate>(&raw) {
            Ok(template) => {
                templates.insert(template_id, template);
            }
            Err(error) => {
                warn!(key, template_id = %template_id, %error, "skipping undecodable template entry");
            }
        }
    }
    templates
}
