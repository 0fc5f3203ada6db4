//! Key namespace for the value store and the skeleton wire keys.
//!
//! All value-store keys share a configurable namespace prefix; the suffixes
//! themselves are fixed by the upstream model writers. Skeleton documents
//! reference templates and position context through the constants below.

use serde::{Deserialize, Serialize};

/// Skeleton key naming a dynamic template reference.
pub const DYNAMIC_TEMPLATE_KEY: &str = "dynamic_model_id";
/// Skeleton key naming a static template reference.
pub const STATIC_TEMPLATE_KEY: &str = "static_model_id";
/// Skeleton key naming a set-item template reference.
pub const SET_ITEM_TEMPLATE_KEY: &str = "setitem_model_id";
/// Flattening marker: children of this key merge into the parent node.
pub const LINK_KEY: &str = "rConfig";
/// Skeleton key carrying a node's position identifier.
pub const POSITION_ID_KEY: &str = "positionId";
/// Skeleton key carrying a node's related position identifier.
pub const RELATION_POSITION_ID_KEY: &str = "rPositionId";

/// Value-store key namespace.
///
/// Every key the engine reads is derived from the configured prefix, so one
/// deployment can host several model namespaces side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySpace {
    /// Prefix applied to every derived key.
    pub prefix: String,
}

impl Default for KeySpace {
    fn default() -> Self {
        Self { prefix: "svr_".into() }
    }
}

impl KeySpace {
    /// Key space under a custom prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Hash of dynamic template definitions, keyed by template id.
    pub fn dynamic_dictionary(&self) -> String {
        format!("{}dynamic_model", self.prefix)
    }

    /// Hash of static template definitions, keyed by template id.
    pub fn static_dictionary(&self) -> String {
        format!("{}static_model", self.prefix)
    }

    /// Hash of set-item template definitions, keyed by template id.
    pub fn set_item_dictionary(&self) -> String {
        format!("{}setitem_model", self.prefix)
    }

    /// Hash of per-station accumulator (basic) documents.
    pub fn basic_documents(&self) -> String {
        format!("{}stationNodeModelBasic", self.prefix)
    }

    /// Hash of per-station skeleton (index) documents.
    pub fn index_documents(&self) -> String {
        format!("{}stationNodeModelIdx", self.prefix)
    }

    /// Station directory document.
    pub fn stations(&self) -> String {
        format!("{}stations", self.prefix)
    }

    /// Station identifier directory document.
    pub fn station_ids(&self) -> String {
        format!("{}station_id", self.prefix)
    }

    /// Live-value hash for one position identifier.
    pub fn data_key(&self, num: &str) -> String {
        format!("{}DATA_{}", self.prefix, num)
    }
}
