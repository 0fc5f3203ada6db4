//! # Stationview Engine
//!
//! The resolution engine behind the station overview service: it combines a
//! station's hierarchical node model with attribute templates and live
//! values into one nested overview tree.
//!
//! ## Resolution flow
//!
//! A resolution starts from a station identifier. The engine loads the
//! three template dictionaries, then fetches the station's two precomputed
//! documents — the skeleton (index) tree and the accumulator (basic) tree —
//! concurrently from the value store. The merger walks both trees together,
//! resolving every template reference it finds through the attribute
//! resolver, which applies the position-selection rule and reads live
//! values from `{prefix}DATA_{num}` hashes. When the precomputed documents
//! are unavailable, the engine falls back to scanning the station's node
//! rows from the relational store and building the tree itself, cycle-safe.
//!
//! ## Degradation over failure
//!
//! Only top-level failures abort a resolution: a blank station id, a failed
//! collaborator fetch, or an undecodable top-level document. An
//! undecodable dictionary entry, a missing live-value record or field, and
//! a parent-pointer cycle all degrade in place — the response always
//! completes, with cycles reported as a diagnostic list.
//!
//! ## Architecture
//!
//! - [`templates`]: the per-resolution dictionary cache
//! - [`resolve`]: the position-selection rule and attribute resolution
//! - [`merge`]: the skeleton-into-accumulator merge
//! - [`tree`]: the explicit-stack tree builder for the legacy scan path
//! - [`prefetch`]: batched live-value preload
//! - [`overview`]: the [`OverviewEngine`] entry point
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use stationview_engine::OverviewEngine;
//! use stationview_store::{MemoryNodeStore, MemoryValueStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let values = MemoryValueStore::new();
//! values.put_hash("svr_stationNodeModelBasic", &[("0101", r#"{"name": "North Site"}"#)]);
//! values.put_hash("svr_stationNodeModelIdx", &[("0101", r#"{"siteNo": "0101"}"#)]);
//!
//! let engine = OverviewEngine::new(Arc::new(values), Arc::new(MemoryNodeStore::new()));
//! let overview = engine.resolve_station_overview("0101").await.unwrap();
//! assert_eq!(overview.content["name"], "North Site");
//! # }
//! ```

pub mod error;
pub mod merge;
pub mod overview;
pub mod prefetch;
pub mod resolve;
pub mod templates;
pub mod tree;

pub use error::OverviewError;
pub use merge::Merger;
pub use overview::OverviewEngine;
pub use resolve::{AttributeResolver, PositionContext, Selection, apply_static, select_position};
pub use templates::{ResolvedTemplate, StaticTemplate, TemplateCache};
pub use tree::{BuiltTree, TreeBuilder};
