//! # policy-catalog
//!
//! The indexing, category-tree and filter/search core of a browser for Group Policy (ADMX)
//! catalogs.
//!
//! ## Overview
//!
//! A catalog is a flat list of policy records, each carrying a category path such as
//! `Windows Components → Microsoft Edge → Security`. policy-catalog loads that list once, indexes it
//! into a category tree, and keeps a single filter state (free-text query, active class tags, an
//! optional pinned node). Every user action is an event; after each event the engine holds a
//! consistent pair of filtered records and the tree pruned to exactly those records.
//!
//! ### Key Features
//!
//! - **Stable identifiers**: every record gets a UUID v5 [`properties::RecordId`] derived from its
//!   registry key, value name, and ordinal, so the same payload always yields the same ids
//! - **Pruned trees**: the visible tree only contains nodes that lead to at least one matching
//!   record
//! - **Conjunctive filtering**: text and tag filters are combined with AND, never OR
//! - **Substring or fuzzy matching**: Unicode-aware case folding, with an optional edit-distance
//!   mode that ranks results
//! - **Tolerant loading**: malformed records are skipped and reported, or the load aborts,
//!   depending on configuration
//!
//! ## Architecture
//!
//! - **[`properties`]**: record schema, ids, policy classes, category paths
//! - **[`store`]**: the immutable, ordered [`store::RecordStore`]
//! - **[`tree`]**: [`tree::CategoryTree`] construction and its flat [`tree::NavTree`] projection
//! - **[`query`]**: text folding and the [`query::Matcher`]
//! - **[`filter`]**: the [`filter::FilterEngine`] state machine
//! - **[`event`]**: [`event::CatalogEvent`]s in, [`event::Notification`]s out
//! - **[`view`]**: the [`view::ViewProjector`] seam and the [`view::ViewSink`] trait
//! - **[`debounce`]**: coalescing of rapid query edits
//! - **[`config`]**: TOML session configuration
//!
//! ## Quick Start
//!
//! ```rust
//! use policy_catalog::{
//!     config::CatalogConfig, event::CatalogEvent, properties::PolicyClass, view::ViewProjector,
//! };
//!
//! # fn main() -> Result<(), policy_catalog::CatalogError> {
//! let payload = r#"[
//!     {"name": "Allow X", "categoryPath": ["A", "B"], "policyClass": "Machine"},
//!     {"name": "Block Y", "categoryPath": ["A", "C"], "policyClass": "User"}
//! ]"#;
//! let mut projector = ViewProjector::from_json(payload, &CatalogConfig::default(), Vec::new())?;
//!
//! projector.dispatch(CatalogEvent::SetQuery("allow".to_string()))?;
//! assert_eq!(projector.view().records.len(), 1);
//!
//! projector.dispatch(CatalogEvent::ToggleTag(PolicyClass::Machine))?;
//! assert!(projector.view().tree.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ### Subscribing to Changes
//!
//! Any `tokio::sync::mpsc::UnboundedSender<Notification>` is a [`view::ViewSink`]:
//!
//! ```rust
//! # use policy_catalog::{config::CatalogConfig, event::{CatalogEvent, Notification}, view::ViewProjector};
//! # fn main() -> Result<(), policy_catalog::CatalogError> {
//! # let payload = r#"[{"name": "Allow X", "categoryPath": ["A", "B"]}]"#;
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Notification>();
//! let mut projector = ViewProjector::from_json(payload, &CatalogConfig::default(), Vec::new())?;
//! projector.subscribe(Box::new(tx));
//! projector.dispatch(CatalogEvent::ResetFilters)?;
//!
//! while let Ok(notification) = rx.try_recv() {
//!     println!("{notification}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **default**: the native library
//! - **wasm**: `wasm-bindgen` bindings ([`wasm::CatalogWasm`]) for the browser

pub mod config;
pub mod debounce;
pub mod error;
pub mod event;
pub mod filter;
pub mod properties;
pub mod query;
pub mod store;
#[cfg(test)]
mod tests;
pub mod tree;
pub mod view;
#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::*;
