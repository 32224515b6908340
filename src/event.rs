use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{
    error::ErrorKind,
    filter::FilterState,
    properties::{NodeId, PolicyClass, RecordId},
    tree::CategoryNode,
};

/// User actions accepted from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum CatalogEvent {
    /// Replace the free-text query. Clears any pinned selection.
    SetQuery(String),
    /// Flip one class tag on or off. Clears any pinned selection.
    ToggleTag(PolicyClass),
    /// Pin the result list to one node's subtree.
    SelectNode(NodeId),
    ClearSelection,
    /// Back to the startup state: empty query, every tag, nothing pinned.
    ResetFilters,
}

impl Display for CatalogEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            CatalogEvent::SetQuery(_) => write!(f, "SetQuery"),
            CatalogEvent::ToggleTag(tag) => write!(f, "ToggleTag({tag})"),
            CatalogEvent::SelectNode(node) => write!(f, "SelectNode({node})"),
            CatalogEvent::ClearSelection => write!(f, "ClearSelection"),
            CatalogEvent::ResetFilters => write!(f, "ResetFilters"),
        }
    }
}

/// Owned copy of a view, for consumers that outlive the engine borrow. Records are referenced by
/// id only; resolve them through [crate::store::RecordStore::get].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSnapshot {
    pub revision: u64,
    pub state: FilterState,
    pub tree: CategoryNode,
    pub records: Vec<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<Vec<f32>>,
}

/// Notifications emitted to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    FilterChanged(ViewSnapshot),
    Error { kind: ErrorKind, message: String },
}

impl Display for Notification {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Notification::FilterChanged(view) => write!(f, "FilterChanged(r{})", view.revision),
            Notification::Error { kind, .. } => write!(f, "Error({kind})"),
        }
    }
}
