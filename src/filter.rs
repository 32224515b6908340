//! The filter engine: one state, changed only by [CatalogEvent]s.
//!
//! After every applied event the engine holds a consistent pair of (filtered records, pruned tree)
//! where the tree is exactly [CategoryTree::build] over the filtered records. Recomputation is
//! synchronous and total, so there is never a partially updated view.
//!
//! Text and tag filters are conjunctive. A pinned node selection replaces the text filter but still
//! honours the tag filter; it lasts until the next query edit, tag toggle, clear, or reset.

use serde::{Deserialize, Serialize};

use crate::{
    config::{CatalogConfig, MatchMode},
    error::CatalogError,
    event::{CatalogEvent, ViewSnapshot},
    properties::{ClassSet, NodeId, PolicyClass, PolicyRecord, RecordId},
    query::Matcher,
    store::RecordStore,
    tree::CategoryTree,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    pub query_text: String,
    pub active_tags: ClassSet,
    /// Pinned node, if any.
    pub selection: Option<NodeId>,
}

impl FilterState {
    pub fn is_default(&self) -> bool {
        *self == FilterState::default()
    }
}

#[derive(Debug, Clone)]
pub struct FilterEngine {
    store: RecordStore,
    matcher: Matcher,
    full_tree: CategoryTree,
    state: FilterState,
    revision: u64,
    /// Store positions of the filtered records, in result order.
    filtered: Vec<usize>,
    /// Parallel to `filtered` in fuzzy mode while a query is active.
    scores: Option<Vec<f32>>,
    tree: CategoryTree,
}

impl FilterEngine {
    pub fn new(store: RecordStore, config: &CatalogConfig) -> Self {
        let full_tree = CategoryTree::build(store.records());
        let mut engine = FilterEngine {
            store,
            matcher: Matcher::new(config),
            full_tree,
            state: FilterState::default(),
            revision: 0,
            filtered: Vec::new(),
            scores: None,
            tree: CategoryTree::default(),
        };
        engine.recompute();
        engine
    }

    /// Apply `event` and return the new revision. A failed event leaves the engine untouched.
    pub fn apply(&mut self, event: &CatalogEvent) -> Result<u64, CatalogError> {
        match event {
            CatalogEvent::SetQuery(text) => Ok(self.set_query(text)),
            CatalogEvent::ToggleTag(tag) => Ok(self.toggle_tag(*tag)),
            CatalogEvent::SelectNode(node) => self.select_node(node),
            CatalogEvent::ClearSelection => Ok(self.clear_selection()),
            CatalogEvent::ResetFilters => Ok(self.reset_filters()),
        }
    }

    pub fn set_query(&mut self, text: &str) -> u64 {
        self.state.query_text = text.to_string();
        self.state.selection = None;
        self.recompute()
    }

    pub fn toggle_tag(&mut self, tag: PolicyClass) -> u64 {
        let active = self.state.active_tags.toggle(tag);
        tracing::debug!("tag {tag} is now {}", if active { "on" } else { "off" });
        self.state.selection = None;
        self.recompute()
    }

    /// Pin the results to every record under `node`, intersected with the active tags. The query
    /// text is kept in the state but not applied while the selection is pinned.
    pub fn select_node(&mut self, node: &NodeId) -> Result<u64, CatalogError> {
        if self.full_tree.find(node).is_none() {
            tracing::warn!("select_node: no category at '{node}'");
            return Err(CatalogError::NotFound(format!("no category at '{node}'")));
        }
        self.state.selection = Some(node.clone());
        Ok(self.recompute())
    }

    pub fn clear_selection(&mut self) -> u64 {
        self.state.selection = None;
        self.recompute()
    }

    pub fn reset_filters(&mut self) -> u64 {
        self.state = FilterState::default();
        self.recompute()
    }

    /// Store positions matching `query` and `tags`, without touching the engine state. Fuzzy mode
    /// returns them ranked.
    pub fn filter_positions(&self, query: &str, tags: &ClassSet) -> Vec<(usize, f32)> {
        if tags.is_empty() {
            return Vec::new();
        }
        let candidates = self
            .store
            .records()
            .iter()
            .enumerate()
            .filter(|(_, record)| tags.contains(record.policy_class))
            .map(|(position, _)| position);
        self.matcher
            .search(self.store.search_index(), query, candidates)
    }

    /// Store positions under `node` in the full catalog, restricted to `tags`, in store order.
    pub fn selection_positions(&self, node: &NodeId, tags: &ClassSet) -> Option<Vec<usize>> {
        let subtree = self.full_tree.find(node)?;
        let mut positions: Vec<usize> = subtree
            .record_ids()
            .iter()
            .filter_map(|id| self.store.position(id))
            .filter(|position| {
                self.store
                    .at(*position)
                    .is_some_and(|record| tags.contains(record.policy_class))
            })
            .collect();
        positions.sort_unstable();
        Some(positions)
    }

    fn recompute(&mut self) -> u64 {
        let (positions, scores) = match &self.state.selection {
            Some(node) => (
                self.selection_positions(node, &self.state.active_tags)
                    .unwrap_or_default(),
                None,
            ),
            None => {
                let hits = self.filter_positions(&self.state.query_text, &self.state.active_tags);
                let ranked = self.matcher.mode() == MatchMode::Fuzzy
                    && !self.matcher.prepare(&self.state.query_text).is_all();
                let scores = ranked.then(|| hits.iter().map(|(_, score)| *score).collect());
                (hits.into_iter().map(|(position, _)| position).collect(), scores)
            }
        };

        self.tree = CategoryTree::build(
            positions
                .iter()
                .filter_map(|position| self.store.at(*position)),
        );
        self.filtered = positions;
        self.scores = scores;
        self.revision += 1;
        tracing::debug!(
            "revision {}: {} of {} records, {} tree nodes",
            self.revision,
            self.filtered.len(),
            self.store.len(),
            self.tree.node_count()
        );
        self.revision
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The pruned tree for the current filtered records.
    pub fn tree(&self) -> &CategoryTree {
        &self.tree
    }

    /// The tree of the whole store, used to resolve node selections.
    pub fn full_tree(&self) -> &CategoryTree {
        &self.full_tree
    }

    pub fn filtered_records(&self) -> Vec<&PolicyRecord> {
        self.filtered
            .iter()
            .filter_map(|position| self.store.at(*position))
            .collect()
    }

    pub fn filtered_ids(&self) -> Vec<RecordId> {
        self.filtered_records()
            .iter()
            .map(|record| record.id)
            .collect()
    }

    pub fn scores(&self) -> Option<&[f32]> {
        self.scores.as_deref()
    }

    /// Owned copy of the current view.
    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            revision: self.revision,
            state: self.state.clone(),
            tree: self.tree.root().clone(),
            records: self.filtered_ids(),
            scores: self.scores.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::{CategoryPath, RawPolicy};
    use serde_json::json;
    use test_log::test;

    fn engine() -> FilterEngine {
        let raw: Vec<RawPolicy> = serde_json::from_value(json!([
            {"name": "Allow X", "categoryPath": ["A", "B"], "tag": "Machine"},
            {"name": "Block Y", "categoryPath": ["A", "C"], "tag": "User"}
        ]))
        .unwrap();
        let config = CatalogConfig::default();
        FilterEngine::new(RecordStore::load(raw, &config).unwrap(), &config)
    }

    #[test]
    fn test_query_prunes_tree() {
        let mut engine = engine();
        engine.set_query("allow");
        let ids = engine.filtered_ids();
        assert_eq!(ids, vec![engine.store().at(0).unwrap().id]);

        let tree = engine.tree();
        assert_eq!(tree.root().children.len(), 1);
        let a = tree.find(&CategoryPath::new(["A"])).unwrap();
        assert_eq!(a.children.keys().collect::<Vec<_>>(), vec!["B"]);
        assert_eq!(a.children["B"].records, ids);
        assert!(tree.find(&CategoryPath::new(["A", "C"])).is_none());
    }

    #[test]
    fn test_toggle_tag_off_excludes_class() {
        let mut engine = engine();
        engine.toggle_tag(PolicyClass::User);
        let names: Vec<&str> = engine
            .filtered_records()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["Allow X"]);

        // A matching query does not bring it back.
        engine.set_query("block");
        assert!(engine.filtered_records().is_empty());
        assert!(engine.tree().is_empty());
    }

    #[test]
    fn test_no_active_tags_means_no_records() {
        let mut engine = engine();
        engine.toggle_tag(PolicyClass::Machine);
        engine.toggle_tag(PolicyClass::User);
        engine.toggle_tag(PolicyClass::Both);
        assert!(engine.state().active_tags.is_empty());
        assert!(engine.filtered_records().is_empty());
    }

    #[test]
    fn test_select_node_ignores_query_but_honours_tags() {
        let mut engine = engine();
        engine.set_query("allow");
        engine.select_node(&CategoryPath::new(["A"])).unwrap();
        assert_eq!(engine.filtered_records().len(), 2);
        assert_eq!(engine.state().query_text, "allow");

        engine.toggle_tag(PolicyClass::User);
        assert_eq!(engine.state().selection, None);
        engine.select_node(&CategoryPath::new(["A"])).unwrap();
        let names: Vec<&str> = engine
            .filtered_records()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["Allow X"]);

        engine.clear_selection();
        assert_eq!(engine.state().selection, None);
    }

    #[test]
    fn test_unknown_node_leaves_state_untouched() {
        let mut engine = engine();
        engine.set_query("block");
        let before = (engine.state().clone(), engine.revision(), engine.filtered_ids());
        let err = engine
            .apply(&CatalogEvent::SelectNode(CategoryPath::new(["Nope"])))
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
        assert_eq!(
            before,
            (engine.state().clone(), engine.revision(), engine.filtered_ids())
        );
    }

    #[test]
    fn test_snapshot_does_not_advance_revision() {
        let mut engine = engine();
        engine.set_query("block");
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.revision, engine.revision());
        assert_eq!(snapshot.records, engine.filtered_ids());
        assert_eq!(&snapshot.tree, engine.tree().root());
        assert_eq!(engine.snapshot(), snapshot);
    }

    #[test]
    fn test_revisions_strictly_increase() {
        let mut engine = engine();
        let mut last = engine.revision();
        let events = [
            CatalogEvent::SetQuery("x".into()),
            CatalogEvent::SetQuery("x".into()),
            CatalogEvent::ToggleTag(PolicyClass::Machine),
            CatalogEvent::SelectNode(CategoryPath::new(["A", "C"])),
            CatalogEvent::ClearSelection,
            CatalogEvent::ResetFilters,
        ];
        for event in events.iter() {
            let revision = engine.apply(event).unwrap();
            assert!(revision > last, "{event} did not advance the revision");
            last = revision;
        }
    }

    #[test]
    fn test_empty_store() {
        let config = CatalogConfig::default();
        let mut engine = FilterEngine::new(RecordStore::default(), &config);
        assert!(engine.tree().is_empty());
        assert!(engine.filtered_records().is_empty());
        engine.set_query("anything");
        assert!(engine.tree().is_empty());
        assert!(engine.select_node(&CategoryPath::root()).is_ok());
        assert!(engine.filtered_records().is_empty());
    }
}
