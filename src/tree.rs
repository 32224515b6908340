//! Category tree construction.
//!
//! A [CategoryTree] is always built from scratch for a given record subset. Nodes only exist on
//! the path of at least one record, so a built tree never contains an empty branch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{
    properties::{CategoryPath, PolicyRecord, RecordId},
    store::RecordStore,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    /// Child categories, ordered by segment.
    pub children: BTreeMap<String, CategoryNode>,
    /// Records whose category path ends at this node, in the order they were indexed.
    pub records: Vec<RecordId>,
}

impl CategoryNode {
    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.records.is_empty()
    }

    pub fn find(&self, path: &CategoryPath) -> Option<&CategoryNode> {
        path.segments()
            .iter()
            .try_fold(self, |node, segment| node.children.get(segment))
    }

    /// Every record id at or below this node: own records first, then each child in segment
    /// order.
    pub fn record_ids(&self) -> Vec<RecordId> {
        let mut ids = Vec::with_capacity(self.record_count());
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids(&self, ids: &mut Vec<RecordId>) {
        ids.extend_from_slice(&self.records);
        for child in self.children.values() {
            child.collect_ids(ids);
        }
    }

    /// Number of records at or below this node.
    pub fn record_count(&self) -> usize {
        self.records.len()
            + self
                .children
                .values()
                .map(CategoryNode::record_count)
                .sum::<usize>()
    }

    /// Number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        self.children
            .values()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryTree {
    root: CategoryNode,
}

impl CategoryTree {
    /// Index `records` by category path. Runs in O(total path length).
    ///
    /// Records are expected to come from a [RecordStore], which never yields an empty path (those
    /// are relabelled with the configured uncategorized label at load). A record built by hand with
    /// an empty path is attached to the root, where it still counts toward [CategoryTree::record_ids]
    /// but has no [NavNode].
    pub fn build<'a, I: IntoIterator<Item = &'a PolicyRecord>>(records: I) -> Self {
        let mut root = CategoryNode::default();
        for record in records {
            let mut node = &mut root;
            for segment in record.category_path.segments() {
                node = node.children.entry(segment.clone()).or_default();
            }
            node.records.push(record.id);
        }
        CategoryTree { root }
    }

    pub fn root(&self) -> &CategoryNode {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn find(&self, path: &CategoryPath) -> Option<&CategoryNode> {
        self.root.find(path)
    }

    pub fn record_ids(&self) -> Vec<RecordId> {
        self.root.record_ids()
    }

    pub fn record_count(&self) -> usize {
        self.root.record_count()
    }

    pub fn node_count(&self) -> usize {
        self.root.descendant_count()
    }

    /// The records of this tree, in store order. Ids unknown to `store` are dropped.
    pub fn flatten<'s>(&self, store: &'s RecordStore) -> Vec<&'s PolicyRecord> {
        let mut positions: Vec<usize> = self
            .record_ids()
            .iter()
            .filter_map(|id| store.position(id))
            .collect();
        positions.sort_unstable();
        positions
            .into_iter()
            .filter_map(|position| store.at(position))
            .collect()
    }

    /// Flatten into a [NavTree]. `separator` only affects each node's `title`; keys are
    /// [NavTree::key_of] the node path.
    pub fn nav_tree(&self, separator: &str) -> NavTree {
        let mut nav = NavTree::default();
        for (segment, child) in self.root.children.iter() {
            let path = CategoryPath::new([segment.clone()]);
            let key = nav.insert(child, path, None, separator);
            nav.roots.push(key);
        }
        nav
    }
}

/// Flat navigation projection of a [CategoryTree].
///
/// Nested maps serialize awkwardly across the wasm boundary; this keeps one map of nodes and lists
/// children by key instead. A key is the JSON array of the node's segments, e.g. `["A","B"]`, so a
/// segment containing the separator can never alias a deeper node. From JavaScript,
/// `nav.nodes[JSON.stringify(path)]` finds a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavTree {
    pub nodes: BTreeMap<String, NavNode>,
    /// Top-level node keys, in segment order.
    pub roots: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavNode {
    pub key: String,
    pub label: String,
    /// The full path joined with the display separator.
    pub title: String,
    pub path: CategoryPath,
    pub parent: Option<String>,
    /// Child node keys, in segment order.
    pub children: Vec<String>,
    /// Records attached directly at this node.
    pub records: Vec<RecordId>,
    /// Records at or below this node.
    pub count: usize,
}

impl NavTree {
    fn insert(
        &mut self,
        node: &CategoryNode,
        path: CategoryPath,
        parent: Option<String>,
        separator: &str,
    ) -> String {
        let key = NavTree::key_of(&path);
        let children = node
            .children
            .iter()
            .map(|(segment, child)| {
                self.insert(child, path.child(segment.clone()), Some(key.clone()), separator)
            })
            .collect();
        let nav_node = NavNode {
            key: key.clone(),
            label: path.label().unwrap_or_default().to_string(),
            title: path.display(separator),
            path,
            parent,
            children,
            records: node.records.clone(),
            count: node.record_count(),
        };
        self.nodes.insert(key.clone(), nav_node);
        key
    }

    /// The key a node at `path` is stored under.
    pub fn key_of(path: &CategoryPath) -> String {
        Value::from(path.segments().to_vec()).to_string()
    }

    pub fn get(&self, key: &str) -> Option<&NavNode> {
        self.nodes.get(key)
    }

    pub fn get_path(&self, path: &CategoryPath) -> Option<&NavNode> {
        self.get(&NavTree::key_of(path))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
