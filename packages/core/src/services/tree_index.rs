//! Tree Index
//!
//! In-memory adjacency view over a flat set of menu nodes. The mutation engine
//! builds one from a read made inside its transaction, asks it whether a
//! re-parent would create a cycle and which ids a delete removes, and throws
//! it away afterwards. It is never cached between operations.
//!
//! All walks use explicit stacks plus a visited set, so deep trees cannot
//! overflow the call stack and corrupted (already cyclic) data cannot loop
//! forever.

use crate::models::MenuNode;
use crate::services::error::MenuServiceError;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone)]
struct IndexEntry {
    parent_id: Option<String>,
    order: u32,
}

/// A broken tree invariant found by [`TreeIndex::audit`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TreeViolation {
    /// `parent_id` names a node that does not exist
    #[serde(rename_all = "camelCase")]
    DanglingParent { id: String, parent_id: String },

    /// Following parents from these nodes loops back (ids sorted)
    #[serde(rename_all = "camelCase")]
    Cycle { ids: Vec<String> },

    /// More than one sibling holds the same order
    #[serde(rename_all = "camelCase")]
    DuplicateOrder {
        parent_id: Option<String>,
        order: u32,
        ids: Vec<String>,
    },

    /// No sibling holds this order although the group has more members
    #[serde(rename_all = "camelCase")]
    OrderGap {
        parent_id: Option<String>,
        missing: u32,
    },
}

/// Parent → children adjacency built from a flat node set
#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    entries: HashMap<String, IndexEntry>,
    roots: Vec<String>,
    children: HashMap<String, Vec<String>>,
}

impl TreeIndex {
    /// Build the index in one pass; every child list is sorted by `(order, id)`
    pub fn from_nodes(nodes: &[MenuNode]) -> Self {
        let mut index = Self {
            entries: HashMap::with_capacity(nodes.len()),
            roots: Vec::new(),
            children: HashMap::new(),
        };

        for node in nodes {
            index.entries.insert(
                node.id.clone(),
                IndexEntry {
                    parent_id: node.parent_id.clone(),
                    order: node.order,
                },
            );
            match &node.parent_id {
                None => index.roots.push(node.id.clone()),
                Some(parent_id) => index
                    .children
                    .entry(parent_id.clone())
                    .or_default()
                    .push(node.id.clone()),
            }
        }

        let entries = &index.entries;
        let sort_key = |id: &String| (entries.get(id).map(|e| e.order), id.clone());
        index.roots.sort_by_key(sort_key);
        for group in index.children.values_mut() {
            group.sort_by_key(sort_key);
        }

        index
    }

    /// Ordered child ids of `parent` (`None` = root group)
    pub fn children_of(&self, parent: Option<&str>) -> &[String] {
        match parent {
            None => &self.roots,
            Some(parent_id) => self
                .children
                .get(parent_id)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.entries.get(id).and_then(|e| e.parent_id.as_deref())
    }

    /// Every node below `id`, in pre-order (children by order)
    pub fn descendant_ids(&self, id: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(id);

        let mut stack: Vec<&String> = self.children_of(Some(id)).iter().rev().collect();
        while let Some(current) = stack.pop() {
            if !visited.insert(current.as_str()) {
                continue;
            }
            result.push(current.clone());
            stack.extend(self.children_of(Some(current.as_str())).iter().rev());
        }

        result
    }

    /// `id` followed by its descendants
    pub fn subtree_ids(&self, id: &str) -> Vec<String> {
        let mut ids = vec![id.to_string()];
        ids.extend(self.descendant_ids(id));
        ids
    }

    /// Whether `candidate` is `node` or one of its ancestors
    ///
    /// Walks up from `node`, so the cost is the depth of `node`.
    pub fn is_ancestor_or_self(&self, candidate: &str, node: &str) -> bool {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = Some(node);

        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            if !visited.insert(id) {
                return false;
            }
            current = self.parent_of(id);
        }

        false
    }

    /// Check that `node_id` may be placed under `new_parent_id`
    pub fn check_new_parent(
        &self,
        node_id: &str,
        new_parent_id: &str,
    ) -> Result<(), MenuServiceError> {
        if node_id == new_parent_id {
            return Err(MenuServiceError::self_parent(node_id));
        }
        if self.is_ancestor_or_self(node_id, new_parent_id) {
            return Err(MenuServiceError::cycle_detected(node_id, new_parent_id));
        }
        Ok(())
    }

    /// Report every broken invariant; an empty result means the tree is sound
    pub fn audit(&self) -> Vec<TreeViolation> {
        let mut violations = Vec::new();

        let mut ids: Vec<&String> = self.entries.keys().collect();
        ids.sort();

        for id in &ids {
            if let Some(parent_id) = self.parent_of(id) {
                if !self.contains(parent_id) {
                    violations.push(TreeViolation::DanglingParent {
                        id: (*id).clone(),
                        parent_id: parent_id.to_string(),
                    });
                }
            }
        }

        violations.extend(self.find_cycles(&ids));

        let mut groups: BTreeMap<Option<&str>, Vec<(u32, &String)>> = BTreeMap::new();
        for id in &ids {
            if let Some(entry) = self.entries.get(id.as_str()) {
                groups
                    .entry(entry.parent_id.as_deref())
                    .or_default()
                    .push((entry.order, *id));
            }
        }

        for (parent_id, mut members) in groups {
            members.sort();
            let parent_id = parent_id.map(str::to_string);

            let mut by_order: BTreeMap<u32, Vec<String>> = BTreeMap::new();
            for (order, id) in &members {
                by_order.entry(*order).or_default().push((*id).clone());
            }

            for (order, holders) in &by_order {
                if holders.len() > 1 {
                    violations.push(TreeViolation::DuplicateOrder {
                        parent_id: parent_id.clone(),
                        order: *order,
                        ids: holders.clone(),
                    });
                }
            }

            for missing in 0..members.len() as u32 {
                if !by_order.contains_key(&missing) {
                    violations.push(TreeViolation::OrderGap {
                        parent_id: parent_id.clone(),
                        missing,
                    });
                }
            }
        }

        violations
    }

    fn find_cycles(&self, ids: &[&String]) -> Vec<TreeViolation> {
        let mut cycles = Vec::new();
        let mut settled: HashSet<&str> = HashSet::new();

        for start in ids {
            let mut path: Vec<&str> = Vec::new();
            let mut on_path: HashSet<&str> = HashSet::new();
            let mut current = Some(start.as_str());

            while let Some(id) = current {
                if settled.contains(id) || !self.contains(id) {
                    break;
                }
                if on_path.contains(id) {
                    if let Some(pos) = path.iter().position(|p| *p == id) {
                        let mut members: Vec<String> =
                            path[pos..].iter().map(|s| s.to_string()).collect();
                        members.sort();
                        cycles.push(TreeViolation::Cycle { ids: members });
                    }
                    break;
                }
                path.push(id);
                on_path.insert(id);
                current = self.parent_of(id);
            }

            settled.extend(path);
        }

        cycles
    }
}
