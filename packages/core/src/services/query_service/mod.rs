//! Query Service - Read Access to the Menu Tree
//!
//! This module serves flat and nested views of the stored nodes. It reads
//! through the store directly (never through a write transaction), so reads
//! see the last committed state and never block writers.
//!
//! # Tree Assembly
//!
//! [`build_tree`] turns a flat node list into nested [`MenuTreeNode`]s:
//!
//! - siblings are sorted by `(order, id)`, so equal input gives equal output
//!   regardless of input order
//! - nodes whose parent is not in the input are dropped together with their
//!   subtrees, because there is no place to attach them
//! - assembly uses an explicit stack, so depth is bounded only by memory
//!
//! # Examples
//!
//! ```rust,no_run
//! use menutree_core::db::{DatabaseService, TursoStore};
//! use menutree_core::services::QueryService;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let db = Arc::new(DatabaseService::new(PathBuf::from("./data/menus.db")).await?);
//! let query_service = QueryService::new(Arc::new(TursoStore::new(db)));
//!
//! for root in query_service.list_tree().await? {
//!     println!("{} ({} children)", root.node.title, root.children.len());
//! }
//! # Ok(())
//! # }
//! ```

use crate::db::MenuStore;
use crate::models::{MenuNode, MenuTreeNode};
use crate::services::error::MenuServiceError;
use crate::services::tree_index::{TreeIndex, TreeViolation};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Read-side service over a [`MenuStore`]
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn MenuStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn MenuStore>) -> Self {
        Self { store }
    }

    /// Fetch one node; `NotFound` if absent
    pub async fn get_one(&self, id: &str) -> Result<MenuNode, MenuServiceError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| MenuServiceError::not_found(id))
    }

    /// Every node, sorted by title, then creation time, then id
    pub async fn list_flat(&self) -> Result<Vec<MenuNode>, MenuServiceError> {
        Ok(self.store.list_all().await?)
    }

    /// One sibling group in order (`None` = root entries)
    pub async fn list_children(
        &self,
        parent_id: Option<&str>,
    ) -> Result<Vec<MenuNode>, MenuServiceError> {
        Ok(self.store.list_by_parent(parent_id).await?)
    }

    /// The whole menu as nested root entries
    pub async fn list_tree(&self) -> Result<Vec<MenuTreeNode>, MenuServiceError> {
        let nodes = self.list_flat().await?;
        let tree = build_tree(&nodes);

        tracing::debug!(
            "Assembled menu tree: {} nodes, {} roots",
            nodes.len(),
            tree.len()
        );
        Ok(tree)
    }

    /// One node with all of its nested descendants
    pub async fn get_subtree(&self, id: &str) -> Result<MenuTreeNode, MenuServiceError> {
        let nodes = self.list_flat().await?;
        let root = nodes
            .iter()
            .find(|n| n.id == id)
            .ok_or_else(|| MenuServiceError::not_found(id))?;

        TreeAssembler::new(&nodes)
            .assemble(&[root])
            .pop()
            .ok_or_else(|| MenuServiceError::not_found(id))
    }

    /// Check the stored tree; an empty result means every invariant holds
    pub async fn audit(&self) -> Result<Vec<TreeViolation>, MenuServiceError> {
        let nodes = self.list_flat().await?;
        let violations = TreeIndex::from_nodes(&nodes).audit();

        if !violations.is_empty() {
            tracing::warn!("Menu tree audit found {} violations", violations.len());
        }
        Ok(violations)
    }
}

/// Assemble a flat node list into ordered nested root entries
pub fn build_tree(nodes: &[MenuNode]) -> Vec<MenuTreeNode> {
    let assembler = TreeAssembler::new(nodes);
    let roots = assembler.children_of(None).to_vec();
    assembler.assemble(&roots)
}

/// Children lookup shared by full-tree and subtree assembly
struct TreeAssembler<'a> {
    roots: Vec<&'a MenuNode>,
    children: HashMap<&'a str, Vec<&'a MenuNode>>,
}

impl<'a> TreeAssembler<'a> {
    fn new(nodes: &'a [MenuNode]) -> Self {
        let mut roots = Vec::new();
        let mut children: HashMap<&'a str, Vec<&'a MenuNode>> = HashMap::new();

        for node in nodes {
            match node.parent_id.as_deref() {
                None => roots.push(node),
                Some(parent_id) => children.entry(parent_id).or_default().push(node),
            }
        }

        let by_position =
            |a: &&MenuNode, b: &&MenuNode| (a.order, &a.id).cmp(&(b.order, &b.id));
        roots.sort_by(by_position);
        for group in children.values_mut() {
            group.sort_by(by_position);
        }

        Self { roots, children }
    }

    fn children_of(&self, parent_id: Option<&str>) -> &[&'a MenuNode] {
        match parent_id {
            None => &self.roots,
            Some(parent_id) => self
                .children
                .get(parent_id)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        }
    }

    /// Build the subtrees below `tops`
    ///
    /// Nodes are listed in pre-order first and then built in reverse, so
    /// every child is finished before its parent picks it up.
    fn assemble(&self, tops: &[&'a MenuNode]) -> Vec<MenuTreeNode> {
        let mut pre_order: Vec<&'a MenuNode> = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&'a MenuNode> = tops.iter().rev().copied().collect();

        while let Some(node) = stack.pop() {
            if !visited.insert(node.id.as_str()) {
                continue;
            }
            pre_order.push(node);
            stack.extend(self.children_of(Some(node.id.as_str())).iter().rev());
        }

        let mut built: HashMap<&str, MenuTreeNode> = HashMap::with_capacity(pre_order.len());
        for node in pre_order.iter().rev() {
            let children = self
                .children_of(Some(node.id.as_str()))
                .iter()
                .filter_map(|child| built.remove(child.id.as_str()))
                .collect();
            built.insert(
                node.id.as_str(),
                MenuTreeNode {
                    node: (*node).clone(),
                    children,
                },
            );
        }

        tops.iter()
            .filter_map(|top| built.remove(top.id.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod query_service_test;
