//! Menu Service - Tree Mutations
//!
//! This module provides the write side of the menu tree:
//!
//! - `create` - insert at the end of a sibling group or at an explicit position
//! - `update` - rename, re-describe, or re-parent without touching sibling order
//! - `move_node` - re-parent with full order maintenance in both groups
//! - `reorder` - move a node to another position inside its own group
//! - `remove` - delete a node with its whole subtree and close the gap
//!
//! # Transactions
//!
//! Every operation runs inside exactly one store transaction. The transaction
//! takes the write lock when it begins, so the existence checks, the cycle
//! check and every order shift see the same state and either all apply or
//! none do. Errors roll the transaction back before they are returned.
//!
//! # Order Density
//!
//! Within each sibling group, orders are always exactly `0..n-1`. Requested
//! positions beyond the end of a group are clamped instead of rejected.
//! `update` is the one exception: it re-parents without shifting anything, so
//! callers that care about positions use `move_node`.

use crate::db::{MenuNodeChanges, MenuStore, MenuTransaction, OrderRange};
use crate::models::{DeleteResult, MenuNode, MenuNodeUpdate, NewMenuNode};
use crate::services::error::MenuServiceError;
use crate::services::tree_index::TreeIndex;
use chrono::Utc;
use std::sync::Arc;

/// Mutation engine over a [`MenuStore`]
///
/// Cheap to clone; clones share the store.
#[derive(Clone)]
pub struct MenuService {
    store: Arc<dyn MenuStore>,
}

impl MenuService {
    /// Create a new MenuService
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use menutree_core::db::{DatabaseService, TursoStore};
    /// # use menutree_core::models::NewMenuNode;
    /// # use menutree_core::services::MenuService;
    /// # use std::path::PathBuf;
    /// # use std::sync::Arc;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Arc::new(DatabaseService::new(PathBuf::from("./data/menus.db")).await?);
    /// let service = MenuService::new(Arc::new(TursoStore::new(db)));
    ///
    /// let docs = service.create(NewMenuNode::new("Docs")).await?;
    /// service.create(NewMenuNode::new("Intro").with_parent(&docs.id)).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(store: Arc<dyn MenuStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn MenuStore> {
        &self.store
    }

    /// Create a node
    ///
    /// Without an order the node is appended to its sibling group. With an
    /// order, siblings at or after that position move down by one; an order
    /// past the end appends.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` for a blank title or a malformed parent id
    /// - `ParentNotFound` if the parent does not exist
    pub async fn create(&self, input: NewMenuNode) -> Result<MenuNode, MenuServiceError> {
        input.validate()?;

        let tx = self.store.begin().await?;
        let result = Self::create_in(tx.as_ref(), input).await;
        let node = Self::finish(tx, "create", result).await?;

        tracing::info!(
            "Created menu node {} (parent: {:?}, order: {})",
            node.id,
            node.parent_id,
            node.order
        );
        Ok(node)
    }

    async fn create_in(
        tx: &dyn MenuTransaction,
        input: NewMenuNode,
    ) -> Result<MenuNode, MenuServiceError> {
        let parent_id = input.parent_id.as_deref();
        if let Some(parent_id) = parent_id {
            if tx.get(parent_id).await?.is_none() {
                return Err(MenuServiceError::parent_not_found(parent_id));
            }
        }

        let now = Utc::now();
        let count = tx.count_children(parent_id).await?;
        let order = match input.order {
            Some(requested) => {
                let order = requested.min(count);
                let shifted = tx
                    .bulk_shift(parent_id, OrderRange::From(order), 1, now)
                    .await?;
                tracing::debug!("Opened slot {} by shifting {} siblings", order, shifted);
                order
            }
            None => count,
        };

        let mut node = MenuNode::new(input.title, input.description, input.parent_id, order);
        node.created_at = now;
        node.updated_at = now;

        Ok(tx.insert(&node).await?)
    }

    /// Apply a partial update to a node's own fields
    ///
    /// Changing `parent_id` here does not shift any siblings: the node keeps
    /// its order value in the new group. Use [`MenuService::move_node`] for
    /// order-preserving re-parenting. An empty update returns the node as is.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the node does not exist
    /// - `ValidationFailed` for a blank title or a malformed parent id
    /// - `SelfParent`, `ParentNotFound`, `CycleDetected` for a bad new parent
    pub async fn update(
        &self,
        id: &str,
        update: MenuNodeUpdate,
    ) -> Result<MenuNode, MenuServiceError> {
        update.validate()?;

        let tx = self.store.begin().await?;
        let result = Self::update_in(tx.as_ref(), id, update).await;
        let node = Self::finish(tx, "update", result).await?;

        tracing::debug!("Updated menu node {}", node.id);
        Ok(node)
    }

    async fn update_in(
        tx: &dyn MenuTransaction,
        id: &str,
        update: MenuNodeUpdate,
    ) -> Result<MenuNode, MenuServiceError> {
        let current = tx
            .get(id)
            .await?
            .ok_or_else(|| MenuServiceError::not_found(id))?;

        if update.is_empty() {
            return Ok(current);
        }

        if let Some(Some(parent_id)) = &update.parent_id {
            Self::check_parent(tx, id, parent_id).await?;
        }

        let changes = MenuNodeChanges {
            title: update.title,
            description: update.description,
            parent_id: update.parent_id,
            order: None,
        };

        Ok(tx.update(id, changes, Utc::now()).await?)
    }

    /// Move a node (with its subtree) to a new parent and position
    ///
    /// `new_parent_id: None` makes the node a root entry; `new_order: None`
    /// appends it to the target group. Moving inside the current group is a
    /// reorder. Across groups, the source group closes its gap and the target
    /// group opens a slot, all in one transaction.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the node does not exist
    /// - `SelfParent`, `ParentNotFound`, `CycleDetected` for a bad new parent
    pub async fn move_node(
        &self,
        id: &str,
        new_parent_id: Option<&str>,
        new_order: Option<u32>,
    ) -> Result<MenuNode, MenuServiceError> {
        let tx = self.store.begin().await?;
        let result = Self::move_in(tx.as_ref(), id, new_parent_id, new_order).await;
        let node = Self::finish(tx, "move", result).await?;

        tracing::info!(
            "Moved menu node {} to parent {:?} at order {}",
            node.id,
            node.parent_id,
            node.order
        );
        Ok(node)
    }

    async fn move_in(
        tx: &dyn MenuTransaction,
        id: &str,
        new_parent_id: Option<&str>,
        new_order: Option<u32>,
    ) -> Result<MenuNode, MenuServiceError> {
        let node = tx
            .get(id)
            .await?
            .ok_or_else(|| MenuServiceError::not_found(id))?;

        if let Some(parent_id) = new_parent_id {
            Self::check_parent(tx, id, parent_id).await?;
        }

        if node.parent_id.as_deref() == new_parent_id {
            return Self::reorder_in(tx, node, new_order.unwrap_or(u32::MAX)).await;
        }

        let now = Utc::now();

        let closed = tx
            .bulk_shift(
                node.parent_id.as_deref(),
                OrderRange::From(node.order.saturating_add(1)),
                -1,
                now,
            )
            .await?;

        let count = tx.count_children(new_parent_id).await?;
        let order = new_order.map_or(count, |requested| requested.min(count));
        let opened = tx
            .bulk_shift(new_parent_id, OrderRange::From(order), 1, now)
            .await?;

        tracing::debug!(
            "Moving {}: closed gap over {} siblings, opened slot {} over {} siblings",
            id,
            closed,
            order,
            opened
        );

        let changes = MenuNodeChanges {
            parent_id: Some(new_parent_id.map(str::to_string)),
            order: Some(order),
            ..Default::default()
        };
        Ok(tx.update(id, changes, now).await?)
    }

    /// Move a node to `new_order` within its sibling group
    ///
    /// Orders past the last position are clamped to it. Reordering a node to
    /// its current position changes nothing, not even `updated_at`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the node does not exist
    pub async fn reorder(&self, id: &str, new_order: u32) -> Result<MenuNode, MenuServiceError> {
        let tx = self.store.begin().await?;
        let result = match tx.get(id).await {
            Ok(Some(node)) => Self::reorder_in(tx.as_ref(), node, new_order).await,
            Ok(None) => Err(MenuServiceError::not_found(id)),
            Err(e) => Err(e.into()),
        };
        let node = Self::finish(tx, "reorder", result).await?;

        tracing::debug!("Menu node {} now at order {}", node.id, node.order);
        Ok(node)
    }

    async fn reorder_in(
        tx: &dyn MenuTransaction,
        node: MenuNode,
        requested: u32,
    ) -> Result<MenuNode, MenuServiceError> {
        let parent_id = node.parent_id.as_deref();
        let count = tx.count_children(parent_id).await?;
        let target = requested.min(count.saturating_sub(1));
        let current = node.order;

        if target == current {
            return Ok(node);
        }

        let now = Utc::now();
        if target < current {
            // [target, current) moves down one slot
            tx.bulk_shift(
                parent_id,
                OrderRange::Between {
                    start: target,
                    end: current,
                },
                1,
                now,
            )
            .await?;
        } else {
            // (current, target] moves up one slot
            tx.bulk_shift(
                parent_id,
                OrderRange::Between {
                    start: current + 1,
                    end: target + 1,
                },
                -1,
                now,
            )
            .await?;
        }

        let changes = MenuNodeChanges {
            order: Some(target),
            ..Default::default()
        };
        Ok(tx.update(&node.id, changes, now).await?)
    }

    /// Delete a node and its whole subtree
    ///
    /// Siblings after the removed node move up one slot, so the group stays
    /// dense.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the node does not exist
    /// - `DeleteFailed` if storage rejects the delete
    pub async fn remove(&self, id: &str) -> Result<DeleteResult, MenuServiceError> {
        let tx = self.store.begin().await?;
        let result = Self::remove_in(tx.as_ref(), id).await;
        let deleted = Self::finish(tx, "remove", result).await?;

        tracing::info!(
            "Removed menu node {} ({} nodes in subtree)",
            deleted.id,
            deleted.removed_count()
        );
        Ok(deleted)
    }

    async fn remove_in(
        tx: &dyn MenuTransaction,
        id: &str,
    ) -> Result<DeleteResult, MenuServiceError> {
        let node = tx
            .get(id)
            .await?
            .ok_or_else(|| MenuServiceError::not_found(id))?;

        let index = TreeIndex::from_nodes(&tx.list_all().await?);
        let removed_ids = index.subtree_ids(id);

        let deleted = tx
            .delete(id)
            .await
            .map_err(|e| MenuServiceError::delete_failed(id, e))?;
        if deleted == 0 {
            return Err(MenuServiceError::not_found(id));
        }

        tx.bulk_shift(
            node.parent_id.as_deref(),
            OrderRange::From(node.order.saturating_add(1)),
            -1,
            Utc::now(),
        )
        .await
        .map_err(|e| MenuServiceError::delete_failed(id, e))?;

        Ok(DeleteResult {
            id: id.to_string(),
            removed_ids,
        })
    }

    /// Checks shared by `update` and `move_node` for a new parent
    async fn check_parent(
        tx: &dyn MenuTransaction,
        id: &str,
        parent_id: &str,
    ) -> Result<(), MenuServiceError> {
        if parent_id == id {
            return Err(MenuServiceError::self_parent(id));
        }
        if tx.get(parent_id).await?.is_none() {
            return Err(MenuServiceError::parent_not_found(parent_id));
        }

        let index = TreeIndex::from_nodes(&tx.list_all().await?);
        index.check_new_parent(id, parent_id)
    }

    /// Commit on success, roll back on failure
    async fn finish<T>(
        tx: Box<dyn MenuTransaction>,
        operation: &str,
        result: Result<T, MenuServiceError>,
    ) -> Result<T, MenuServiceError> {
        match result {
            Ok(value) => {
                tx.commit().await?;
                tracing::debug!("Committed {} transaction", operation);
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(
                        "Failed to roll back {} transaction: {}",
                        operation,
                        rollback_err
                    );
                }
                tracing::debug!("Rolled back {} transaction: {}", operation, err);
                Err(err)
            }
        }
    }
}
