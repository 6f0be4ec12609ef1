//! MenuStore Trait - Storage Abstraction Layer
//!
//! This module defines the storage contract the mutation engine is written
//! against. It is split in two traits:
//!
//! - [`MenuStore`]: the shared handle. Hands out transactions and serves the
//!   non-transactional reads used by the query service.
//! - [`MenuTransaction`]: a scoped, exclusive write transaction. Every
//!   multi-step mutation (insert + shift, move, reorder, cascading delete) runs
//!   inside exactly one of these, so either all writes apply or none do.
//!
//! # Transaction lifetime
//!
//! `MenuStore::begin` acquires the write lock before returning, so every read
//! made through the transaction already reflects the state the writes will be
//! applied to. A transaction that is neither committed nor rolled back is
//! rolled back when it is dropped.
//!
//! The libsql store locks the whole database per transaction, so writers are
//! serialized globally rather than per sibling group. Readers are unaffected.
//!
//! # Examples
//!
//! ```rust,no_run
//! use menutree_core::db::{DatabaseService, MenuStore, MenuTransaction, OrderRange, TursoStore};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/menus.db")).await?);
//!     let store: Arc<dyn MenuStore> = Arc::new(TursoStore::new(db));
//!
//!     let tx = store.begin().await?;
//!     tx.bulk_shift(None, OrderRange::From(0), 1, chrono::Utc::now()).await?;
//!     tx.rollback().await?;
//!     Ok(())
//! }
//! ```

use crate::db::DatabaseError;
use crate::models::MenuNode;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Order predicate selecting part of a sibling group for a bulk shift
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderRange {
    /// `order >= start`
    From(u32),
    /// `start <= order < end`
    Between { start: u32, end: u32 },
}

impl OrderRange {
    /// Lower and (exclusive) upper bound; `None` means unbounded
    pub fn bounds(&self) -> (u32, Option<u32>) {
        match *self {
            OrderRange::From(start) => (start, None),
            OrderRange::Between { start, end } => (start, Some(end)),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(*self, OrderRange::Between { start, end } if start >= end)
    }
}

/// Field-level changes applied by [`MenuTransaction::update`]
///
/// Uses the same double-Option convention as `MenuNodeUpdate` for nullable
/// columns. `updated_at` is always written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MenuNodeChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub parent_id: Option<Option<String>>,
    pub order: Option<u32>,
}

impl MenuNodeChanges {
    /// Merge these changes into `current`, stamping `updated_at`
    pub fn apply_to(self, current: MenuNode, updated_at: DateTime<Utc>) -> MenuNode {
        MenuNode {
            id: current.id,
            title: self.title.unwrap_or(current.title),
            description: match self.description {
                None => current.description,
                Some(description) => description,
            },
            parent_id: match self.parent_id {
                None => current.parent_id,
                Some(parent_id) => parent_id,
            },
            order: self.order.unwrap_or(current.order),
            created_at: current.created_at,
            updated_at,
        }
    }
}

/// Shared store handle
///
/// Implementations must be `Send + Sync`; the services hold it as
/// `Arc<dyn MenuStore>` and are cloned across concurrent tasks.
#[async_trait]
pub trait MenuStore: Send + Sync {
    /// Open an exclusive write transaction
    ///
    /// Waits for other writers up to the configured busy timeout; fails with
    /// `DatabaseError::Busy` after that.
    ///
    /// The lock scope is up to the implementation. [`TursoStore`] takes the
    /// database-wide SQLite write lock, so it serializes ALL writers: two
    /// mutations on disjoint sibling groups still wait for each other.
    ///
    /// [`TursoStore`]: crate::db::TursoStore
    async fn begin(&self) -> Result<Box<dyn MenuTransaction>, DatabaseError>;

    /// Get node by ID (`Ok(None)` if absent)
    async fn get(&self, id: &str) -> Result<Option<MenuNode>, DatabaseError>;

    /// Sibling group sorted by order (`None` = root group)
    async fn list_by_parent(&self, parent_id: Option<&str>)
        -> Result<Vec<MenuNode>, DatabaseError>;

    /// Every node, sorted by title, then creation time, then id
    async fn list_all(&self) -> Result<Vec<MenuNode>, DatabaseError>;

    /// Flush pending writes before shutdown
    async fn close(&self) -> Result<(), DatabaseError>;
}

/// Scoped write transaction
#[async_trait]
pub trait MenuTransaction: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<MenuNode>, DatabaseError>;

    /// Size of a sibling group
    async fn count_children(&self, parent_id: Option<&str>) -> Result<u32, DatabaseError>;

    /// Every node (unordered)
    async fn list_all(&self) -> Result<Vec<MenuNode>, DatabaseError>;

    /// Insert a fully-formed node
    ///
    /// A dangling `parent_id` is rejected by the foreign key and surfaces as
    /// `DatabaseError::ConstraintViolation`.
    async fn insert(&self, node: &MenuNode) -> Result<MenuNode, DatabaseError>;

    /// Apply field changes; `DatabaseError::NotFound` if the id is absent
    async fn update(
        &self,
        id: &str,
        changes: MenuNodeChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<MenuNode, DatabaseError>;

    /// Add `delta` to the order of every sibling in `range`
    ///
    /// Returns the number of shifted rows.
    async fn bulk_shift(
        &self,
        parent_id: Option<&str>,
        range: OrderRange,
        delta: i32,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, DatabaseError>;

    /// Delete a node; descendants are removed by cascade in the same transaction
    ///
    /// Returns the number of directly deleted rows (0 if the id was absent).
    async fn delete(&self, id: &str) -> Result<u64, DatabaseError>;

    async fn commit(&self) -> Result<(), DatabaseError>;

    async fn rollback(&self) -> Result<(), DatabaseError>;
}
