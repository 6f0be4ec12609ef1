//! MenuTree Core - Ordered Menu Tree Engine
//!
//! This crate stores a navigation menu as a tree of titled nodes and keeps it
//! consistent under concurrent edits: every node has at most one parent, the
//! parent links never form a cycle, and each sibling group is numbered densely
//! from zero.
//!
//! # Architecture
//!
//! - **Adjacency list**: Each node row stores its `parent_id` and `sort_order`
//! - **One transaction per mutation**: Create, move, reorder and remove run
//!   inside a single `BEGIN IMMEDIATE` transaction, so readers only ever see
//!   committed, consistent trees
//! - **libsql/Turso**: Embedded SQLite-compatible database with WAL mode
//!
//! # Modules
//!
//! - [`models`] - Data structures (MenuNode, MenuTreeNode, mutation inputs)
//! - [`db`] - Database layer with libsql integration and the `MenuStore` seam
//! - [`services`] - MenuService (writes), QueryService (reads), TreeIndex
//! - [`operations`] - Retry wrapper for contended writers
//! - [`config`] - Database location and busy timeout

pub mod config;
pub mod db;
pub mod models;
pub mod operations;
pub mod services;

// Re-export commonly used types
pub use config::MenuTreeConfig;
pub use models::*;
pub use services::*;

use db::{DatabaseError, DatabaseService, MenuStore, TursoStore};
use std::sync::Arc;

/// Open the database described by `config` and wrap it in a store
pub async fn open_store(config: &MenuTreeConfig) -> Result<Arc<dyn MenuStore>, DatabaseError> {
    let db = Arc::new(DatabaseService::from_config(config).await?);
    Ok(Arc::new(TursoStore::new(db)))
}
