//! Business Services
//!
//! This module contains the menu tree services:
//!
//! - `MenuService` - create, update, move, reorder and remove, each as one
//!   store transaction
//! - `QueryService` - flat and nested reads, subtree lookup and audits
//! - `TreeIndex` - adjacency view used for cycle checks and subtree walks
//!
//! Services coordinate between the database layer and callers, enforcing the
//! tree invariants (acyclic parents, dense sibling order) on every write.

pub mod error;
pub mod menu_service;
pub mod query_service;
pub mod tree_index;

pub use error::MenuServiceError;
pub use menu_service::MenuService;
pub use query_service::{build_tree, QueryService};
pub use tree_index::{TreeIndex, TreeViolation};
