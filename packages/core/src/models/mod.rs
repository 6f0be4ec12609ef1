//! Data Models
//!
//! - `MenuNode` - A single menu entry as stored in the `menu_nodes` table
//! - `NewMenuNode` / `MenuNodeUpdate` - Mutation inputs
//! - `MenuTreeNode` - Nested read model with ordered children
//! - `DeleteResult` - Outcome of removing a subtree

mod menu_node;

pub use menu_node::{
    is_valid_node_id, validate_title, DeleteResult, MenuNode, MenuNodeUpdate, MenuTreeNode,
    NewMenuNode, ValidationError,
};
