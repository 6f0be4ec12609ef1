//! Menu Node Data Structures
//!
//! This module defines the `MenuNode` record stored in the `menu_nodes` table
//! together with the input and output shapes used by the services.
//!
//! # Ordering
//!
//! Every node carries an `order` that is unique and dense (`0..n-1`) within its
//! sibling group, i.e. among all nodes sharing the same `parent_id` (the root
//! group is the set of nodes whose `parent_id` is `None`).
//!
//! # Examples
//!
//! ```rust
//! use menutree_core::models::{MenuNodeUpdate, NewMenuNode};
//!
//! // Append a root entry
//! let home = NewMenuNode::new("Home");
//! assert!(home.validate().is_ok());
//!
//! // Rename and detach from the parent in a single partial update
//! let update = MenuNodeUpdate::new().with_title("Start").detach();
//! assert!(!update.is_empty());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for menu node input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Title must not be empty")]
    EmptyTitle,

    #[error("Invalid node ID format: {0}")]
    InvalidId(String),

    #[error("Invalid parent reference: {0}")]
    InvalidParent(String),
}

/// Check whether a string is a well-formed node id (UUID)
pub fn is_valid_node_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// Titles are required and must contain something other than whitespace
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(())
}

fn validate_parent_reference(parent_id: &str) -> Result<(), ValidationError> {
    if !is_valid_node_id(parent_id) {
        return Err(ValidationError::InvalidParent(parent_id.to_string()));
    }
    Ok(())
}

/// A single menu entry.
///
/// # Fields
///
/// - `id`: UUID assigned at creation, never changes
/// - `title`: Non-empty display text
/// - `description`: Optional free text
/// - `parent_id`: Parent entry (`None` for root entries)
/// - `order`: Position within the sibling group (dense, 0-based)
/// - `created_at` / `updated_at`: Creation and last-mutation timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuNode {
    pub id: String,

    pub title: String,

    pub description: Option<String>,

    pub parent_id: Option<String>,

    pub order: u32,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl MenuNode {
    /// Create a new node with a generated UUID and current timestamps
    pub fn new(
        title: impl Into<String>,
        description: Option<String>,
        parent_id: Option<String>,
        order: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description,
            parent_id,
            order,
            created_at: now,
            updated_at: now,
        }
    }

    /// Root entries have no parent
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Input for creating a node.
///
/// `order: None` appends the node at the end of its sibling group; an explicit
/// order inserts it there and shifts the following siblings down by one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMenuNode {
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub order: Option<u32>,
}

impl NewMenuNode {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn at_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    /// Validate the input before any storage access
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        if let Some(parent_id) = &self.parent_id {
            validate_parent_reference(parent_id)?;
        }
        Ok(())
    }
}

/// Custom deserializer for double-Option fields.
///
/// Maps the three JSON shapes onto the double-Option pattern:
/// - Missing field → None (don't update)
/// - null → Some(None) (clear the value)
/// - "value" → Some(Some("value")) (set the value)
fn deserialize_optional_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    // Missing field is handled by #[serde(default)] on the struct field
    Ok(Some(Option::<T>::deserialize(deserializer)?))
}

/// Partial update of a node's own fields.
///
/// Ordering is not part of a plain update: use `MenuService::reorder` or
/// `MenuService::move_node` to change positions.
///
/// # Double-Option Pattern for Nullable Fields
///
/// - `None`: Don't change this field
/// - `Some(None)`: Set the field to NULL
/// - `Some(Some(value))`: Set the field to the value
///
/// # Examples
///
/// ```rust
/// # use menutree_core::models::MenuNodeUpdate;
/// let update: MenuNodeUpdate =
///     serde_json::from_str(r#"{"title": "Docs", "description": null}"#).unwrap();
/// assert_eq!(update.title.as_deref(), Some("Docs"));
/// assert_eq!(update.description, Some(None));
/// assert_eq!(update.parent_id, None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuNodeUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub description: Option<Option<String>>,

    /// `Some(None)` turns the node into a root entry
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub parent_id: Option<Option<String>>,
}

impl MenuNodeUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(Some(description.into()));
        self
    }

    pub fn clear_description(mut self) -> Self {
        self.description = Some(None);
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(Some(parent_id.into()));
        self
    }

    /// Make the node a root entry
    pub fn detach(mut self) -> Self {
        self.parent_id = Some(None);
        self
    }

    /// Check if the update contains any changes
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.parent_id.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(Some(parent_id)) = &self.parent_id {
            validate_parent_reference(parent_id)?;
        }
        Ok(())
    }
}

/// A node with its ordered children, as returned by tree reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuTreeNode {
    #[serde(flatten)]
    pub node: MenuNode,

    #[serde(default)]
    pub children: Vec<MenuTreeNode>,
}

impl MenuTreeNode {
    pub fn leaf(node: MenuNode) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    /// Ids of this node and all nested children in pre-order
    pub fn ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        let mut stack = vec![self];
        while let Some(current) = stack.pop() {
            ids.push(current.node.id.clone());
            stack.extend(current.children.iter().rev());
        }
        ids
    }
}

/// Result of removing a node
///
/// `removed_ids` always starts with `id` and lists every descendant that was
/// removed with it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub id: String,

    pub removed_ids: Vec<String>,
}

impl DeleteResult {
    pub fn removed_count(&self) -> usize {
        self.removed_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_has_uuid_and_equal_timestamps() {
        let node = MenuNode::new("Home", None, None, 0);

        assert!(is_valid_node_id(&node.id));
        assert_eq!(node.created_at, node.updated_at);
        assert!(node.is_root());
    }

    #[test]
    fn test_new_menu_node_validation() {
        assert!(NewMenuNode::new("Home").validate().is_ok());
        assert_eq!(
            NewMenuNode::new("   ").validate(),
            Err(ValidationError::EmptyTitle)
        );
        assert!(matches!(
            NewMenuNode::new("Child").with_parent("not-a-uuid").validate(),
            Err(ValidationError::InvalidParent(_))
        ));

        let parent_id = Uuid::new_v4().to_string();
        assert!(NewMenuNode::new("Child")
            .with_parent(parent_id)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_update_validation() {
        assert!(MenuNodeUpdate::new().validate().is_ok());
        assert_eq!(
            MenuNodeUpdate::new().with_title("").validate(),
            Err(ValidationError::EmptyTitle)
        );
        assert!(MenuNodeUpdate::new().detach().validate().is_ok());
        assert!(matches!(
            MenuNodeUpdate::new().with_parent("x").validate(),
            Err(ValidationError::InvalidParent(_))
        ));
    }

    #[test]
    fn test_update_deserialize_distinguishes_null_and_missing() {
        let update: MenuNodeUpdate = serde_json::from_str(r#"{"parentId": null}"#).unwrap();
        assert_eq!(update.parent_id, Some(None));
        assert_eq!(update.description, None);
        assert_eq!(update.title, None);

        let update: MenuNodeUpdate =
            serde_json::from_str(r#"{"parentId": "abc", "description": "text"}"#).unwrap();
        assert_eq!(update.parent_id, Some(Some("abc".to_string())));
        assert_eq!(update.description, Some(Some("text".to_string())));

        let update: MenuNodeUpdate = serde_json::from_str("{}").unwrap();
        assert!(update.is_empty());
    }

    #[test]
    fn test_update_builder() {
        let update = MenuNodeUpdate::new()
            .with_title("Docs")
            .clear_description()
            .with_parent("p");

        assert_eq!(update.title.as_deref(), Some("Docs"));
        assert_eq!(update.description, Some(None));
        assert_eq!(update.parent_id, Some(Some("p".to_string())));
        assert!(!update.is_empty());
    }

    #[test]
    fn test_node_serializes_camel_case() {
        let node = MenuNode::new("Home", Some("Landing".to_string()), None, 3);
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json["title"], "Home");
        assert_eq!(json["order"], 3);
        assert!(json["parentId"].is_null());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
    }

    #[test]
    fn test_tree_node_flattens_and_lists_ids() {
        let root = MenuNode::new("Root", None, None, 0);
        let child = MenuNode::new("Child", None, Some(root.id.clone()), 0);
        let grandchild = MenuNode::new("Grandchild", None, Some(child.id.clone()), 0);

        let tree = MenuTreeNode {
            node: root.clone(),
            children: vec![MenuTreeNode {
                node: child.clone(),
                children: vec![MenuTreeNode::leaf(grandchild.clone())],
            }],
        };

        assert_eq!(tree.ids(), vec![root.id.clone(), child.id, grandchild.id]);

        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["id"], root.id.as_str());
        assert_eq!(json["children"][0]["title"], "Child");
    }
}
