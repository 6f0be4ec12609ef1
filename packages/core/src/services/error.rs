//! Service Layer Error Types
//!
//! This module defines error types for menu tree operations. Logical failures
//! (missing nodes, cycles, invalid input) are distinct variants; anything the
//! store reports is carried in `Storage` so callers can still ask whether the
//! failure was transient.

use crate::db::DatabaseError;
use crate::models::ValidationError;
use thiserror::Error;

/// Service operation errors
#[derive(Error, Debug)]
pub enum MenuServiceError {
    /// Node not found by ID
    #[error("Menu node not found: {id}")]
    NotFound { id: String },

    /// Referenced parent does not exist
    #[error("Parent menu node not found: {parent_id}")]
    ParentNotFound { parent_id: String },

    /// Node named as its own parent
    #[error("Menu node {id} cannot be its own parent")]
    SelfParent { id: String },

    /// New parent lies inside the node's own subtree
    #[error("Cycle detected: {parent_id} is a descendant of {id}")]
    CycleDetected { id: String, parent_id: String },

    /// Store rejected a write that broke an integrity rule
    #[error("Constraint violation: {context}")]
    ConstraintViolation { context: String },

    /// Removing a node failed in storage
    #[error("Failed to delete menu node {id}: {context}")]
    DeleteFailed {
        id: String,
        context: String,
        #[source]
        source: Option<DatabaseError>,
    },

    /// Validation failed for input
    #[error("Menu node validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    Storage(#[source] DatabaseError),
}

impl MenuServiceError {
    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a parent not found error
    pub fn parent_not_found(parent_id: impl Into<String>) -> Self {
        Self::ParentNotFound {
            parent_id: parent_id.into(),
        }
    }

    /// Create a self-parent error
    pub fn self_parent(id: impl Into<String>) -> Self {
        Self::SelfParent { id: id.into() }
    }

    /// Create a cycle detected error
    pub fn cycle_detected(id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self::CycleDetected {
            id: id.into(),
            parent_id: parent_id.into(),
        }
    }

    /// Create a constraint violation error
    pub fn constraint_violation(context: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            context: context.into(),
        }
    }

    /// Wrap a storage failure that happened while removing `id`
    pub fn delete_failed(id: impl Into<String>, source: DatabaseError) -> Self {
        Self::DeleteFailed {
            id: id.into(),
            context: source.to_string(),
            source: Some(source),
        }
    }

    /// Whether retrying the same operation may succeed
    ///
    /// Only lock contention and lost connections qualify; logical failures
    /// fail the same way every time.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(err) => err.is_transient(),
            Self::DeleteFailed {
                source: Some(err), ..
            } => err.is_transient(),
            _ => false,
        }
    }
}

/// Store errors map integrity failures onto the logical variants
impl From<DatabaseError> for MenuServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConstraintViolation { context } => Self::constraint_violation(context),
            DatabaseError::NotFound { id } => Self::NotFound { id },
            other => Self::Storage(other),
        }
    }
}
