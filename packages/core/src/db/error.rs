//! Database Error Types
//!
//! This module defines error types for store operations. libsql failures are
//! classified by SQLite result code so that callers can tell integrity
//! failures (constraint violations) apart from transient faults (lock
//! contention, lost connections) that are worth retrying.

use std::path::PathBuf;
use thiserror::Error;

// SQLite primary result codes (extended codes carry these in the low byte)
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;
const SQLITE_CONSTRAINT: i32 = 19;

/// Database operation errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish database connection
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Failed to initialize database schema
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// Permission denied when accessing database
    #[error("Permission denied for database path: {path}")]
    PermissionDenied { path: PathBuf },

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// Integrity constraint rejected the statement (foreign key, check, ...)
    #[error("Constraint violation: {context}")]
    ConstraintViolation { context: String },

    /// Database locked by another writer for longer than the busy timeout
    #[error("Database busy: {context}")]
    Busy { context: String },

    /// Row addressed by id does not exist
    #[error("Row not found: {id}")]
    NotFound { id: String },

    /// Stored row could not be converted into a model
    #[error("Failed to decode row: {0}")]
    RowDecode(String),

    /// libsql operation error
    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },
}

impl DatabaseError {
    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create an initialization failed error
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a permission denied error
    pub fn permission_denied(path: PathBuf) -> Self {
        Self::PermissionDenied { path }
    }

    /// Create a constraint violation error
    pub fn constraint_violation(context: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            context: context.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a row decode error
    pub fn row_decode(msg: impl Into<String>) -> Self {
        Self::RowDecode(msg.into())
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    /// Classify a libsql failure, keeping `context` in the message
    pub fn from_libsql(context: &str, err: libsql::Error) -> Self {
        let message = format!("{}: {}", context, err);

        let code = match &err {
            libsql::Error::SqliteFailure(code, _) => Some(*code & 0xff),
            _ => None,
        };

        match code {
            Some(SQLITE_CONSTRAINT) => Self::ConstraintViolation { context: message },
            Some(SQLITE_BUSY) | Some(SQLITE_LOCKED) => Self::Busy { context: message },
            _ => {
                // Some code paths only surface the message text
                let lowered = message.to_lowercase();
                if lowered.contains("constraint failed") {
                    Self::ConstraintViolation { context: message }
                } else if lowered.contains("database is locked") || lowered.contains("busy") {
                    Self::Busy { context: message }
                } else {
                    Self::SqlExecutionError { context: message }
                }
            }
        }
    }

    /// Transient faults may succeed when the operation is retried
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy { .. } | Self::ConnectionFailed { .. })
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }
}
