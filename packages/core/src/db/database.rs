//! Database Connection Management
//!
//! This module provides the database connection and schema initialization for
//! the menu tree using libsql.
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf
//! - **WAL mode**: Readers never block the single writer
//! - **Foreign keys**: `parent_id` cascades deletes to whole subtrees
//! - **Per-connection pragmas**: `busy_timeout` and `foreign_keys` are set on
//!   every connection handed out by [`DatabaseService::connect_with_timeout`]
//!
//! # Database Connection Patterns
//!
//! **ALWAYS use `connect_with_timeout()` in async functions.** The busy timeout
//! lets concurrent writers wait for the lock instead of failing immediately
//! with `SQLITE_BUSY`, and SQLite only enforces foreign keys on connections
//! that enabled them.
//!
//! ```no_run
//! # use menutree_core::db::DatabaseService;
//! # use std::path::PathBuf;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db_service = DatabaseService::new(PathBuf::from("./data/menutree.db")).await?;
//! let conn = db_service.connect_with_timeout().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{MenuTreeConfig, DEFAULT_BUSY_TIMEOUT_MS};
use crate::db::error::DatabaseError;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Database service for managing the libsql connection and schema
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,

    busy_timeout_ms: u64,
}

impl DatabaseService {
    /// Create a new DatabaseService with the default busy timeout
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    /// 4. Enable WAL mode
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        Self::open(db_path, DEFAULT_BUSY_TIMEOUT_MS).await
    }

    /// Create a DatabaseService from runtime configuration
    pub async fn from_config(config: &MenuTreeConfig) -> Result<Self, DatabaseError> {
        Self::open(config.database_path.clone(), config.busy_timeout_ms).await
    }

    async fn open(db_path: PathBuf, busy_timeout_ms: u64) -> Result<Self, DatabaseError> {
        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            busy_timeout_ms,
        };

        service.initialize_schema(is_new_database).await?;

        tracing::debug!(
            "Opened menu tree database at {} (new: {})",
            service.db_path.display(),
            is_new_database
        );

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of execute().
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn
            .prepare(pragma)
            .await
            .map_err(|e| DatabaseError::from_libsql(&format!("Failed to execute '{}'", pragma), e))?;
        let _ = stmt
            .query(())
            .await
            .map_err(|e| DatabaseError::from_libsql(&format!("Failed to execute '{}'", pragma), e))?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Creates tables and indexes using CREATE ... IF NOT EXISTS, so it is safe
    /// to run on every start.
    ///
    /// # Schema
    ///
    /// - `menu_nodes`: one row per node; `parent_id` references `menu_nodes(id)`
    ///   with `ON DELETE CASCADE` so deleting a node removes its subtree
    /// - `idx_menu_nodes_parent_order`: sibling group lookups and range shifts
    /// - `idx_menu_nodes_title`: flat listing order
    ///
    /// There is deliberately no UNIQUE index on `(parent_id, sort_order)`:
    /// SQLite checks uniqueness per row during `sort_order = sort_order + 1`,
    /// so range shifts would fail halfway through.
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS menu_nodes (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                parent_id TEXT,
                sort_order INTEGER NOT NULL CHECK (sort_order >= 0),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                -- Parent deletion cascades to children (tree structure)
                FOREIGN KEY (parent_id) REFERENCES menu_nodes(id) ON DELETE CASCADE,
                CHECK (parent_id IS NULL OR parent_id <> id)
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create menu_nodes table: {}", e))
        })?;

        self.create_indexes(&conn).await?;

        // Flush the freshly created schema so other connections see it at once
        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    async fn create_indexes(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        let indexes = [
            (
                "idx_menu_nodes_parent_order",
                "CREATE INDEX IF NOT EXISTS idx_menu_nodes_parent_order ON menu_nodes(parent_id, sort_order)",
            ),
            (
                "idx_menu_nodes_title",
                "CREATE INDEX IF NOT EXISTS idx_menu_nodes_title ON menu_nodes(title, created_at)",
            ),
        ];

        for (name, sql) in indexes {
            conn.execute(sql, ()).await.map_err(|e| {
                DatabaseError::initialization_failed(format!(
                    "Failed to create index '{}': {}",
                    name, e
                ))
            })?;
        }

        Ok(())
    }

    /// Get a raw connection without per-connection pragmas
    ///
    /// Only for synchronous, single-threaded contexts (and tests inspecting
    /// pragma defaults). Foreign keys are NOT enforced on this connection.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get a connection with busy timeout and foreign keys configured
    ///
    /// **✅ RECOMMENDED** for all store operations.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| DatabaseError::connection_failed(self.db_path.clone(), e))?;

        self.execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms))
            .await?;

        // Must be set outside of any transaction; it is a no-op inside one
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        Ok(conn)
    }

    /// Configured busy timeout in milliseconds
    pub fn busy_timeout_ms(&self) -> u64 {
        self.busy_timeout_ms
    }

    /// Flush the WAL before shutdown or file copy
    pub async fn close(&self) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn query_single_i64(conn: &libsql::Connection, sql: &str) -> i64 {
        let mut stmt = conn.prepare(sql).await.unwrap();
        let mut rows = stmt.query(()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        row.get(0).unwrap()
    }

    #[tokio::test]
    async fn test_database_creation() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db_service = DatabaseService::new(db_path.clone()).await.unwrap();

        assert_eq!(db_service.db_path, db_path);
        assert_eq!(db_service.busy_timeout_ms(), DEFAULT_BUSY_TIMEOUT_MS);
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_schema_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let db_service = DatabaseService::new(temp_dir.path().join("test.db"))
            .await
            .unwrap();
        let conn = db_service.connect().unwrap();

        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name='menu_nodes'")
            .await
            .unwrap();
        let mut rows = stmt.query(()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let table_name: String = row.get(0).unwrap();
        assert_eq!(table_name, "menu_nodes");
    }

    #[tokio::test]
    async fn test_indexes_created() {
        let temp_dir = TempDir::new().unwrap();
        let db_service = DatabaseService::new(temp_dir.path().join("test.db"))
            .await
            .unwrap();
        let conn = db_service.connect().unwrap();

        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'")
            .await
            .unwrap();
        let mut rows = stmt.query(()).await.unwrap();

        let mut index_names = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            let name: String = row.get(0).unwrap();
            index_names.push(name);
        }

        assert!(index_names.contains(&"idx_menu_nodes_parent_order".to_string()));
        assert!(index_names.contains(&"idx_menu_nodes_title".to_string()));
    }

    #[tokio::test]
    async fn test_wal_mode_enabled() {
        let temp_dir = TempDir::new().unwrap();
        let db_service = DatabaseService::new(temp_dir.path().join("test.db"))
            .await
            .unwrap();
        let conn = db_service.connect().unwrap();

        let mut stmt = conn.prepare("PRAGMA journal_mode").await.unwrap();
        let mut rows = stmt.query(()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let mode: String = row.get(0).unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled_per_connection() {
        let temp_dir = TempDir::new().unwrap();
        let db_service = DatabaseService::new(temp_dir.path().join("test.db"))
            .await
            .unwrap();

        let conn = db_service.connect_with_timeout().await.unwrap();
        assert_eq!(query_single_i64(&conn, "PRAGMA foreign_keys").await, 1);

        let conn = db_service.connect_with_timeout().await.unwrap();
        assert_eq!(query_single_i64(&conn, "PRAGMA foreign_keys").await, 1);
    }

    #[tokio::test]
    async fn test_busy_timeout_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let config =
            MenuTreeConfig::new(temp_dir.path().join("test.db")).with_busy_timeout_ms(1234);
        let db_service = DatabaseService::from_config(&config).await.unwrap();

        let conn = db_service.connect_with_timeout().await.unwrap();
        assert_eq!(query_single_i64(&conn, "PRAGMA busy_timeout").await, 1234);
    }

    #[tokio::test]
    async fn test_parent_directory_creation() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir.path().join("nested").join("dirs").join("test.db");

        let _db_service = DatabaseService::new(nested_path.clone()).await.unwrap();

        assert!(nested_path.exists());
    }

    #[tokio::test]
    async fn test_idempotent_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let _db_service1 = DatabaseService::new(db_path.clone()).await.unwrap();
        let db_service2 = DatabaseService::new(db_path).await.unwrap();

        let conn = db_service2.connect().unwrap();
        let count = query_single_i64(
            &conn,
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='menu_nodes'",
        )
        .await;
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_self_parent_rejected_by_check_constraint() {
        let temp_dir = TempDir::new().unwrap();
        let db_service = DatabaseService::new(temp_dir.path().join("test.db"))
            .await
            .unwrap();
        let conn = db_service.connect_with_timeout().await.unwrap();

        conn.execute(
            "INSERT INTO menu_nodes (id, title, description, parent_id, sort_order, created_at, updated_at)
             VALUES ('a', 'A', NULL, NULL, 0, 'now', 'now')",
            (),
        )
        .await
        .unwrap();

        let result = conn
            .execute("UPDATE menu_nodes SET parent_id = 'a' WHERE id = 'a'", ())
            .await;
        assert!(result.is_err());
    }
}
