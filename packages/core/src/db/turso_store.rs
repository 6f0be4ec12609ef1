//! TursoStore - MenuStore Implementation for the libsql Backend
//!
//! `TursoStore` serves reads on short-lived connections and hands out
//! [`TursoTransaction`]s for writes. A transaction owns one connection on
//! which `BEGIN IMMEDIATE` has already succeeded, so it holds the database
//! write lock from the first read to `COMMIT`/`ROLLBACK`.
//! That lock is database-wide: every writer waits for the current one,
//! whichever sibling groups the two touch.
//!
//! # Row Format
//!
//! Every query selects [`NODE_COLUMNS`] in this order:
//! - id (TEXT)
//! - title (TEXT)
//! - description (TEXT, nullable)
//! - parent_id (TEXT, nullable)
//! - sort_order (INTEGER)
//! - created_at (TEXT, RFC3339)
//! - updated_at (TEXT, RFC3339)
//!
//! Sibling groups are matched with `parent_id IS ?`, which treats `NULL` as a
//! regular value, so the root group needs no separate query.
//!
//! # Examples
//!
//! ```rust,no_run
//! use menutree_core::db::{DatabaseService, MenuStore, TursoStore};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/menus.db")).await?);
//!     let store: Arc<dyn MenuStore> = Arc::new(TursoStore::new(db));
//!
//!     let roots = store.list_by_parent(None).await?;
//!     println!("{} root entries", roots.len());
//!     Ok(())
//! }
//! ```

use crate::db::menu_store::{MenuNodeChanges, MenuStore, MenuTransaction, OrderRange};
use crate::db::{DatabaseError, DatabaseService};
use crate::models::MenuNode;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use libsql::{Connection, Row};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Column list shared by every node query (see module docs for the order)
const NODE_COLUMNS: &str = "id, title, description, parent_id, sort_order, created_at, updated_at";

/// TursoStore implements MenuStore for the libsql backend
pub struct TursoStore {
    db: Arc<DatabaseService>,
}

impl TursoStore {
    /// Wrap an initialized `DatabaseService`
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }
}

/// Timestamps are written as fixed-width RFC3339 so that text order matches time order
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse timestamp from database - handles both SQLite and RFC3339 formats
///
/// SQLite CURRENT_TIMESTAMP returns: "YYYY-MM-DD HH:MM:SS"
/// Rows written by this store use RFC3339: "YYYY-MM-DDTHH:MM:SS.fffffffffZ"
fn parse_timestamp(s: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }

    Err(anyhow::anyhow!(
        "Unable to parse timestamp '{}' as RFC3339 or SQLite format",
        s
    ))
}

/// Convert libsql::Row to MenuNode
fn row_to_node(row: &Row) -> Result<MenuNode, DatabaseError> {
    decode_row(row).map_err(|e| DatabaseError::row_decode(format!("{:#}", e)))
}

fn decode_row(row: &Row) -> anyhow::Result<MenuNode> {
    let id: String = row.get(0).context("Failed to get id")?;
    let title: String = row.get(1).context("Failed to get title")?;
    let description: Option<String> = row.get(2).context("Failed to get description")?;
    let parent_id: Option<String> = row.get(3).context("Failed to get parent_id")?;
    let sort_order: i64 = row.get(4).context("Failed to get sort_order")?;
    let created_at_str: String = row.get(5).context("Failed to get created_at")?;
    let updated_at_str: String = row.get(6).context("Failed to get updated_at")?;

    let order = u32::try_from(sort_order)
        .with_context(|| format!("sort_order {} out of range for node {}", sort_order, id))?;
    let created_at = parse_timestamp(&created_at_str).context("Failed to parse created_at")?;
    let updated_at = parse_timestamp(&updated_at_str).context("Failed to parse updated_at")?;

    Ok(MenuNode {
        id,
        title,
        description,
        parent_id,
        order,
        created_at,
        updated_at,
    })
}

async fn query_nodes(
    conn: &Connection,
    sql: &str,
    params: impl libsql::params::IntoParams,
    context: &str,
) -> Result<Vec<MenuNode>, DatabaseError> {
    let mut stmt = conn
        .prepare(sql)
        .await
        .map_err(|e| DatabaseError::from_libsql(context, e))?;
    let mut rows = stmt
        .query(params)
        .await
        .map_err(|e| DatabaseError::from_libsql(context, e))?;

    let mut nodes = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::from_libsql(context, e))?
    {
        nodes.push(row_to_node(&row)?);
    }
    Ok(nodes)
}

async fn fetch_node(conn: &Connection, id: &str) -> Result<Option<MenuNode>, DatabaseError> {
    let sql = format!("SELECT {} FROM menu_nodes WHERE id = ?", NODE_COLUMNS);
    let mut nodes = query_nodes(conn, &sql, [id], "Failed to get node").await?;
    Ok(nodes.pop())
}

async fn fetch_by_parent(
    conn: &Connection,
    parent_id: Option<&str>,
) -> Result<Vec<MenuNode>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM menu_nodes WHERE parent_id IS ? ORDER BY sort_order ASC, id ASC",
        NODE_COLUMNS
    );
    query_nodes(conn, &sql, [parent_id], "Failed to list children").await
}

async fn fetch_all(conn: &Connection, order_by: &str) -> Result<Vec<MenuNode>, DatabaseError> {
    let sql = format!("SELECT {} FROM menu_nodes{}", NODE_COLUMNS, order_by);
    query_nodes(conn, &sql, (), "Failed to list nodes").await
}

#[async_trait]
impl MenuStore for TursoStore {
    async fn begin(&self) -> Result<Box<dyn MenuTransaction>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;

        conn.execute("BEGIN IMMEDIATE", ())
            .await
            .map_err(|e| DatabaseError::from_libsql("Failed to begin transaction", e))?;

        Ok(Box::new(TursoTransaction::new(conn)))
    }

    async fn get(&self, id: &str) -> Result<Option<MenuNode>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        fetch_node(&conn, id).await
    }

    async fn list_by_parent(
        &self,
        parent_id: Option<&str>,
    ) -> Result<Vec<MenuNode>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        fetch_by_parent(&conn, parent_id).await
    }

    async fn list_all(&self) -> Result<Vec<MenuNode>, DatabaseError> {
        let conn = self.db.connect_with_timeout().await?;
        fetch_all(&conn, " ORDER BY title ASC, created_at ASC, id ASC").await
    }

    async fn close(&self) -> Result<(), DatabaseError> {
        self.db.close().await
    }
}

/// Write transaction on a dedicated connection
///
/// Dropping an unfinished transaction closes its connection, which makes
/// SQLite roll the pending writes back.
pub struct TursoTransaction {
    conn: Connection,
    finished: AtomicBool,
}

impl TursoTransaction {
    fn new(conn: Connection) -> Self {
        Self {
            conn,
            finished: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), DatabaseError> {
        if self.finished.load(Ordering::Acquire) {
            return Err(DatabaseError::sql_execution(
                "Transaction already committed or rolled back",
            ));
        }
        Ok(())
    }

    async fn finish(&self, statement: &str) -> Result<(), DatabaseError> {
        if self.finished.swap(true, Ordering::AcqRel) {
            return Err(DatabaseError::sql_execution(
                "Transaction already committed or rolled back",
            ));
        }

        self.conn
            .execute(statement, ())
            .await
            .map_err(|e| DatabaseError::from_libsql(&format!("Failed to {}", statement), e))?;
        Ok(())
    }
}

impl Drop for TursoTransaction {
    fn drop(&mut self) {
        if !self.finished.load(Ordering::Acquire) {
            tracing::warn!("Transaction dropped without commit; pending writes are rolled back");
        }
    }
}

#[async_trait]
impl MenuTransaction for TursoTransaction {
    async fn get(&self, id: &str) -> Result<Option<MenuNode>, DatabaseError> {
        self.ensure_open()?;
        fetch_node(&self.conn, id).await
    }

    async fn count_children(&self, parent_id: Option<&str>) -> Result<u32, DatabaseError> {
        self.ensure_open()?;

        let mut stmt = self
            .conn
            .prepare("SELECT COUNT(*) FROM menu_nodes WHERE parent_id IS ?")
            .await
            .map_err(|e| DatabaseError::from_libsql("Failed to count children", e))?;
        let mut rows = stmt
            .query([parent_id])
            .await
            .map_err(|e| DatabaseError::from_libsql("Failed to count children", e))?;

        let count: i64 = match rows
            .next()
            .await
            .map_err(|e| DatabaseError::from_libsql("Failed to count children", e))?
        {
            Some(row) => row
                .get(0)
                .map_err(|e| DatabaseError::from_libsql("Failed to read child count", e))?,
            None => 0,
        };

        u32::try_from(count)
            .map_err(|_| DatabaseError::row_decode(format!("Child count {} out of range", count)))
    }

    async fn list_all(&self) -> Result<Vec<MenuNode>, DatabaseError> {
        self.ensure_open()?;
        fetch_all(&self.conn, "").await
    }

    async fn insert(&self, node: &MenuNode) -> Result<MenuNode, DatabaseError> {
        self.ensure_open()?;

        self.conn
            .execute(
                "INSERT INTO menu_nodes (id, title, description, parent_id, sort_order, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                (
                    node.id.as_str(),
                    node.title.as_str(),
                    node.description.as_deref(),
                    node.parent_id.as_deref(),
                    i64::from(node.order),
                    format_timestamp(&node.created_at),
                    format_timestamp(&node.updated_at),
                ),
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("Failed to insert node", e))?;

        fetch_node(&self.conn, &node.id)
            .await?
            .ok_or_else(|| DatabaseError::not_found(node.id.clone()))
    }

    async fn update(
        &self,
        id: &str,
        changes: MenuNodeChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<MenuNode, DatabaseError> {
        self.ensure_open()?;

        let current = fetch_node(&self.conn, id)
            .await?
            .ok_or_else(|| DatabaseError::not_found(id))?;
        let merged = changes.apply_to(current, updated_at);

        self.conn
            .execute(
                "UPDATE menu_nodes
                 SET title = ?, description = ?, parent_id = ?, sort_order = ?, updated_at = ?
                 WHERE id = ?",
                (
                    merged.title.as_str(),
                    merged.description.as_deref(),
                    merged.parent_id.as_deref(),
                    i64::from(merged.order),
                    format_timestamp(&merged.updated_at),
                    id,
                ),
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("Failed to update node", e))?;

        fetch_node(&self.conn, id)
            .await?
            .ok_or_else(|| DatabaseError::not_found(id))
    }

    async fn bulk_shift(
        &self,
        parent_id: Option<&str>,
        range: OrderRange,
        delta: i32,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        self.ensure_open()?;

        if delta == 0 || range.is_empty() {
            return Ok(0);
        }

        let timestamp = format_timestamp(&updated_at);
        let shifted = match range.bounds() {
            (start, None) => {
                self.conn
                    .execute(
                        "UPDATE menu_nodes SET sort_order = sort_order + ?, updated_at = ?
                         WHERE parent_id IS ? AND sort_order >= ?",
                        (i64::from(delta), timestamp, parent_id, i64::from(start)),
                    )
                    .await
            }
            (start, Some(end)) => {
                self.conn
                    .execute(
                        "UPDATE menu_nodes SET sort_order = sort_order + ?, updated_at = ?
                         WHERE parent_id IS ? AND sort_order >= ? AND sort_order < ?",
                        (
                            i64::from(delta),
                            timestamp,
                            parent_id,
                            i64::from(start),
                            i64::from(end),
                        ),
                    )
                    .await
            }
        }
        .map_err(|e| DatabaseError::from_libsql("Failed to shift sibling orders", e))?;

        Ok(shifted)
    }

    async fn delete(&self, id: &str) -> Result<u64, DatabaseError> {
        self.ensure_open()?;

        self.conn
            .execute("DELETE FROM menu_nodes WHERE id = ?", [id])
            .await
            .map_err(|e| DatabaseError::from_libsql("Failed to delete node", e))
    }

    async fn commit(&self) -> Result<(), DatabaseError> {
        self.finish("COMMIT").await
    }

    async fn rollback(&self) -> Result<(), DatabaseError> {
        self.finish("ROLLBACK").await
    }
}
