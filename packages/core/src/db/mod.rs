//! Database Layer
//!
//! This module handles all database interactions using libsql:
//!
//! - Database initialization and connection management ([`DatabaseService`])
//! - The storage contract the services are written against ([`MenuStore`],
//!   [`MenuTransaction`])
//! - The libsql implementation of that contract ([`TursoStore`])
//!
//! # Architecture
//!
//! Menu entries live in a single `menu_nodes` table. The parent link is a
//! self-referencing foreign key with `ON DELETE CASCADE`; sibling order is a
//! plain integer column maintained by the mutation engine inside write
//! transactions.

mod database;
mod error;
mod menu_store;
mod turso_store;

pub use database::DatabaseService;
pub use error::DatabaseError;
pub use menu_store::{MenuNodeChanges, MenuStore, MenuTransaction, OrderRange};
pub use turso_store::{TursoStore, TursoTransaction};
