//! Database Layer
//!
//! This module provides the libsql-backed storage layer for Blocktree:
//!
//! - `DatabaseService` - connection management, schema and extracted SQL
//!   operations (`db_*` methods)
//! - `BlockStore` - async trait abstracting block persistence for the
//!   service layer
//! - `TursoStore` - `BlockStore` implementation delegating to
//!   `DatabaseService`
//! - `ImportPlan` - the staged write set an import batch applies atomically
//! - `DatabaseError` - database-level error type

pub mod block_store;
pub mod database;
pub mod error;
pub mod plan;
pub mod turso_store;

#[cfg(test)]
mod turso_store_test;

pub use block_store::BlockStore;
pub use database::{BlockColumns, DatabaseService};
pub use error::DatabaseError;
pub use plan::{BlockUpdate, ImportPlan, OrderPatch, Reparent};
pub use turso_store::TursoStore;
