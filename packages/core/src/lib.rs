//! Blocktree Core Business Logic Layer
//!
//! This crate provides the block tree data model, the libsql storage layer and
//! the bulk import/merge engine for the Blocktree content service.
//!
//! # Architecture
//!
//! - **Adjacency-list tree**: every block has a nullable `parent_id` and an
//!   explicit per-parent child ordering stored in its own `data.childOrder`
//! - **Open JSON payloads**: block content lives in the `data` column with two
//!   reserved keys (`childOrder`, and `view = "link"` + `source` for link blocks)
//! - **libsql**: embedded SQLite-compatible database, WAL mode, FK cascades
//! - **Batch import engine**: validate → diff → stage → apply atomically
//!
//! # Modules
//!
//! - [`models`] - Data structures (Block, BlockPermission, BlockLink)
//! - [`services`] - Business services (ImportService, ExportService)
//! - [`db`] - Database layer with libsql integration

pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use models::*;
pub use services::*;
