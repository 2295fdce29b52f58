//! BlockStore Trait - Database Abstraction Layer
//!
//! This module defines the `BlockStore` trait that abstracts block
//! persistence for the service layer. The trait keeps the import engine free
//! of SQL and lets alternative backends slot in without touching business
//! logic.
//!
//! # Architecture
//!
//! - **Abstraction point**: Between the services (business logic) and the
//!   database implementation
//! - **Async-first**: All methods are async; implementations must be
//!   `Send + Sync` because futures move between threads
//! - **Error handling**: `anyhow::Result` for flexible error context at the
//!   boundary; validation problems never surface here
//!
//! # Examples
//!
//! ```rust,no_run
//! use blocktree_core::db::{BlockStore, TursoStore, DatabaseService};
//! use blocktree_core::models::Block;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/blocktree.db")).await?);
//!     let store: Arc<dyn BlockStore> = Arc::new(TursoStore::new(db));
//!
//!     let block = Block::new(Some("My note".to_string()), None, 1);
//!     store.create_block(block).await?;
//!     Ok(())
//! }
//! ```

use crate::db::plan::ImportPlan;
use crate::models::{Block, BlockPermission, UserId};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

/// Abstraction layer for block persistence operations
///
/// # Method Categories
///
/// - **CRUD projections**: create, read, update, children
/// - **Import support**: bulk projection load, authorized set, atomic plan
///   application
/// - **Grants and links**: permission upserts and backlink queries
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Create a new block
    ///
    /// # Ownership
    ///
    /// Takes ownership of the block and returns it after insertion so
    /// callers can keep using the value without cloning up front.
    ///
    /// # Errors
    ///
    /// Returns an error when the id already exists or the parent is missing
    /// (foreign key violation).
    async fn create_block(&self, block: Block) -> Result<Block>;

    /// Fetch a single block by id, or `None` when absent
    async fn get_block(&self, id: Uuid) -> Result<Option<Block>>;

    /// Overwrite a block's title, data and parent
    ///
    /// Intended for direct callers and test fixtures; imports go through
    /// [`apply_import`](Self::apply_import) instead.
    async fn update_block(&self, block: Block) -> Result<()>;

    /// List the direct children of a block, oldest first
    async fn list_children(&self, parent_id: Uuid) -> Result<Vec<Block>>;

    /// Fetch the stored state of a set of blocks, keyed by id
    ///
    /// Ids with no stored block are absent from the map.
    async fn load_projection(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Block>>;

    /// The blocks a user may mutate, mapped to their stored parent
    ///
    /// A block qualifies when the user holds an `edit`, `edit_ac` or
    /// `delete` grant on it.
    async fn load_authorized(&self, user_id: UserId) -> Result<HashMap<Uuid, Option<Uuid>>>;

    /// Upsert a single permission grant
    async fn grant_permission(&self, permission: BlockPermission) -> Result<()>;

    /// List the grants on a block, ordered by user id
    async fn list_permissions(&self, block_id: Uuid) -> Result<Vec<BlockPermission>>;

    /// Whether a backlink edge exists from `source_id` to the link block
    /// `target_id`
    async fn link_exists(&self, source_id: Uuid, target_id: Uuid) -> Result<bool>;

    /// Apply a staged import plan atomically
    ///
    /// Either every staged mutation lands or none does.
    async fn apply_import(&self, plan: &ImportPlan) -> Result<()>;
}
