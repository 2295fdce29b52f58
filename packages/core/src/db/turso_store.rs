//! TursoStore - BlockStore Implementation for Turso/libsql Backend
//!
//! This module implements the `BlockStore` trait for the Turso (libsql)
//! database, wrapping `DatabaseService` and delegating all operations to the
//! extracted `db_*` methods. The wrapper holds zero business logic; its only
//! job besides delegation is converting decoded row columns into models.

use crate::db::block_store::BlockStore;
use crate::db::database::BlockColumns;
use crate::db::plan::ImportPlan;
use crate::db::DatabaseService;
use crate::models::{Block, BlockPermission, PermissionLevel, UserId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// TursoStore implements the BlockStore trait for the Turso/libsql backend
///
/// This is a thin wrapper around DatabaseService with pure delegation.
pub struct TursoStore {
    /// Underlying database service (extracted SQL operations)
    db: Arc<DatabaseService>,
}

impl TursoStore {
    /// Create a new TursoStore wrapper
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Convert decoded `blocks` columns to a Block model
    fn block_from_columns(cols: BlockColumns) -> Result<Block> {
        let (id_str, title, data_json, parent_str, creator_id) = cols;

        let id = Uuid::parse_str(&id_str)
            .with_context(|| format!("Invalid block id in database: {}", id_str))?;
        let parent_id = parent_str
            .map(|p| {
                Uuid::parse_str(&p)
                    .with_context(|| format!("Invalid parent id in database: {}", p))
            })
            .transpose()?;
        let data = serde_json::from_str(&data_json)
            .with_context(|| format!("Invalid JSON data for block {}", id))?;

        Ok(Block {
            id,
            title,
            data,
            parent_id,
            creator_id,
        })
    }
}

#[async_trait]
impl BlockStore for TursoStore {
    async fn create_block(&self, block: Block) -> Result<Block> {
        self.db
            .db_create_block(&block)
            .await
            .context("Failed to create block")?;
        Ok(block)
    }

    async fn get_block(&self, id: Uuid) -> Result<Option<Block>> {
        let cols = self
            .db
            .db_get_block(&id.to_string())
            .await
            .context("Failed to get block")?;
        cols.map(Self::block_from_columns).transpose()
    }

    async fn update_block(&self, block: Block) -> Result<()> {
        self.db
            .db_update_block(&block)
            .await
            .context("Failed to update block")
    }

    async fn list_children(&self, parent_id: Uuid) -> Result<Vec<Block>> {
        let rows = self
            .db
            .db_list_children(&parent_id.to_string())
            .await
            .context("Failed to list children")?;
        rows.into_iter().map(Self::block_from_columns).collect()
    }

    async fn load_projection(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Block>> {
        let id_strings: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        let rows = self
            .db
            .db_load_projection(&id_strings)
            .await
            .context("Failed to load projection")?;

        let mut out = HashMap::with_capacity(rows.len());
        for cols in rows {
            let block = Self::block_from_columns(cols)?;
            out.insert(block.id, block);
        }
        Ok(out)
    }

    async fn load_authorized(&self, user_id: UserId) -> Result<HashMap<Uuid, Option<Uuid>>> {
        let pairs = self
            .db
            .db_load_authorized(user_id)
            .await
            .context("Failed to load authorized set")?;

        let mut out = HashMap::with_capacity(pairs.len());
        for (id_str, parent_str) in pairs {
            let id = Uuid::parse_str(&id_str)
                .with_context(|| format!("Invalid block id in database: {}", id_str))?;
            let parent_id = parent_str
                .map(|p| {
                    Uuid::parse_str(&p)
                        .with_context(|| format!("Invalid parent id in database: {}", p))
                })
                .transpose()?;
            out.insert(id, parent_id);
        }
        Ok(out)
    }

    async fn grant_permission(&self, permission: BlockPermission) -> Result<()> {
        self.db
            .db_grant_permission(
                &permission.block_id.to_string(),
                permission.user_id,
                permission.permission.as_str(),
            )
            .await
            .context("Failed to grant permission")
    }

    async fn list_permissions(&self, block_id: Uuid) -> Result<Vec<BlockPermission>> {
        let pairs = self
            .db
            .db_list_permissions(&block_id.to_string())
            .await
            .context("Failed to list permissions")?;

        pairs
            .into_iter()
            .map(|(user_id, level)| {
                let permission = level
                    .parse::<PermissionLevel>()
                    .map_err(|e| anyhow::anyhow!(e))
                    .with_context(|| format!("Invalid stored permission on {}", block_id))?;
                Ok(BlockPermission {
                    block_id,
                    user_id,
                    permission,
                })
            })
            .collect()
    }

    async fn link_exists(&self, source_id: Uuid, target_id: Uuid) -> Result<bool> {
        self.db
            .db_link_exists(&source_id.to_string(), &target_id.to_string())
            .await
            .context("Failed to query link edge")
    }

    async fn apply_import(&self, plan: &ImportPlan) -> Result<()> {
        self.db
            .db_apply_import(plan)
            .await
            .context("Failed to apply import plan")
    }
}
