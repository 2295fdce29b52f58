//! Service Error Types
//!
//! Errors surfaced by the service layer. Storage failures from the
//! `BlockStore` boundary arrive as `anyhow::Error` and are wrapped
//! transparently; database-level errors keep their own variant so callers
//! can match on them.

use crate::db::DatabaseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlockServiceError {
    #[error("Block not found: {id}")]
    BlockNotFound { id: String },

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error(transparent)]
    StoreFailed(#[from] anyhow::Error),
}

impl BlockServiceError {
    pub fn block_not_found(id: impl Into<String>) -> Self {
        Self::BlockNotFound { id: id.into() }
    }
}
