//! Import Plan - Staged Write Set
//!
//! The import engine never writes while it validates. Instead it stages every
//! intended mutation into an `ImportPlan`, and the whole plan is applied in a
//! single transaction by `DatabaseService::db_apply_import`. If any validation
//! problem is recorded the plan is simply discarded.

use crate::models::{Block, BlockLink, BlockPermission};
use serde_json::Value;
use uuid::Uuid;

/// A staged update to an existing block.
///
/// Carries the fully reconciled row state; `data` already contains the
/// resolved `childOrder` for the block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockUpdate {
    pub id: Uuid,
    pub title: Option<String>,
    pub data: Value,
    pub parent_id: Option<Uuid>,
}

/// A staged append/removal of a child id in an external parent's `childOrder`.
///
/// Only parents outside the payload are patched this way; parents inside the
/// payload get their order reconciled directly into their `BlockUpdate` data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderPatch {
    pub parent_id: Uuid,
    pub child_id: Uuid,
}

/// A staged `parent_id` change for a stored block that is not itself in the
/// payload but was claimed by a payload block's `childOrder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reparent {
    pub child_id: Uuid,
    pub new_parent_id: Uuid,
}

/// Everything one import batch intends to write, in apply order.
#[derive(Debug, Clone, Default)]
pub struct ImportPlan {
    /// New blocks, inserted parents-first within the batch.
    pub create: Vec<Block>,
    /// Existing blocks whose title, data or parent changed.
    pub update: Vec<BlockUpdate>,
    /// Child ids to append to external parents' `childOrder`.
    pub order_appends: Vec<OrderPatch>,
    /// Child ids to strip from old external parents' `childOrder`.
    pub order_removals: Vec<OrderPatch>,
    /// Stored blocks re-pointed at a payload parent.
    pub reparent: Vec<Reparent>,
    /// Collapsed permission grants to upsert.
    pub permissions: Vec<BlockPermission>,
    /// Link edges to upsert, replacing any previous edge for the same target.
    pub links: Vec<BlockLink>,
    /// Blocks to delete; foreign keys cascade to subtrees, permissions and links.
    pub delete: Vec<Uuid>,
}

impl ImportPlan {
    /// Whether applying this plan would touch the database at all.
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update.is_empty()
            && self.order_appends.is_empty()
            && self.order_removals.is_empty()
            && self.reparent.is_empty()
            && self.permissions.is_empty()
            && self.links.is_empty()
            && self.delete.is_empty()
    }
}
