//! Data Models
//!
//! This module contains the core data structures used throughout Blocktree:
//!
//! - `Block` - a tree node with a JSON payload and explicit child ordering
//! - `BlockPermission` - per-user permission grant on a block
//! - `BlockLink` - directed backlink edge for link blocks
//!
//! All tree structure beyond `parent_id` lives inside the block's `data`
//! payload, accessed through the typed helpers on `Block` rather than by
//! free-form JSON mutation.

mod block;
mod link;
mod permission;

pub use block::{Block, ChildOrder, CHILD_ORDER_KEY, LINK_SOURCE_KEY, LINK_VIEW_KEY};
pub use link::BlockLink;
pub use permission::{BlockPermission, PermissionLevel, UserId, DEFAULT_CREATOR_PERMISSION};
