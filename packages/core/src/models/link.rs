//! Link Edge Model
//!
//! Directed backlink edge recording that `target_id` is a link block whose
//! payload `source` points at `source_id`. Edges are maintained by the import
//! engine and cascade-deleted with either endpoint.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A backlink edge from a source block to the link block referencing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockLink {
    /// The block being referenced.
    pub source_id: Uuid,
    /// The link block carrying `data.view == "link"`.
    pub target_id: Uuid,
}
