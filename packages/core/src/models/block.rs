//! Block Data Structure
//!
//! Defines the core `Block` struct: a tree node with a UUID identity, an open
//! JSON `data` payload and a nullable parent reference.
//!
//! # Reserved payload keys
//!
//! The `data` object is caller-owned except for two reserved keys:
//!
//! - `childOrder`: the authoritative ordered list of child block ids. When
//!   present it must equal, as a set, the ids of blocks whose `parent_id`
//!   points at this block; list order is caller-controlled.
//! - `view = "link"` + `source`: marks the block as a symbolic reference to
//!   another block. Link blocks are tracked by a `BlockLink` edge.
//!
//! All engine code reads and writes these keys through the typed accessors
//! below instead of poking at the JSON value directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::UserId;

/// Reserved `data` key holding the ordered child-id list.
pub const CHILD_ORDER_KEY: &str = "childOrder";

/// Reserved `data.view` value marking a link block.
pub const LINK_VIEW_KEY: &str = "link";

/// Reserved `data` key naming the block a link block points at.
pub const LINK_SOURCE_KEY: &str = "source";

/// A block: one node of the content tree.
///
/// Blocks are stored in an adjacency list (`parent_id`) while the order of a
/// block's children is kept in the block's own `data.childOrder`. The `data`
/// payload is otherwise opaque to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Unique identifier (UUID, externally a string)
    pub id: Uuid,

    /// Optional display title; creation defaults a blank title to the id string
    pub title: Option<String>,

    /// Open JSON object payload (reserved keys: `childOrder`, `view`, `source`)
    pub data: Value,

    /// Parent block, or `None` for a root
    pub parent_id: Option<Uuid>,

    /// User that created the block
    pub creator_id: UserId,
}

/// Result of reading a block's `childOrder` payload key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildOrder {
    /// The key is absent: child ordering was never specified for this block.
    Unspecified,
    /// The key is present but is not a list. Stored blocks with a malformed
    /// order are tolerated and left untouched by the import engine.
    Invalid,
    /// The ordered child-id entries, kept as raw strings so callers decide
    /// how to treat unparsable ids.
    Entries(Vec<String>),
}

impl ChildOrder {
    /// Read the `childOrder` key out of an arbitrary `data` payload.
    pub fn of(data: &Value) -> ChildOrder {
        match data.get(CHILD_ORDER_KEY) {
            None => ChildOrder::Unspecified,
            Some(Value::Array(items)) => ChildOrder::Entries(
                items
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            Some(_) => ChildOrder::Invalid,
        }
    }

    /// The entries parsed as UUIDs, silently skipping unparsable ones.
    pub fn valid_ids(&self) -> Vec<Uuid> {
        match self {
            ChildOrder::Entries(items) => items
                .iter()
                .filter_map(|s| Uuid::parse_str(s).ok())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl Block {
    /// Create a new block with an auto-generated UUID and empty payload.
    pub fn new(title: Option<String>, parent_id: Option<Uuid>, creator_id: UserId) -> Self {
        Self::with_id(Uuid::new_v4(), title, Value::Object(Default::default()), parent_id, creator_id)
    }

    /// Create a block with an explicit id and payload.
    pub fn with_id(
        id: Uuid,
        title: Option<String>,
        data: Value,
        parent_id: Option<Uuid>,
        creator_id: UserId,
    ) -> Self {
        Self {
            id,
            title,
            data,
            parent_id,
            creator_id,
        }
    }

    /// Read this block's child ordering.
    pub fn child_order(&self) -> ChildOrder {
        ChildOrder::of(&self.data)
    }

    /// Replace this block's `childOrder` with the given ids.
    pub fn set_child_order(&mut self, order: &[Uuid]) {
        let items: Vec<Value> = order.iter().map(|id| Value::String(id.to_string())).collect();
        match &mut self.data {
            Value::Object(map) => {
                map.insert(CHILD_ORDER_KEY.to_string(), Value::Array(items));
            }
            other => {
                let mut map = serde_json::Map::new();
                map.insert(CHILD_ORDER_KEY.to_string(), Value::Array(items));
                *other = Value::Object(map);
            }
        }
    }

    /// Whether the payload marks this block as a link block.
    pub fn is_link_view(data: &Value) -> bool {
        data.get("view").and_then(Value::as_str) == Some(LINK_VIEW_KEY)
    }

    /// The raw `source` value of a link payload, if present.
    pub fn link_source_raw(data: &Value) -> Option<&Value> {
        data.get(LINK_SOURCE_KEY)
    }
}
