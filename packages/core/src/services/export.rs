//! Subtree Export
//!
//! Turns a stored subtree back into the record format the import engine
//! accepts, so subtrees can be copied between databases (or duplicated in
//! place after an id remap). Records come out in document order, parents
//! before children, each child list following the parent's `childOrder`.

use crate::db::BlockStore;
use crate::models::{Block, ChildOrder, CHILD_ORDER_KEY, LINK_SOURCE_KEY};
use crate::services::error::BlockServiceError;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Deepest subtree an export will walk; blocks below are skipped.
pub const EXPORT_MAX_DEPTH: usize = 100;

/// Exports subtrees as importable record batches.
pub struct ExportService {
    store: Arc<dyn BlockStore>,
}

impl ExportService {
    pub fn new(store: Arc<dyn BlockStore>) -> Self {
        Self { store }
    }

    /// Export the subtree rooted at `root` as import records.
    ///
    /// The root record keeps its stored parent so re-importing restores
    /// the block in place. A stored cycle cannot loop the walk; every
    /// block is emitted at most once.
    pub async fn export_subtree(&self, root: Uuid) -> Result<Vec<Value>, BlockServiceError> {
        let Some(root_block) = self.store.get_block(root).await? else {
            return Err(BlockServiceError::block_not_found(root.to_string()));
        };

        let mut records = Vec::new();
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut stack: Vec<(Block, usize)> = vec![(root_block, 0)];

        while let Some((block, depth)) = stack.pop() {
            if !visited.insert(block.id) {
                continue;
            }
            records.push(record_of(&block));
            if depth >= EXPORT_MAX_DEPTH {
                tracing::warn!(block_id = %block.id, "export depth limit reached, subtree truncated");
                continue;
            }

            let mut children = self.store.list_children(block.id).await?;
            if let ChildOrder::Entries(_) = block.child_order() {
                let order = block.child_order().valid_ids();
                let position: HashMap<Uuid, usize> =
                    order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
                children.sort_by_key(|c| position.get(&c.id).copied().unwrap_or(usize::MAX));
            }
            // reversed so the stack pops them in document order
            for child in children.into_iter().rev() {
                stack.push((child, depth + 1));
            }
        }

        Ok(records)
    }
}

fn record_of(block: &Block) -> Value {
    json!({
        "id": block.id.to_string(),
        "title": block.title,
        "data": block.data,
        "parent_id": block.parent_id.map(|p| p.to_string()),
    })
}

/// Rewrite every id in an exported batch to a fresh UUID.
///
/// Internal references follow: `parent_id`, `childOrder` entries and link
/// `source` values that name an exported block are remapped; references to
/// blocks outside the batch are left alone. The result imports as a
/// structural copy of the original subtree.
pub fn remap_ids(records: &[Value]) -> Vec<Value> {
    let mut mapping: HashMap<String, String> = HashMap::new();
    for record in records {
        if let Some(id) = record.get("id").and_then(Value::as_str) {
            mapping.insert(id.to_string(), Uuid::new_v4().to_string());
        }
    }

    records
        .iter()
        .map(|record| {
            let mut out = record.clone();
            let Value::Object(map) = &mut out else {
                return out;
            };
            for key in ["id", "parent_id"] {
                if let Some(Value::String(v)) = map.get_mut(key) {
                    if let Some(new) = mapping.get(v.as_str()) {
                        *v = new.clone();
                    }
                }
            }
            if let Some(Value::Object(data)) = map.get_mut("data") {
                if let Some(Value::Array(entries)) = data.get_mut(CHILD_ORDER_KEY) {
                    for entry in entries {
                        if let Value::String(v) = entry {
                            if let Some(new) = mapping.get(v.as_str()) {
                                *v = new.clone();
                            }
                        }
                    }
                }
                if let Some(Value::String(v)) = data.get_mut(LINK_SOURCE_KEY) {
                    if let Some(new) = mapping.get(v.as_str()) {
                        *v = new.clone();
                    }
                }
            }
            out
        })
        .collect()
}
