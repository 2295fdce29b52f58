//! Payload Normalization
//!
//! First import phase: raw JSON records become typed `PayloadBlock`s.
//! Records whose id never parses are dropped; every other problem keeps the
//! record so later phases can report against it. All problems block the
//! apply phase either way.

use crate::models::ChildOrder;
use crate::services::import::report::{ImportReport, ProblemCode};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// The record keys an import payload may carry.
const ALLOWED_KEYS: [&str; 5] = ["id", "title", "data", "parent_id", "permissions"];

/// One normalized payload record.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PayloadBlock {
    pub id: Uuid,
    /// New title, or `None` when the record requests no title change
    pub title: Option<String>,
    /// New data object, replacing the stored one wholesale when present
    pub data: Option<Value>,
    /// Declared new parent; `None` means no parent change requested
    pub parent_id: Option<Uuid>,
    /// Raw permission grants, validated by the permission phase
    pub permissions: Value,
}

/// The whole payload after normalization, in arrival order.
#[derive(Debug, Clone, Default)]
pub(crate) struct NormalizedPayload {
    pub by_id: HashMap<Uuid, PayloadBlock>,
    pub order: Vec<Uuid>,
}

impl NormalizedPayload {
    /// Every block id the payload touches: the records themselves, their
    /// declared parents and their childOrder entries.
    pub fn referenced_ids(&self) -> BTreeSet<Uuid> {
        let mut ids: BTreeSet<Uuid> = self.order.iter().copied().collect();
        for block in self.by_id.values() {
            if let Some(parent) = block.parent_id {
                ids.insert(parent);
            }
            if let Some(data) = &block.data {
                ids.extend(ChildOrder::of(data).valid_ids());
            }
        }
        ids
    }
}

/// Normalize raw records, accumulating problems into the report.
///
/// - Unparsable or missing `id` drops the record (`not_valid_uuid`)
/// - A repeated id keeps the first occurrence (`duplicate_id`)
/// - Unknown keys and wrongly typed values keep the record
///   (`not_valid_field`)
/// - An unparsable `parent_id` string clears the parent (`not_valid_uuid`);
///   a non-string `parent_id` clears it too (`not_valid_parent_uuid`)
pub(crate) fn normalize(records: Vec<Value>, report: &mut ImportReport) -> NormalizedPayload {
    let mut payload = NormalizedPayload::default();

    for record in records {
        let map = match record {
            Value::Object(map) => map,
            other => {
                report.problem(other.to_string(), ProblemCode::NotValidField);
                continue;
            }
        };

        let id = match map.get("id") {
            Some(Value::String(s)) => match Uuid::parse_str(s) {
                Ok(id) => id,
                Err(_) => {
                    report.problem(s.clone(), ProblemCode::NotValidUuid);
                    continue;
                }
            },
            Some(other) => {
                report.problem(other.to_string(), ProblemCode::NotValidUuid);
                continue;
            }
            None => {
                report.problem(String::new(), ProblemCode::NotValidUuid);
                continue;
            }
        };

        if payload.by_id.contains_key(&id) {
            report.problem(id.to_string(), ProblemCode::DuplicateId);
            continue;
        }

        for key in map.keys() {
            if !ALLOWED_KEYS.contains(&key.as_str()) {
                report.problem(id.to_string(), ProblemCode::NotValidField);
            }
        }

        let title = match map.get("title") {
            Some(Value::String(s)) => Some(s.clone()),
            None | Some(Value::Null) => None,
            Some(_) => {
                report.problem(id.to_string(), ProblemCode::NotValidField);
                None
            }
        };

        let data = match map.get("data") {
            Some(value @ Value::Object(_)) => Some(value.clone()),
            None | Some(Value::Null) => None,
            Some(_) => {
                report.problem(id.to_string(), ProblemCode::NotValidField);
                None
            }
        };

        let parent_id = match map.get("parent_id") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => match Uuid::parse_str(s) {
                Ok(parent) => Some(parent),
                Err(_) => {
                    report.problem(s.clone(), ProblemCode::NotValidUuid);
                    None
                }
            },
            Some(_) => {
                report.problem(id.to_string(), ProblemCode::NotValidParentUuid);
                None
            }
        };

        let permissions = map.get("permissions").cloned().unwrap_or(Value::Null);

        payload.order.push(id);
        payload.by_id.insert(
            id,
            PayloadBlock {
                id,
                title,
                data,
                parent_id,
                permissions,
            },
        );
    }

    payload
}
