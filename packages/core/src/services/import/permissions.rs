//! Permission Grant Collection
//!
//! Sixth import phase: raw `permissions` arrays from the payload become
//! staged grant upserts. A record may list the same user several times; the
//! last grant wins. Created blocks always end up with the creator default
//! for the importing principal, applied after explicit grants collapse, so
//! a payload cannot leave a creator without a mutating grant on their own
//! block.

use crate::models::{BlockPermission, PermissionLevel, DEFAULT_CREATOR_PERMISSION};
use crate::services::import::report::{ImportReport, ProblemCode};
use crate::services::import::ImportContext;
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Required keys of a single grant entry.
const GRANT_KEYS: [&str; 2] = ["user_id", "permission"];

/// Validate and collect permission grants for every candidate.
pub(crate) fn collect(ctx: &ImportContext, report: &mut ImportReport) -> Vec<BlockPermission> {
    let mut staged = Vec::new();

    for id in &ctx.payload.order {
        if !ctx.create_ids.contains(id) && !ctx.update_ids.contains(id) {
            continue;
        }
        let Some(payload_block) = ctx.payload.by_id.get(id) else {
            continue;
        };

        let mut grants = parse_grants(*id, &payload_block.permissions, report);

        // Applied last so an explicit lower grant never wins for the creator.
        if ctx.create_ids.contains(id) {
            grants.insert(ctx.principal, DEFAULT_CREATOR_PERMISSION);
        }

        for (user_id, permission) in grants {
            staged.push(BlockPermission {
                block_id: *id,
                user_id,
                permission,
            });
            report.record_grant(user_id, permission, *id);
        }
    }

    staged
}

/// Parse one record's raw `permissions` value into last-wins grants.
///
/// `null` and an empty object both mean no grants. Any other non-array
/// shape, and any entry that is not exactly `{user_id, permission}`, is
/// `not_valid_permission`; a level outside the grantable set is
/// `not_valid_permission_field`.
fn parse_grants(
    block_id: Uuid,
    raw: &Value,
    report: &mut ImportReport,
) -> BTreeMap<i64, PermissionLevel> {
    let mut grants = BTreeMap::new();

    let entries = match raw {
        Value::Null => return grants,
        Value::Object(map) if map.is_empty() => return grants,
        Value::Array(entries) => entries,
        _ => {
            report.problem(block_id.to_string(), ProblemCode::NotValidPermission);
            return grants;
        }
    };

    for entry in entries {
        let Value::Object(map) = entry else {
            report.problem(block_id.to_string(), ProblemCode::NotValidPermission);
            continue;
        };
        if map.len() != GRANT_KEYS.len() || !GRANT_KEYS.iter().all(|k| map.contains_key(*k)) {
            report.problem(block_id.to_string(), ProblemCode::NotValidPermission);
            continue;
        }
        let Some(user_id) = map.get("user_id").and_then(Value::as_i64) else {
            report.problem(block_id.to_string(), ProblemCode::NotValidPermission);
            continue;
        };
        let Some(level_str) = map.get("permission").and_then(Value::as_str) else {
            report.problem(block_id.to_string(), ProblemCode::NotValidPermissionField);
            continue;
        };
        let level = match level_str.parse::<PermissionLevel>() {
            Ok(level) if level.import_grantable() => level,
            _ => {
                report.problem(block_id.to_string(), ProblemCode::NotValidPermissionField);
                continue;
            }
        };
        grants.insert(user_id, level);
    }

    grants
}
