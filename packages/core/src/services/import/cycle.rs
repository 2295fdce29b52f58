//! Cycle Detection
//!
//! Third import phase: the parent map the batch would produce is walked
//! with an explicit visited set before anything is staged. A payload may
//! close a cycle through stored blocks that are not in the payload at all,
//! so the walk runs over the stored parents of the principal's mutable set
//! overlaid with the payload's declared parents and with the re-parents
//! its `childOrder` claims imply. Forbidden records are already flagged
//! and take no part.

use crate::models::{Block, ChildOrder};
use crate::services::import::payload::NormalizedPayload;
use crate::services::import::report::{ImportReport, ProblemCode};
use std::collections::{BTreeSet, HashMap, HashSet};
use uuid::Uuid;

/// Walk the post-import parent map and record `cycle_detected` problems.
///
/// Every distinct block visited by a walk that revisits a node is flagged,
/// in sorted id order. Returns true when any cycle was found; the batch
/// must then abort.
pub(crate) fn detect(
    payload: &NormalizedPayload,
    candidates: &BTreeSet<Uuid>,
    existing: &HashMap<Uuid, Block>,
    allowed: &HashMap<Uuid, Option<Uuid>>,
    report: &mut ImportReport,
) -> bool {
    // Parent map after the batch would apply: stored parents of the mutable
    // set, overlaid with the candidates' declared (or kept) parents.
    let mut parent_after: HashMap<Uuid, Option<Uuid>> = allowed.clone();
    for id in candidates {
        let declared = payload.by_id.get(id).and_then(|b| b.parent_id);
        let effective = declared.or_else(|| existing.get(id).and_then(|b| b.parent_id));
        parent_after.insert(*id, effective);
    }

    // A childOrder entry naming a mutable stored block claims it away from
    // its current parent; that re-parent can close a cycle just as a
    // declared parent does.
    let mut claimed_moves: BTreeSet<Uuid> = BTreeSet::new();
    for id in candidates {
        let Some(data) = payload.by_id.get(id).and_then(|b| b.data.as_ref()) else {
            continue;
        };
        for child in ChildOrder::of(data).valid_ids() {
            if candidates.contains(&child) {
                continue;
            }
            if let Some(&stored_parent) = allowed.get(&child) {
                if stored_parent != Some(*id) {
                    parent_after.insert(child, Some(*id));
                    claimed_moves.insert(child);
                }
            }
        }
    }

    let mut flagged: BTreeSet<Uuid> = BTreeSet::new();

    // Only requested parent changes can close a cycle, whether declared
    // via parent_id or implied by a childOrder claim.
    let starts = candidates
        .iter()
        .filter(|id| payload.by_id.get(id).and_then(|b| b.parent_id).is_some())
        .chain(claimed_moves.iter());
    for start in starts {
        let mut chain: Vec<Uuid> = Vec::new();
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut current = *start;
        loop {
            if visited.contains(&current) {
                flagged.extend(chain.iter().copied());
                break;
            }
            chain.push(current);
            visited.insert(current);
            match parent_after.get(&current) {
                Some(Some(parent)) => current = *parent,
                // A root or a block outside the mutable set ends the walk
                _ => break,
            }
        }
    }

    for id in &flagged {
        report.problem(id.to_string(), ProblemCode::CycleDetected);
    }
    !flagged.is_empty()
}
