//! Create/Update Partitioning
//!
//! Second import phase: every normalized record is classified against the
//! stored state. Existing blocks the principal may mutate become updates,
//! existing blocks without a mutating grant are flagged `forbidden`, and
//! everything else becomes a create.

use crate::models::Block;
use crate::services::import::payload::NormalizedPayload;
use crate::services::import::report::{ImportReport, ProblemCode};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// Partition the payload into create and update id sets.
///
/// Created ids are recorded in the report immediately, before validation
/// finishes; a later problem blocks the apply but leaves them listed.
pub(crate) fn partition(
    payload: &NormalizedPayload,
    existing: &HashMap<Uuid, Block>,
    allowed: &HashMap<Uuid, Option<Uuid>>,
    report: &mut ImportReport,
) -> (BTreeSet<Uuid>, BTreeSet<Uuid>) {
    let mut create_ids = BTreeSet::new();
    let mut update_ids = BTreeSet::new();

    for id in &payload.order {
        if existing.contains_key(id) {
            if allowed.contains_key(id) {
                update_ids.insert(*id);
            } else {
                report.problem(id.to_string(), ProblemCode::Forbidden);
            }
        } else {
            create_ids.insert(*id);
            report.created.insert(*id);
        }
    }

    (create_ids, update_ids)
}
