//! State Reconciliation
//!
//! Fourth import phase, and the heart of the engine: every candidate's
//! declared state is merged with its stored state into the staged write
//! set. This covers parent resolution, `childOrder` resolution, the
//! resulting cross-parent moves, stale-child deletion, and the final
//! created/updated/unchanged classification.
//!
//! Parents fall into two camps. A parent inside the payload has its order
//! reconciled directly into its own staged data; a parent outside the
//! payload gets a targeted append/removal patch so the rest of its data is
//! never touched.

use crate::db::{BlockUpdate, ImportPlan, OrderPatch, Reparent};
use crate::models::{Block, ChildOrder, CHILD_ORDER_KEY};
use crate::services::import::report::{ImportReport, ProblemCode};
use crate::services::import::ImportContext;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// How a block ended up changing parents.
enum MoveKind {
    /// The record declared a new `parent_id`; the new parent's order must
    /// also gain the child.
    DeclaredParent,
    /// A payload block's `childOrder` claimed a stored block; the claimant
    /// already lists the child, only the old parent needs patching.
    OrderClaim,
}

struct Move {
    child: Uuid,
    old_parent: Option<Uuid>,
    new_parent: Uuid,
    kind: MoveKind,
}

/// Working state of one candidate while the phases run.
struct CandidateState {
    title: Option<String>,
    data: Value,
    parent: Option<Uuid>,
    is_create: bool,
}

/// Reconcile the payload against stored state, staging the write set.
pub(crate) fn reconcile(ctx: &mut ImportContext, plan: &mut ImportPlan, report: &mut ImportReport) {
    let order = candidate_order(ctx);

    // Ids that remain attached after the batch: every candidate plus every
    // valid entry of every declared childOrder. Old-order children outside
    // this set are scheduled for deletion.
    let mut claimed: HashSet<Uuid> = order.iter().copied().collect();
    for id in &order {
        if let Some(data) = ctx.payload.by_id.get(id).and_then(|b| b.data.as_ref()) {
            claimed.extend(ChildOrder::of(data).valid_ids());
        }
    }

    let mut states: HashMap<Uuid, CandidateState> = HashMap::new();
    let mut moves: Vec<Move> = Vec::new();

    // Parent resolution. Must finish for every candidate before any
    // childOrder entry can be checked against its declared parent.
    for &id in &order {
        let is_create = ctx.create_ids.contains(&id);
        let Some(payload_block) = ctx.payload.by_id.get(&id) else {
            report.problem(id.to_string(), ProblemCode::PayloadMissing);
            continue;
        };
        let stored = ctx.existing.get(&id);
        let stored_parent = stored.and_then(|b| b.parent_id);

        let parent = match payload_block.parent_id {
            None => {
                if is_create {
                    None
                } else {
                    stored_parent
                }
            }
            Some(p) if !is_create && Some(p) == stored_parent => Some(p),
            Some(p) if is_payload_candidate(ctx, &p) || ctx.allowed.contains_key(&p) => {
                moves.push(Move {
                    child: id,
                    old_parent: if is_create { None } else { stored_parent },
                    new_parent: p,
                    kind: MoveKind::DeclaredParent,
                });
                Some(p)
            }
            Some(_) => {
                report.problem(id.to_string(), ProblemCode::NotFoundParent);
                if is_create {
                    None
                } else {
                    stored_parent
                }
            }
        };

        let data = match &payload_block.data {
            Some(d) => d.clone(),
            None => stored
                .map(|b| b.data.clone())
                .unwrap_or_else(|| Value::Object(Default::default())),
        };

        states.insert(
            id,
            CandidateState {
                title: payload_block.title.clone(),
                data,
                parent,
                is_create,
            },
        );
        ctx.resolved_parents.insert(id, parent);
    }

    // childOrder resolution.
    for &id in &order {
        let Some(payload_data) = ctx.payload.by_id.get(&id).and_then(|b| b.data.as_ref()) else {
            continue;
        };
        match ChildOrder::of(payload_data) {
            ChildOrder::Unspecified => {}
            ChildOrder::Invalid => {
                report.problem(id.to_string(), ProblemCode::NotValidChildOrder);
            }
            ChildOrder::Entries(entries) => {
                let old_order: Vec<Uuid> = ctx
                    .existing
                    .get(&id)
                    .map(|b| b.child_order().valid_ids())
                    .unwrap_or_default();

                let mut resolved: Vec<Uuid> = Vec::new();
                for raw in &entries {
                    let Ok(child) = Uuid::parse_str(raw) else {
                        report.problem(id.to_string(), ProblemCode::NotValidChildOrder);
                        continue;
                    };
                    if is_payload_candidate(ctx, &child) {
                        // A payload member must itself point at this parent.
                        if ctx.resolved_parents.get(&child).copied().flatten() == Some(id) {
                            resolved.push(child);
                        } else {
                            report.problem(child.to_string(), ProblemCode::NotValidChildOrder);
                        }
                    } else if old_order.contains(&child) {
                        resolved.push(child);
                    } else if let Some(&stored_parent) = ctx.allowed.get(&child) {
                        if stored_parent != Some(id) {
                            moves.push(Move {
                                child,
                                old_parent: stored_parent,
                                new_parent: id,
                                kind: MoveKind::OrderClaim,
                            });
                            plan.reparent.push(Reparent {
                                child_id: child,
                                new_parent_id: id,
                            });
                            report.mark_updated(child);
                        }
                        resolved.push(child);
                    } else {
                        report.problem(raw.clone(), ProblemCode::NotFoundChild);
                    }
                }

                // Old children neither kept nor claimed anywhere are gone.
                for child in &old_order {
                    if !claimed.contains(child) {
                        plan.delete.push(*child);
                        report.deleted.insert(*child);
                    }
                }

                if let Some(state) = states.get_mut(&id) {
                    set_order(&mut state.data, &resolved);
                }
            }
        }
    }

    // Cross-parent move fallout: patch the orders on both ends.
    for mv in &moves {
        if let Some(old) = mv.old_parent {
            if old != mv.new_parent {
                if let Some(state) = states.get_mut(&old) {
                    remove_order_entry(&mut state.data, mv.child);
                } else {
                    plan.order_removals.push(OrderPatch {
                        parent_id: old,
                        child_id: mv.child,
                    });
                    report.mark_updated(old);
                }
            }
        }
        if matches!(mv.kind, MoveKind::DeclaredParent) {
            if let Some(state) = states.get_mut(&mv.new_parent) {
                append_order_entry(&mut state.data, mv.child);
            } else {
                plan.order_appends.push(OrderPatch {
                    parent_id: mv.new_parent,
                    child_id: mv.child,
                });
                report.mark_updated(mv.new_parent);
            }
        }
    }

    // Classification and staging.
    for &id in &order {
        let Some(state) = states.remove(&id) else { continue };
        if state.is_create {
            let title = match state.title {
                Some(t) if !t.is_empty() => t,
                _ => id.to_string(),
            };
            plan.create.push(Block::with_id(
                id,
                Some(title),
                state.data,
                state.parent,
                ctx.principal,
            ));
        } else {
            let Some(stored) = ctx.existing.get(&id) else { continue };
            let title = state.title.or_else(|| stored.title.clone());
            let changed = title != stored.title
                || state.parent != stored.parent_id
                || state.data != stored.data;
            if changed {
                plan.update.push(BlockUpdate {
                    id,
                    title,
                    data: state.data,
                    parent_id: state.parent,
                });
                report.mark_updated(id);
            } else {
                report.unchanged.insert(id);
            }
        }
    }
}

/// Candidates in payload order, followed by any planned id that has no
/// payload record at all (so the defensive guard can flag it).
fn candidate_order(ctx: &ImportContext) -> Vec<Uuid> {
    let mut order: Vec<Uuid> = ctx
        .payload
        .order
        .iter()
        .filter(|id| is_payload_candidate(ctx, id))
        .copied()
        .collect();
    let seen: HashSet<Uuid> = order.iter().copied().collect();
    for id in ctx.create_ids.iter().chain(ctx.update_ids.iter()) {
        if !seen.contains(id) {
            order.push(*id);
        }
    }
    order
}

fn is_payload_candidate(ctx: &ImportContext, id: &Uuid) -> bool {
    ctx.create_ids.contains(id) || ctx.update_ids.contains(id)
}

fn set_order(data: &mut Value, order: &[Uuid]) {
    if let Value::Object(map) = data {
        map.insert(
            CHILD_ORDER_KEY.to_string(),
            Value::Array(order.iter().map(|id| Value::String(id.to_string())).collect()),
        );
    }
}

/// Append a child to a working order, creating the list when absent.
/// A malformed order is left alone.
fn append_order_entry(data: &mut Value, child: Uuid) {
    let entry = child.to_string();
    match ChildOrder::of(data) {
        ChildOrder::Invalid => {}
        ChildOrder::Entries(ref items) if items.contains(&entry) => {}
        ChildOrder::Entries(mut items) => {
            items.push(entry);
            set_order_raw(data, items);
        }
        ChildOrder::Unspecified => set_order_raw(data, vec![entry]),
    }
}

/// Strip a child from a working order, if it is listed.
fn remove_order_entry(data: &mut Value, child: Uuid) {
    let entry = child.to_string();
    if let ChildOrder::Entries(items) = ChildOrder::of(data) {
        if items.contains(&entry) {
            set_order_raw(data, items.into_iter().filter(|c| *c != entry).collect());
        }
    }
}

fn set_order_raw(data: &mut Value, entries: Vec<String>) {
    if let Value::Object(map) = data {
        map.insert(
            CHILD_ORDER_KEY.to_string(),
            Value::Array(entries.into_iter().map(Value::String).collect()),
        );
    }
}
