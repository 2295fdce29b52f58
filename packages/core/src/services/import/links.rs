//! Link Resolution
//!
//! Fifth import phase: payload blocks whose data declares the link view are
//! checked and staged as link edges. An edge runs from the referenced
//! source block to the link block itself, so link lookups by target always
//! land on the embedding block. Links on stored blocks are replaced
//! wholesale when the block's data is resupplied.

use crate::models::{Block, BlockLink};
use crate::services::import::report::{ImportReport, ProblemCode};
use crate::services::import::ImportContext;
use uuid::Uuid;

/// Validate link declarations among the candidates and stage their edges.
pub(crate) fn resolve(ctx: &ImportContext, report: &mut ImportReport) -> Vec<BlockLink> {
    let mut links = Vec::new();

    for id in &ctx.payload.order {
        if !ctx.create_ids.contains(id) && !ctx.update_ids.contains(id) {
            continue;
        }
        let Some(data) = ctx.payload.by_id.get(id).and_then(|b| b.data.as_ref()) else {
            continue;
        };
        if !Block::is_link_view(data) {
            continue;
        }

        let Some(raw_source) = Block::link_source_raw(data) else {
            report.problem(id.to_string(), ProblemCode::NotValidLink);
            continue;
        };
        let Some(source) = raw_source
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
        else {
            report.problem(id.to_string(), ProblemCode::NotValidSourceUuid);
            continue;
        };
        if !ctx.create_ids.contains(&source) && !ctx.allowed.contains_key(&source) {
            report.problem(id.to_string(), ProblemCode::NotAllowedLink);
            continue;
        }
        let Some(parent) = ctx.resolved_parents.get(id).copied().flatten() else {
            report.problem(id.to_string(), ProblemCode::NotLinkParent);
            continue;
        };
        if parent == source {
            report.problem(id.to_string(), ProblemCode::WrongParentLink);
            continue;
        }

        links.push(BlockLink {
            source_id: source,
            target_id: *id,
        });
        report.links_upserted += 1;
    }

    links
}
