//! Bulk Import Engine
//!
//! Imports a batch of block records as one unit: validate everything,
//! stage every write, then apply the whole batch in a single transaction.
//! Any recorded problem blocks the apply phase and the report comes back
//! with the problems instead.
//!
//! # Architecture
//!
//! The engine runs fixed phases over the payload, each in its own module:
//!
//! 1. [`payload`]: raw JSON records become typed `PayloadBlock`s
//! 2. [`planner`]: records partition into creates and updates against the
//!    stored state and the principal's mutable set
//! 3. [`cycle`]: the post-import parent map is walked for cycles
//! 4. [`order`]: parents, `childOrder`s, moves and deletions reconcile
//!    into the staged write set
//! 5. [`links`]: link-view blocks stage their edges
//! 6. [`permissions`]: grant arrays collapse into staged upserts
//!
//! Reads happen up front (one projection of every referenced id plus the
//! principal's mutable set); the state observed then is the state the plan
//! is built against. A concurrent writer can invalidate it, in which case
//! the transaction fails, the report carries `exception`, and
//! [`ImportService::import_blocks_with_retry`] re-reads on the next attempt.

mod cycle;
mod links;
mod order;
mod payload;
mod permissions;
mod planner;
mod progress;
mod report;


pub use progress::{ImportState, NoopReporter, ProgressReporter, RecordingReporter};
pub use report::{ImportReport, ProblemCode, ProblemItem};

use crate::db::{BlockStore, ImportPlan};
use crate::models::{Block, UserId};
use crate::services::error::BlockServiceError;
use payload::NormalizedPayload;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Largest batch a single import accepts.
pub const MAX_BLOCKS_DEFAULT: usize = 10_000;

/// Everything the reconciliation phases share for one batch.
pub(crate) struct ImportContext {
    /// The importing user; creates and grants are attributed to them.
    pub principal: UserId,
    pub payload: NormalizedPayload,
    /// Stored blocks for every id the payload references.
    pub existing: HashMap<Uuid, Block>,
    /// The principal's mutable set: block id to stored parent.
    pub allowed: HashMap<Uuid, Option<Uuid>>,
    pub create_ids: BTreeSet<Uuid>,
    pub update_ids: BTreeSet<Uuid>,
    /// Effective parent of each candidate after the batch, filled by the
    /// reconciliation phase.
    pub resolved_parents: HashMap<Uuid, Option<Uuid>>,
}

/// Batch import of block records.
pub struct ImportService {
    store: Arc<dyn BlockStore>,
}

impl ImportService {
    pub fn new(store: Arc<dyn BlockStore>) -> Self {
        Self { store }
    }

    /// Import a batch of raw block records on behalf of `principal`.
    ///
    /// Validation problems never fail the call; they come back in the
    /// report and nothing is written. `Err` is reserved for the store
    /// itself failing.
    pub async fn import_blocks(
        &self,
        records: Vec<Value>,
        principal: UserId,
        progress: &dyn ProgressReporter,
    ) -> Result<ImportReport, BlockServiceError> {
        progress.update(ImportState::Start);
        let mut report = ImportReport::new();

        if records.len() > MAX_BLOCKS_DEFAULT {
            report.batch_error(ProblemCode::TooManyBlocks);
            return Ok(report);
        }

        let payload = payload::normalize(records, &mut report);

        let referenced: Vec<Uuid> = payload.referenced_ids().into_iter().collect();
        let existing = self.store.load_projection(&referenced).await?;
        let allowed = self.store.load_authorized(principal).await?;

        let (create_ids, update_ids) = planner::partition(&payload, &existing, &allowed, &mut report);

        let candidates: BTreeSet<Uuid> = create_ids.union(&update_ids).copied().collect();
        if cycle::detect(&payload, &candidates, &existing, &allowed, &mut report) {
            return Ok(report);
        }

        let mut ctx = ImportContext {
            principal,
            payload,
            existing,
            allowed,
            create_ids,
            update_ids,
            resolved_parents: HashMap::new(),
        };
        let mut plan = ImportPlan::default();
        order::reconcile(&mut ctx, &mut plan, &mut report);
        plan.links = links::resolve(&ctx, &mut report);
        plan.permissions = permissions::collect(&ctx, &mut report);

        progress.update(ImportState::DataPrepared);

        if report.has_problems() {
            tracing::debug!(
                problems = report.problem_blocks.len(),
                "import blocked by validation problems"
            );
            return Ok(report);
        }

        match self.store.apply_import(&plan).await {
            Ok(()) => {
                tracing::info!(
                    created = report.created.len(),
                    updated = report.updated.len(),
                    unchanged = report.unchanged.len(),
                    deleted = report.deleted.len(),
                    "import applied"
                );
                progress.update(ImportState::Success {
                    created: report.created.len(),
                    updated: report.updated.len(),
                    unchanged: report.unchanged.len(),
                    deleted: report.deleted.len(),
                });
            }
            Err(e) => {
                tracing::warn!("import apply failed: {e:#}");
                progress.update(ImportState::Failure {
                    error: e.to_string(),
                });
                report.batch_error(ProblemCode::Exception);
            }
        }

        Ok(report)
    }

    /// Import with automatic retry when the apply transaction fails.
    ///
    /// Each attempt re-reads stored state, so a plan invalidated by a
    /// concurrent writer is rebuilt from scratch. Validation problems are
    /// final and never retried.
    pub async fn import_blocks_with_retry(
        &self,
        records: Vec<Value>,
        principal: UserId,
        progress: &dyn ProgressReporter,
        max_retries: u32,
        delay: Duration,
    ) -> Result<ImportReport, BlockServiceError> {
        let mut attempt: u32 = 0;
        loop {
            let report = self
                .import_blocks(records.clone(), principal, progress)
                .await?;
            if !report.errors.contains(&ProblemCode::Exception) || attempt >= max_retries {
                return Ok(report);
            }
            attempt += 1;
            tracing::warn!(attempt, max_retries, "import apply failed, retrying");
            tokio::time::sleep(delay).await;
        }
    }
}
