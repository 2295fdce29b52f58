//! Service Layer
//!
//! Business logic over the storage layer: the bulk import engine and the
//! subtree exporter. Services hold an `Arc<dyn BlockStore>` and never talk
//! SQL themselves.

pub mod error;
pub mod export;
pub mod import;

pub use error::BlockServiceError;
pub use export::{remap_ids, ExportService, EXPORT_MAX_DEPTH};
pub use import::{
    ImportReport, ImportService, ImportState, NoopReporter, ProblemCode, ProblemItem,
    ProgressReporter, RecordingReporter, MAX_BLOCKS_DEFAULT,
};
