//! Import Report
//!
//! The accumulating result of an import batch. Validation problems never
//! raise; they are recorded here as `(block id, code)` pairs and the
//! presence of any problem blocks the apply phase.

use crate::models::{PermissionLevel, UserId};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Problem codes recorded during import validation and apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProblemCode {
    /// A record id (or parent id) is not a parsable UUID
    #[serde(rename = "not_valid_uuid")]
    NotValidUuid,
    /// The same id appears more than once in the payload
    #[serde(rename = "duplicate_id")]
    DuplicateId,
    /// The principal holds no mutating permission on an existing block
    #[serde(rename = "forbidden")]
    Forbidden,
    /// Applying the payload would create a parent cycle
    #[serde(rename = "cycle_detected")]
    CycleDetected,
    /// A declared parent is neither in the payload nor mutable by the principal
    #[serde(rename = "not_found_parent")]
    NotFoundParent,
    /// A `parent_id` value is present but is not a string
    #[serde(rename = "not_valid_parent_uuid")]
    NotValidParentUuid,
    /// A record carries an unknown key or a value of the wrong shape
    #[serde(rename = "not_valid_field")]
    NotValidField,
    /// A `childOrder` is not a list, holds a non-UUID entry, or lists a
    /// payload block whose parent does not match
    #[serde(rename = "not_valid_childOrder")]
    NotValidChildOrder,
    /// A `childOrder` entry names a block that cannot be attached
    #[serde(rename = "not_found_child")]
    NotFoundChild,
    /// A link block has no `source`
    #[serde(rename = "not_valid_link")]
    NotValidLink,
    /// A link `source` is not a parsable UUID
    #[serde(rename = "not_valid_source_uuid")]
    NotValidSourceUuid,
    /// A link `source` is neither created in this batch nor mutable
    #[serde(rename = "not_allowed_link")]
    NotAllowedLink,
    /// A link block would end up with no parent
    #[serde(rename = "not_link_parent")]
    NotLinkParent,
    /// A link block points at its own parent
    #[serde(rename = "wrong_parent_link")]
    WrongParentLink,
    /// A permission grant is not an object with exactly user_id and permission
    #[serde(rename = "not_valid_permission")]
    NotValidPermission,
    /// A permission grant carries an unknown or ungrantable level
    #[serde(rename = "not_valid_permission_field")]
    NotValidPermissionField,
    /// A planned create has no payload record (internal inconsistency guard)
    #[serde(rename = "payload_missing")]
    PayloadMissing,
    /// The payload exceeds the batch size limit
    #[serde(rename = "too_many_blocks")]
    TooManyBlocks,
    /// The apply phase failed and was rolled back
    #[serde(rename = "exception")]
    Exception,
}

impl ProblemCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotValidUuid => "not_valid_uuid",
            Self::DuplicateId => "duplicate_id",
            Self::Forbidden => "forbidden",
            Self::CycleDetected => "cycle_detected",
            Self::NotFoundParent => "not_found_parent",
            Self::NotValidParentUuid => "not_valid_parent_uuid",
            Self::NotValidField => "not_valid_field",
            Self::NotValidChildOrder => "not_valid_childOrder",
            Self::NotFoundChild => "not_found_child",
            Self::NotValidLink => "not_valid_link",
            Self::NotValidSourceUuid => "not_valid_source_uuid",
            Self::NotAllowedLink => "not_allowed_link",
            Self::NotLinkParent => "not_link_parent",
            Self::WrongParentLink => "wrong_parent_link",
            Self::NotValidPermission => "not_valid_permission",
            Self::NotValidPermissionField => "not_valid_permission_field",
            Self::PayloadMissing => "payload_missing",
            Self::TooManyBlocks => "too_many_blocks",
            Self::Exception => "exception",
        }
    }
}

impl fmt::Display for ProblemCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded problem: the offending block id (or raw id string for
/// records that never parsed) and the problem code.
///
/// Serialized as a single-entry map, `{"<block id>": "<code>"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemItem {
    pub block_id: String,
    pub code: ProblemCode,
}

impl Serialize for ProblemItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.block_id, &self.code)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ProblemItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ItemVisitor;

        impl<'de> Visitor<'de> for ItemVisitor {
            type Value = ProblemItem;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a single-entry map of block id to problem code")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let (block_id, code) = map
                    .next_entry::<String, ProblemCode>()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                Ok(ProblemItem { block_id, code })
            }
        }

        deserializer.deserialize_map(ItemVisitor)
    }
}

/// The accumulated outcome of one import batch.
///
/// Id sets are ordered so reports serialize deterministically. A block id
/// appears in at most one of `created`/`updated`/`unchanged`; `deleted` holds
/// the directly scheduled deletions (cascaded descendants are not listed).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub created: BTreeSet<Uuid>,
    pub updated: BTreeSet<Uuid>,
    pub unchanged: BTreeSet<Uuid>,
    pub deleted: BTreeSet<Uuid>,
    /// Collapsed permission grants staged for upsert, as user id to
    /// permission level to the block ids receiving that grant
    pub permissions_upserted: BTreeMap<UserId, BTreeMap<PermissionLevel, BTreeSet<Uuid>>>,
    /// Number of link edges staged for upsert
    pub links_upserted: u64,
    /// The distinct problem codes recorded
    pub errors: BTreeSet<ProblemCode>,
    /// Every recorded problem, in recording order
    pub problem_blocks: Vec<ProblemItem>,
}

impl ImportReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem against a block id (or raw id string).
    pub fn problem(&mut self, block_id: impl Into<String>, code: ProblemCode) {
        self.errors.insert(code);
        self.problem_blocks.push(ProblemItem {
            block_id: block_id.into(),
            code,
        });
    }

    /// Record a batch-level error with no specific block.
    pub fn batch_error(&mut self, code: ProblemCode) {
        self.errors.insert(code);
    }

    /// Whether any recorded problem blocks the apply phase.
    pub fn has_problems(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Move a block into `updated`, removing it from `unchanged` if present.
    pub fn mark_updated(&mut self, id: Uuid) {
        self.unchanged.remove(&id);
        self.updated.insert(id);
    }

    /// Record a staged permission grant.
    pub fn record_grant(&mut self, user_id: UserId, permission: PermissionLevel, block_id: Uuid) {
        self.permissions_upserted
            .entry(user_id)
            .or_default()
            .entry(permission)
            .or_default()
            .insert(block_id);
    }
}
