//! Permission Model
//!
//! Per-user permission grants on blocks. A grant is unique per
//! `(block, user)` pair; later grants replace earlier ones.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Numeric user identity, assigned by the (out of scope) auth layer.
pub type UserId = i64;

/// Permission granted to every block creator.
pub const DEFAULT_CREATOR_PERMISSION: PermissionLevel = PermissionLevel::Delete;

/// Permission level on a block.
///
/// `Edit`, `EditAc` and `Delete` authorize mutation through the import
/// engine; `Delete` and `EditAc` additionally authorize permission changes
/// and destructive operations. `Deny` overrides inherited visibility and is
/// never accepted in an import payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    View,
    Edit,
    EditAc,
    Delete,
    Deny,
}

impl PermissionLevel {
    /// Whether a holder of this level may mutate the block.
    pub fn authorizes_mutation(self) -> bool {
        matches!(self, Self::Edit | Self::EditAc | Self::Delete)
    }

    /// Whether this level may appear in an import payload grant.
    pub fn import_grantable(self) -> bool {
        matches!(self, Self::View | Self::Edit | Self::EditAc | Self::Delete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::EditAc => "edit_ac",
            Self::Delete => "delete",
            Self::Deny => "deny",
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Self::View),
            "edit" => Ok(Self::Edit),
            "edit_ac" => Ok(Self::EditAc),
            "delete" => Ok(Self::Delete),
            "deny" => Ok(Self::Deny),
            other => Err(format!("unknown permission level: {other}")),
        }
    }
}

/// A stored permission grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPermission {
    pub block_id: Uuid,
    pub user_id: UserId,
    pub permission: PermissionLevel,
}
