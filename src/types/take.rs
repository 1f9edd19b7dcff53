//! Takes: branches of narrative history.

use serde::{Deserialize, Serialize};

/// System-assigned take identifier. Allocation starts at 1 and only grows.
pub type TakeId = u64;

/// Lifecycle status of a take. Takes are archived, never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TakeStatus {
    /// A live branch.
    Active,
    /// A branch kept for reference only.
    Archived,
    /// The canonical line.
    Trunk,
}

impl TakeStatus {
    /// Return a human-readable name for this status.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Trunk => "trunk",
        }
    }

    /// Parse a status from its name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            "trunk" => Some(Self::Trunk),
            _ => None,
        }
    }
}

impl std::fmt::Display for TakeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A node in the branch forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Take {
    pub id: TakeId,
    /// `None` marks a root.
    pub parent_take_id: Option<TakeId>,
    /// Moment where this branch diverges. Informational only.
    pub branch_point: Option<String>,
    pub status: TakeStatus,
    pub notes: Option<String>,
    /// Wall-clock creation time (Unix epoch microseconds).
    pub created_at: u64,
}

impl Take {
    /// Whether this take has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_take_id.is_none()
    }
}
