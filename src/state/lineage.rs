//! Take lineage: the branch forest as an arena of take records.

use std::collections::HashSet;

use crate::types::{now_micros, EntityKind, StateError, StateResult, Take, TakeId, TakeStatus};

/// The set of takes whose writes are visible from one take: the take itself
/// plus every ancestor up to its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ancestry {
    /// From the queried take up to the root.
    chain: Vec<TakeId>,
    members: HashSet<TakeId>,
}

impl Ancestry {
    /// Whether writes made in `take_id` are visible.
    pub fn contains(&self, take_id: TakeId) -> bool {
        self.members.contains(&take_id)
    }

    /// The chain from the queried take to its root.
    pub fn chain(&self) -> &[TakeId] {
        &self.chain
    }

    /// The root take of the chain.
    pub fn root(&self) -> TakeId {
        // A chain always holds at least the queried take.
        self.chain[self.chain.len() - 1]
    }

    /// Number of takes in the chain.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Whether the chain is empty. Never true for a resolved ancestry.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

/// Arena of takes indexed by id. A take's parent must exist when the take
/// is created, so parents always have smaller ids and the forest is acyclic.
pub struct TakeForest {
    /// `takes[i].id == i + 1`.
    takes: Vec<Take>,
}

impl TakeForest {
    /// Create an empty forest.
    pub fn new() -> Self {
        Self { takes: Vec::new() }
    }

    /// Rebuild a forest from stored takes, checking arena invariants.
    pub fn from_takes(mut takes: Vec<Take>) -> StateResult<Self> {
        takes.sort_by_key(|t| t.id);
        for (i, take) in takes.iter().enumerate() {
            if take.id != i as TakeId + 1 {
                return Err(StateError::Serialization(format!(
                    "take ids are not contiguous at {}",
                    take.id
                )));
            }
            if let Some(parent) = take.parent_take_id {
                if parent >= take.id {
                    return Err(StateError::Serialization(format!(
                        "take {} has parent {} that does not precede it",
                        take.id, parent
                    )));
                }
            }
        }
        Ok(Self { takes })
    }

    /// Number of takes.
    pub fn len(&self) -> usize {
        self.takes.len()
    }

    /// Whether no take exists yet.
    pub fn is_empty(&self) -> bool {
        self.takes.is_empty()
    }

    /// All takes in id order.
    pub fn takes(&self) -> &[Take] {
        &self.takes
    }

    /// Get a take by id.
    pub fn get(&self, id: TakeId) -> Option<&Take> {
        let idx = (id as usize).checked_sub(1)?;
        self.takes.get(idx)
    }

    fn get_mut(&mut self, id: TakeId) -> Option<&mut Take> {
        let idx = (id as usize).checked_sub(1)?;
        self.takes.get_mut(idx)
    }

    /// Get a take by id, failing with `NotFound` for `op`.
    pub fn require(&self, op: &'static str, id: TakeId) -> StateResult<&Take> {
        self.get(id)
            .ok_or_else(|| StateError::not_found(op, EntityKind::Take, id))
    }

    /// Allocate a new take. `parent` must already exist.
    pub fn create(
        &mut self,
        parent: Option<TakeId>,
        branch_point: Option<String>,
        notes: Option<String>,
    ) -> StateResult<TakeId> {
        if let Some(parent_id) = parent {
            self.require("create_take", parent_id)?;
        }
        let id = self.takes.len() as TakeId + 1;
        self.takes.push(Take {
            id,
            parent_take_id: parent,
            branch_point,
            status: TakeStatus::Active,
            notes,
            created_at: now_micros(),
        });
        Ok(id)
    }

    /// Change a take's status.
    pub fn set_status(&mut self, id: TakeId, status: TakeStatus) -> StateResult<()> {
        let take = self
            .get_mut(id)
            .ok_or_else(|| StateError::not_found("set_take_status", EntityKind::Take, id))?;
        take.status = status;
        Ok(())
    }

    /// Walk parent links from `id` to its root.
    pub fn ancestry(&self, id: TakeId) -> StateResult<Ancestry> {
        let mut chain = Vec::new();
        let mut members = HashSet::new();
        let mut current = Some(self.require("get_ancestry", id)?);

        while let Some(take) = current {
            if !members.insert(take.id) {
                // Unreachable for arena-built forests; stop rather than loop.
                break;
            }
            chain.push(take.id);
            current = match take.parent_take_id {
                Some(parent) => Some(self.require("get_ancestry", parent)?),
                None => None,
            };
        }

        Ok(Ancestry { chain, members })
    }

    /// Direct children of a take, ascending by id.
    pub fn children(&self, id: TakeId) -> Vec<TakeId> {
        self.takes
            .iter()
            .filter(|t| t.parent_take_id == Some(id))
            .map(|t| t.id)
            .collect()
    }

    /// Takes matching optional status and branch point filters.
    pub fn list(&self, status: Option<TakeStatus>, branch_point: Option<&str>) -> Vec<&Take> {
        self.takes
            .iter()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .filter(|t| branch_point.map_or(true, |bp| t.branch_point.as_deref() == Some(bp)))
            .collect()
    }
}

impl Default for TakeForest {
    fn default() -> Self {
        Self::new()
    }
}
