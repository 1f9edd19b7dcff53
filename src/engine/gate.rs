//! Temporal and lineage gating shared by every actor-scoped read.

use crate::state::{Ancestry, NarrativeState};
use crate::types::{StateResult, TakeId};

/// Visibility by narrative time: a data point tagged with moment `M` passes
/// at cutoff `Q` iff `sequence(M) <= sequence(Q)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemporalGate {
    cutoff: f64,
}

impl TemporalGate {
    /// Resolve the cutoff moment. Fails with `NotFound` if it is not
    /// registered.
    pub fn at(state: &NarrativeState, op: &'static str, moment_id: &str) -> StateResult<Self> {
        let moment = state.require_moment(op, moment_id)?;
        Ok(Self {
            cutoff: moment.sequence,
        })
    }

    /// Whether `sequence` is at or before the cutoff.
    pub fn admits_sequence(&self, sequence: f64) -> bool {
        sequence <= self.cutoff
    }

    /// Sequence of `moment_id` if it passes the gate.
    ///
    /// A reference to a deleted moment never passes.
    pub fn admit(&self, state: &NarrativeState, moment_id: &str) -> Option<f64> {
        match state.sequence_of(moment_id) {
            Some(seq) if self.admits_sequence(seq) => Some(seq),
            Some(_) => None,
            None => {
                log::warn!("skipping record tagged with deleted moment '{moment_id}'");
                None
            }
        }
    }
}

/// Combined gate for one query: a cutoff moment plus the visible takes.
#[derive(Debug, Clone)]
pub struct RetrievalScope {
    gate: TemporalGate,
    ancestry: Ancestry,
}

impl RetrievalScope {
    /// Resolve the cutoff moment, then the take's ancestry.
    pub fn resolve(
        state: &NarrativeState,
        op: &'static str,
        moment_id: &str,
        take_id: TakeId,
    ) -> StateResult<Self> {
        let gate = TemporalGate::at(state, op, moment_id)?;
        state.takes().require(op, take_id)?;
        let ancestry = state.ancestry(take_id)?;
        Ok(Self { gate, ancestry })
    }

    /// Sequence of `moment_id` if a record written at that moment in
    /// `take_id` is visible.
    pub fn admit(&self, state: &NarrativeState, moment_id: &str, take_id: TakeId) -> Option<f64> {
        if !self.ancestry.contains(take_id) {
            return None;
        }
        self.gate.admit(state, moment_id)
    }
}
