//! Fluent API for building NarrativeState instances.

use crate::index::IndexKind;
use crate::types::{Character, Moment, StateResult, TakeId, TakeStatus, DEFAULT_DIMENSION};

use super::NarrativeState;

struct PendingTake {
    parent: Option<TakeId>,
    branch_point: Option<String>,
    status: TakeStatus,
    notes: Option<String>,
}

/// Fluent builder for the static skeleton of a story: moments, characters
/// and the take forest.
pub struct StateBuilder {
    dimension: usize,
    index_kind: IndexKind,
    moments: Vec<Moment>,
    characters: Vec<Character>,
    takes: Vec<PendingTake>,
}

impl StateBuilder {
    /// Create a new builder with the default dimension.
    pub fn new() -> Self {
        Self::with_dimension(DEFAULT_DIMENSION)
    }

    /// Create a new builder with a specific dimension.
    pub fn with_dimension(dim: usize) -> Self {
        Self {
            dimension: dim,
            index_kind: IndexKind::Flat,
            moments: Vec::new(),
            characters: Vec::new(),
            takes: Vec::new(),
        }
    }

    /// Use a specific vector index implementation.
    pub fn index_kind(&mut self, kind: IndexKind) -> &mut Self {
        self.index_kind = kind;
        self
    }

    /// Add a moment.
    pub fn moment(&mut self, id: &str, sequence: f64) -> &mut Self {
        self.moments.push(Moment::new(id, sequence));
        self
    }

    /// Add a character.
    pub fn character(&mut self, id: &str, name: &str) -> &mut Self {
        self.characters.push(Character::new(id, name));
        self
    }

    /// Add a root take. Returns the id it will receive.
    pub fn root_take(&mut self) -> TakeId {
        self.push_take(None, None, TakeStatus::Active)
    }

    /// Add a trunk root take. Returns the id it will receive.
    pub fn trunk(&mut self) -> TakeId {
        self.push_take(None, None, TakeStatus::Trunk)
    }

    /// Add a child take of `parent` diverging at `branch_point`.
    /// Returns the id it will receive.
    pub fn branch(&mut self, parent: TakeId, branch_point: &str) -> TakeId {
        self.push_take(Some(parent), Some(branch_point.to_string()), TakeStatus::Active)
    }

    fn push_take(
        &mut self,
        parent: Option<TakeId>,
        branch_point: Option<String>,
        status: TakeStatus,
    ) -> TakeId {
        self.takes.push(PendingTake {
            parent,
            branch_point,
            status,
            notes: None,
        });
        self.takes.len() as TakeId
    }

    /// Attach notes to the most recently added take.
    pub fn notes(&mut self, notes: &str) -> &mut Self {
        if let Some(take) = self.takes.last_mut() {
            take.notes = Some(notes.to_string());
        }
        self
    }

    /// Build the final NarrativeState. Moments are added before takes, so
    /// branch points may name any moment added to the builder.
    pub fn build(self) -> StateResult<NarrativeState> {
        let mut state = NarrativeState::new(self.dimension, self.index_kind);
        for moment in self.moments {
            state.add_moment(moment)?;
        }
        for character in self.characters {
            state.add_character(character)?;
        }
        for take in self.takes {
            let id = state.add_take(take.parent, take.branch_point, take.notes)?;
            if take.status != TakeStatus::Active {
                state.set_take_status(id, take.status)?;
            }
        }
        Ok(state)
    }
}

impl Default for StateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
