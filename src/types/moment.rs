//! Moments: named, totally ordered points in narrative time.

use serde::{Deserialize, Serialize};

use super::Metadata;
use crate::types::error::{StateError, StateResult};

/// A named point in narrative time.
///
/// `sequence` is the only meaningful ordering. It may be fractional so a
/// moment can be slotted between two existing ones without renumbering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Moment {
    /// Opaque handle used by every other record.
    pub id: String,
    /// Position in narrative time; unique across all moments.
    pub sequence: f64,
    /// Optional display text.
    pub label: Option<String>,
    /// Opaque key-value bag.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Moment {
    /// Create a moment with no label or metadata.
    pub fn new(id: impl Into<String>, sequence: f64) -> Self {
        Self {
            id: id.into(),
            sequence: sequence + 0.0,
            label: None,
            metadata: Metadata::new(),
        }
    }

    /// Set the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the metadata bag.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Validate id and sequence.
    pub fn validate(&self, op: &'static str) -> StateResult<()> {
        if self.id.trim().is_empty() {
            return Err(StateError::invalid(op, "moment id must not be empty"));
        }
        validate_sequence(op, self.sequence)
    }
}

/// Partial update of a moment. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct MomentUpdate {
    pub sequence: Option<f64>,
    pub label: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Reject sequences that cannot be totally ordered.
pub(crate) fn validate_sequence(op: &'static str, sequence: f64) -> StateResult<()> {
    if !sequence.is_finite() {
        return Err(StateError::invalid(
            op,
            format!("moment sequence must be finite, got {sequence}"),
        ));
    }
    Ok(())
}
