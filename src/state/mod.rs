//! In-memory narrative state: the core data structure.

pub mod builder;
pub mod lineage;
pub mod narrative_state;

pub use builder::StateBuilder;
pub use lineage::{Ancestry, TakeForest};
pub use narrative_state::{IdCounters, NarrativeState, StateParts, StateStats};
