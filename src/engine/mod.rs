//! High-level operations: gating, query engine, write engine and the
//! thread-safe facade over them.

pub mod chunker;
pub mod gate;
pub mod narrative;
pub mod query;
pub mod write;

pub use chunker::{DocumentChunker, ParagraphChunker};
pub use gate::{RetrievalScope, TemporalGate};
pub use narrative::{parse_source, NarrativeEngine};
pub use query::{MemoryQuery, QueryEngine, QueryRequest};
pub use write::WriteEngine;
