//! NarrativeState: branch-aware, time-gated knowledge for the characters of
//! a branching narrative.
//!
//! Records (facts, knowledge events, memories) are tagged with a moment and
//! a take. A query for one character at one moment on one take sees only
//! records written at or before that moment, in that take or one of its
//! ancestors. Shared corpus text is visible to every query.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod format;
pub mod index;
pub mod state;
pub mod types;

// Re-export commonly used types at the crate root
pub use config::EngineConfig;
pub use embedding::{EmbeddingBackend, HashEmbedding};
pub use engine::{
    DocumentChunker, MemoryQuery, NarrativeEngine, ParagraphChunker, QueryEngine, QueryRequest,
    WriteEngine,
};
pub use format::{SnapshotReader, SnapshotWriter};
pub use index::{cosine_similarity, FlatIndex, IndexKind, VectorIndex};
pub use state::{Ancestry, NarrativeState, StateBuilder, StateStats};
pub use types::{
    Character, CharacterState, ChunkType, CorpusChunk, CorpusFilter, DialogueLine,
    DialogueReceipt, ErrorKind, Fact, KnowledgeSource, KnownFact, Memory, Moment, MomentUpdate,
    NewCorpusChunk, NewFact, NewKnowledge, NewMemory, StateError, StateResult, Take, TakeStatus,
    DEFAULT_DIMENSION,
};
