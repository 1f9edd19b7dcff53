//! All data types for the narrative state library.

pub mod character;
pub mod corpus;
pub mod error;
pub mod fact;
pub mod header;
pub mod memory;
pub mod moment;
pub mod take;

pub use character::{Character, CharacterState};
pub use corpus::{CorpusChunk, CorpusFilter, NewCorpusChunk};
pub use error::{EntityKind, ErrorKind, StateError, StateResult};
pub use fact::{Fact, FactId, KnowledgeEvent, KnowledgeSource, KnownFact, NewFact, NewKnowledge};
pub use header::{SnapshotHeader, HEADER_SIZE};
pub use memory::{ChunkType, DialogueLine, DialogueReceipt, Memory, MemoryId, NewMemory};
pub use moment::{Moment, MomentUpdate};
pub use take::{Take, TakeId, TakeStatus};

/// Opaque key-value bag used for metadata, tags, traits and voice.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Magic bytes at the start of every .nstate snapshot.
pub const SNAPSHOT_MAGIC: [u8; 4] = [0x4E, 0x53, 0x54, 0x41]; // "NSTA"

/// Current snapshot format version.
pub const FORMAT_VERSION: u32 = 1;

/// Default embedding dimensionality.
pub const DEFAULT_DIMENSION: usize = 384;

/// Maximum text size of a fact, memory chunk or corpus chunk: 64KB.
pub const MAX_CHUNK_SIZE: usize = 65_536;

/// Returns the current time as Unix epoch microseconds.
pub fn now_micros() -> u64 {
    chrono::Utc::now().timestamp_micros() as u64
}
