//! Experiential memory chunks, owned by exactly one character.

use serde::{Deserialize, Serialize};

use super::{Metadata, TakeId};

/// System-assigned memory identifier.
pub type MemoryId = u64;

/// Tag key marking a soft-deleted memory.
pub const ARCHIVED_TAG: &str = "archived";

/// Tag key pointing at the memory that replaced this one.
pub const SUPERSEDED_BY_TAG: &str = "superseded_by";

/// What kind of experience a memory chunk records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChunkType {
    /// Something the owner said.
    Said,
    /// Something the owner heard.
    Heard,
    /// A private thought.
    Internal,
    /// Something the owner noticed.
    Perceived,
    /// Something the owner did.
    Action,
    /// Any caller-defined kind.
    Other(String),
}

impl ChunkType {
    /// Return the name of this chunk type.
    pub fn name(&self) -> &str {
        match self {
            Self::Said => "said",
            Self::Heard => "heard",
            Self::Internal => "internal",
            Self::Perceived => "perceived",
            Self::Action => "action",
            Self::Other(name) => name,
        }
    }

    /// Parse a chunk type; unknown names become `Other`.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "said" => Self::Said,
            "heard" => Self::Heard,
            "internal" => Self::Internal,
            "perceived" => Self::Perceived,
            "action" => Self::Action,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ChunkType {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<ChunkType> for String {
    fn from(chunk_type: ChunkType) -> Self {
        chunk_type.name().to_string()
    }
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An experiential chunk tied to one character.
///
/// The embedding lives in the owner's vector index, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    pub character_id: String,
    pub chunk: String,
    pub chunk_type: ChunkType,
    pub moment_id: String,
    pub take_id: TakeId,
    #[serde(default)]
    pub tags: Metadata,
}

impl Memory {
    /// Whether this memory carries `archived: true`.
    pub fn is_archived(&self) -> bool {
        self.tags
            .get(ARCHIVED_TAG)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// The memory that replaced this one, if recorded.
    pub fn superseded_by(&self) -> Option<MemoryId> {
        self.tags.get(SUPERSEDED_BY_TAG).and_then(|v| v.as_u64())
    }
}

/// Input for writing one memory.
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub character_id: String,
    pub chunk: String,
    pub chunk_type: ChunkType,
    pub moment_id: String,
    pub take_id: TakeId,
    pub tags: Metadata,
}

impl NewMemory {
    /// Create a memory input with empty tags.
    pub fn new(
        character_id: impl Into<String>,
        chunk: impl Into<String>,
        chunk_type: ChunkType,
        moment_id: impl Into<String>,
        take_id: TakeId,
    ) -> Self {
        Self {
            character_id: character_id.into(),
            chunk: chunk.into(),
            chunk_type,
            moment_id: moment_id.into(),
            take_id,
            tags: Metadata::new(),
        }
    }

    /// Set the tag bag.
    pub fn tags(mut self, tags: Metadata) -> Self {
        self.tags = tags;
        self
    }
}

/// One line of dialogue: the speaker remembers saying it, each listener
/// remembers hearing it, each in a separate memory.
#[derive(Debug, Clone)]
pub struct DialogueLine {
    pub speaker: String,
    pub content: String,
    pub moment_id: String,
    pub take_id: TakeId,
    pub listeners: Vec<String>,
    pub speaker_tags: Metadata,
    pub listener_tags: Metadata,
}

impl DialogueLine {
    /// Create a line with no listeners.
    pub fn new(
        speaker: impl Into<String>,
        content: impl Into<String>,
        moment_id: impl Into<String>,
        take_id: TakeId,
    ) -> Self {
        Self {
            speaker: speaker.into(),
            content: content.into(),
            moment_id: moment_id.into(),
            take_id,
            listeners: Vec::new(),
            speaker_tags: Metadata::new(),
            listener_tags: Metadata::new(),
        }
    }

    /// Add a listener.
    pub fn heard_by(mut self, listener: impl Into<String>) -> Self {
        self.listeners.push(listener.into());
        self
    }

    /// Set the tags applied to the speaker's memory.
    pub fn speaker_tags(mut self, tags: Metadata) -> Self {
        self.speaker_tags = tags;
        self
    }

    /// Set the tags applied to every listener's memory.
    pub fn listener_tags(mut self, tags: Metadata) -> Self {
        self.listener_tags = tags;
        self
    }
}

/// Ids written by a dialogue call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogueReceipt {
    pub speaker_memory_id: MemoryId,
    pub listener_memory_ids: Vec<MemoryId>,
}
