//! Characters and the per-query knowledge snapshot.

use serde::{Deserialize, Serialize};

use super::{CorpusChunk, KnownFact, Memory, Metadata, TakeId};

/// A registered actor. `traits` and `voice` are static configuration
/// copied unchanged into every [`CharacterState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub traits: Metadata,
    #[serde(default)]
    pub voice: Metadata,
}

impl Character {
    /// Create a character with empty traits and voice.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            traits: Metadata::new(),
            voice: Metadata::new(),
        }
    }

    /// Set personality traits.
    pub fn with_traits(mut self, traits: Metadata) -> Self {
        self.traits = traits;
        self
    }

    /// Set speech patterns.
    pub fn with_voice(mut self, voice: Metadata) -> Self {
        self.voice = voice;
        self
    }
}

/// Everything one character knows and has experienced at one moment on one
/// take. Rebuilt per query, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterState {
    pub character_id: String,
    pub moment_id: String,
    pub take_id: TakeId,
    pub facts: Vec<KnownFact>,
    pub memories: Vec<Memory>,
    pub corpus: Vec<CorpusChunk>,
    pub traits: Metadata,
    pub voice: Metadata,
}
