//! Facts and the knowledge events that gate them.

use serde::{Deserialize, Serialize};

use super::TakeId;

/// System-assigned fact identifier.
pub type FactId = u64;

/// An immutable world-truth, independent of who knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub id: FactId,
    pub content: String,
    /// Free-form tag.
    pub category: String,
    /// Moment id at which the truth came into existence in-world.
    pub created_at: String,
}

/// How a character came to know a fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeSource {
    /// Saw it happen.
    Witnessed,
    /// Someone said so.
    Told,
    /// Worked it out.
    Inferred,
    /// Found evidence.
    Discovered,
}

impl KnowledgeSource {
    /// Return a human-readable name for this source.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Witnessed => "witnessed",
            Self::Told => "told",
            Self::Inferred => "inferred",
            Self::Discovered => "discovered",
        }
    }

    /// Parse a source from its name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "witnessed" => Some(Self::Witnessed),
            "told" => Some(Self::Told),
            "inferred" => Some(Self::Inferred),
            "discovered" => Some(Self::Discovered),
            _ => None,
        }
    }
}

impl std::fmt::Display for KnowledgeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Input for logging one fact.
#[derive(Debug, Clone)]
pub struct NewFact {
    pub content: String,
    pub category: String,
    /// Moment at which the truth came into existence.
    pub moment_id: String,
}

impl NewFact {
    /// Create a fact input.
    pub fn new(
        content: impl Into<String>,
        category: impl Into<String>,
        moment_id: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            category: category.into(),
            moment_id: moment_id.into(),
        }
    }
}

/// Record that one character learned one fact, at a moment, in a take.
///
/// No uniqueness constraint: the same character may learn the same fact
/// many times, in the same or different takes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEvent {
    pub id: u64,
    pub character_id: String,
    pub fact_id: FactId,
    pub moment_id: String,
    pub take_id: TakeId,
    pub source: Option<KnowledgeSource>,
}

/// Input for logging a knowledge event.
#[derive(Debug, Clone)]
pub struct NewKnowledge {
    pub character_id: String,
    pub fact_id: FactId,
    pub moment_id: String,
    pub take_id: TakeId,
    pub source: Option<KnowledgeSource>,
}

impl NewKnowledge {
    /// Create a knowledge input with no source.
    pub fn new(
        character_id: impl Into<String>,
        fact_id: FactId,
        moment_id: impl Into<String>,
        take_id: TakeId,
    ) -> Self {
        Self {
            character_id: character_id.into(),
            fact_id,
            moment_id: moment_id.into(),
            take_id,
            source: None,
        }
    }

    /// Set how the fact was learned.
    pub fn source(mut self, source: KnowledgeSource) -> Self {
        self.source = Some(source);
        self
    }
}

/// A fact as seen by one character: carries the qualifying knowledge event's
/// source and learning moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownFact {
    pub id: FactId,
    pub content: String,
    pub category: String,
    pub source: Option<KnowledgeSource>,
    /// Moment at which the character learned it.
    pub moment_id: String,
}

impl KnownFact {
    pub(crate) fn from_event(fact: &Fact, event: &KnowledgeEvent) -> Self {
        Self {
            id: fact.id,
            content: fact.content.clone(),
            category: fact.category.clone(),
            source: event.source,
            moment_id: event.moment_id.clone(),
        }
    }
}
