//! Shared reference material, visible to every query.

use serde::{Deserialize, Serialize};

use super::Metadata;

/// A chunk of shared reference text (lore, rules, prior drafts).
///
/// Not scoped to a character, take or moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusChunk {
    /// Assigned in load order; higher ids were loaded later.
    pub id: u64,
    pub content: String,
    pub source: String,
    pub section: Option<String>,
    pub category: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Input for loading one corpus chunk.
#[derive(Debug, Clone, Default)]
pub struct NewCorpusChunk {
    pub content: String,
    pub source: String,
    pub section: Option<String>,
    pub category: Option<String>,
    pub version: Option<String>,
    pub metadata: Metadata,
}

impl NewCorpusChunk {
    /// Create a chunk input with only content and source set.
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    /// Set the section.
    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// Set the category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Equality filters over corpus provenance. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusFilter {
    pub source: Option<String>,
    pub category: Option<String>,
    pub version: Option<String>,
}

impl CorpusFilter {
    /// A filter that matches every chunk.
    pub fn any() -> Self {
        Self::default()
    }

    /// Restrict to one source.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Restrict to one category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Restrict to one version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Whether the chunk passes every set filter.
    pub fn matches(&self, chunk: &CorpusChunk) -> bool {
        if let Some(source) = &self.source {
            if &chunk.source != source {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if chunk.category.as_ref() != Some(category) {
                return false;
            }
        }
        if let Some(version) = &self.version {
            if chunk.version.as_ref() != Some(version) {
                return false;
            }
        }
        true
    }
}
