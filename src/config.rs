//! Engine configuration with TOML persistence and environment overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::index::IndexKind;
use crate::types::{StateError, StateResult, DEFAULT_DIMENSION};

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Width of every stored vector.
    pub dimension: usize,

    /// Embedding configuration
    pub embedding: EmbeddingConfig,

    /// Retrieval defaults
    pub retrieval: RetrievalConfig,

    /// Vector index configuration
    pub index: IndexConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding provider. Built in: "hash".
    pub provider: String,

    /// Embedding dimension; must equal `EngineConfig::dimension`.
    pub dimension: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Default maximum facts per query.
    pub fact_limit: usize,

    /// Default maximum memories per query.
    pub memory_limit: usize,

    /// Default maximum corpus chunks per query.
    pub corpus_limit: usize,

    /// Similarity searches fetch `limit * candidate_multiplier` neighbours
    /// before post-filtering.
    pub candidate_multiplier: usize,

    /// Lower bound on neighbours fetched before post-filtering.
    pub min_candidates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// "flat" (exact) or "cluster" (approximate).
    pub kind: String,

    /// Clusters probed per query (cluster index only).
    pub probes: usize,

    /// k-means iterations per rebuild (cluster index only).
    pub rebuild_iterations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hash".to_string(),
            dimension: DEFAULT_DIMENSION,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            fact_limit: 50,
            memory_limit: 20,
            corpus_limit: 10,
            candidate_multiplier: 4,
            min_candidates: 20,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            kind: "flat".to_string(),
            probes: 4,
            rebuild_iterations: 10,
        }
    }
}

impl EngineConfig {
    /// Default configuration with every vector width set to `dimension`.
    pub fn with_dimension(dimension: usize) -> Self {
        let mut config = Self::default();
        config.dimension = dimension;
        config.embedding.dimension = dimension;
        config
    }

    /// Load from TOML file
    pub fn load(path: &Path) -> StateResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| StateError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save to TOML file
    pub fn save(&self, path: &Path) -> StateResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| StateError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Override fields from `NSTATE_*` environment variables.
    pub fn apply_env(&mut self) -> StateResult<()> {
        if let Some(dim) = env_parse::<usize>("NSTATE_DIMENSION")? {
            self.dimension = dim;
            self.embedding.dimension = dim;
        }
        if let Ok(provider) = std::env::var("NSTATE_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }
        if let Ok(kind) = std::env::var("NSTATE_INDEX_KIND") {
            self.index.kind = kind;
        }
        if let Some(mult) = env_parse::<usize>("NSTATE_CANDIDATE_MULTIPLIER")? {
            self.retrieval.candidate_multiplier = mult;
        }
        Ok(())
    }

    /// Check internal consistency.
    pub fn validate(&self) -> StateResult<()> {
        if self.dimension == 0 {
            return Err(StateError::Config("dimension must be positive".into()));
        }
        if self.embedding.dimension != self.dimension {
            return Err(StateError::Config(format!(
                "embedding dimension {} does not match engine dimension {}",
                self.embedding.dimension, self.dimension
            )));
        }
        if self.retrieval.candidate_multiplier == 0 {
            return Err(StateError::Config(
                "candidate_multiplier must be at least 1".into(),
            ));
        }
        self.index_kind()?;
        Ok(())
    }

    /// The vector index implementation selected by `index.kind`.
    pub fn index_kind(&self) -> StateResult<IndexKind> {
        match self.index.kind.to_lowercase().as_str() {
            "flat" => Ok(IndexKind::Flat),
            "cluster" => Ok(IndexKind::Cluster {
                probes: self.index.probes,
                max_iterations: self.index.rebuild_iterations,
            }),
            other => Err(StateError::Config(format!("unknown index kind '{other}'"))),
        }
    }

    /// How many neighbours to request from an index for `limit` results.
    pub fn candidate_count(&self, limit: usize) -> usize {
        self.retrieval.candidate_count(limit)
    }
}

impl RetrievalConfig {
    /// How many neighbours to request from an index for `limit` results.
    pub fn candidate_count(&self, limit: usize) -> usize {
        limit
            .saturating_mul(self.candidate_multiplier)
            .max(self.min_candidates)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> StateResult<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| StateError::Config(format!("{name}: cannot parse '{raw}'"))),
        Err(_) => Ok(None),
    }
}
