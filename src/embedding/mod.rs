//! Embedding backends: turn text into fixed-length vectors.
//!
//! The engine depends only on [`EmbeddingBackend`]. Model-backed
//! implementations live outside this crate; [`HashEmbedding`] is a
//! deterministic, dependency-free backend for tests and offline use.

pub mod hash;

pub use hash::HashEmbedding;

use crate::config::EmbeddingConfig;
use crate::types::{StateError, StateResult};

/// Capability interface for text embedding.
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a single text.
    fn embed(&self, text: &str) -> StateResult<Vec<f32>>;

    /// Embed several texts. The default embeds them one by one.
    fn embed_batch(&self, texts: &[&str]) -> StateResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Width of every vector this backend produces.
    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingBackend + ?Sized> EmbeddingBackend for Box<T> {
    fn embed(&self, text: &str) -> StateResult<Vec<f32>> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> StateResult<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }
}

/// Create the backend named by `config.provider`.
pub fn backend_from_config(config: &EmbeddingConfig) -> StateResult<Box<dyn EmbeddingBackend>> {
    match config.provider.to_lowercase().as_str() {
        "hash" => Ok(Box::new(HashEmbedding::new(config.dimension))),
        other => Err(StateError::Config(format!(
            "unsupported embedding provider '{other}' (built-in: hash)"
        ))),
    }
}
