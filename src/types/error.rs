//! Error types for the narrative state library.

use thiserror::Error;

/// The kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Moment,
    Take,
    Character,
    Fact,
    Memory,
    CorpusChunk,
}

impl EntityKind {
    /// Return a human-readable name for this entity kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Moment => "moment",
            Self::Take => "take",
            Self::Character => "character",
            Self::Fact => "fact",
            Self::Memory => "memory",
            Self::CorpusChunk => "corpus chunk",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Coarse classification of a [`StateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A referenced record does not exist.
    NotFound,
    /// The caller supplied a value that fails validation.
    InvalidArgument,
    /// A uniqueness or concurrency invariant would be violated.
    Conflict,
    /// Underlying file system failure.
    Io,
    /// A snapshot or config file could not be decoded.
    Format,
}

/// All errors that can occur in the narrative state library.
#[derive(Error, Debug)]
pub enum StateError {
    /// A referenced record does not exist.
    #[error("{op}: {kind} '{id}' not found")]
    NotFound {
        op: &'static str,
        kind: EntityKind,
        id: String,
    },

    /// A supplied value failed validation.
    #[error("{op}: invalid argument: {reason}")]
    InvalidArgument { op: &'static str, reason: String },

    /// A uniqueness invariant would be violated.
    #[error("{op}: conflict: {reason}")]
    Conflict { op: &'static str, reason: String },

    /// Embedding vector dimension mismatch.
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Compression error.
    #[error("Compression error: {0}")]
    Compression(String),

    /// Snapshot payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid magic bytes in snapshot header.
    #[error("Invalid magic bytes in snapshot header")]
    InvalidMagic,

    /// Unsupported snapshot format version.
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u32),

    /// Snapshot is empty or truncated.
    #[error("Snapshot is empty or truncated")]
    Truncated,

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// One item of a non-transactional batch failed; earlier items stay
    /// committed.
    #[error("{op}: item {index} failed: {source}")]
    Batch {
        op: &'static str,
        index: usize,
        source: Box<StateError>,
    },
}

impl StateError {
    /// Build a `NotFound` error for the given operation and record.
    pub fn not_found(op: &'static str, kind: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            op,
            kind,
            id: id.to_string(),
        }
    }

    /// Build an `InvalidArgument` error for the given operation.
    pub fn invalid(op: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            op,
            reason: reason.into(),
        }
    }

    /// Build a `Conflict` error for the given operation.
    pub fn conflict(op: &'static str, reason: impl Into<String>) -> Self {
        Self::Conflict {
            op,
            reason: reason.into(),
        }
    }

    /// Wrap the error of batch item `index`.
    pub fn batch(op: &'static str, index: usize, source: StateError) -> Self {
        Self::Batch {
            op,
            index,
            source: Box::new(source),
        }
    }

    /// Classify this error. Batch errors take the kind of the failed item.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Batch { source, .. } => source.kind(),
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidArgument { .. } | Self::DimensionMismatch { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Io(_) => ErrorKind::Io,
            Self::Compression(_)
            | Self::Serialization(_)
            | Self::InvalidMagic
            | Self::UnsupportedVersion(_)
            | Self::Truncated
            | Self::Config(_) => ErrorKind::Format,
        }
    }
}

/// Convenience result type for narrative state operations.
pub type StateResult<T> = Result<T, StateError>;
