//! Index structures for fast lookup. Each index is independent and incrementally updateable.

pub mod cluster_index;
pub mod moment_index;
pub mod owner_index;
pub mod vector_index;

pub use cluster_index::ClusterIndex;
pub use moment_index::MomentIndex;
pub use owner_index::OwnerIndex;
pub use vector_index::{
    cosine_distance, cosine_similarity, FlatIndex, IndexKind, Neighbor, VectorIndex,
};

pub(crate) use vector_index::check_dimension;
