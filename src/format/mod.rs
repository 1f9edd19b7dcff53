//! Binary file I/O for .nstate snapshots.

pub mod compression;
pub mod reader;
pub mod writer;

pub use reader::SnapshotReader;
pub use writer::SnapshotWriter;
