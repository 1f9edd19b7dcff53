//! Writes .nstate snapshot files from in-memory state.

use std::io::Write;
use std::path::Path;

use crate::state::NarrativeState;
use crate::types::error::{StateError, StateResult};
use crate::types::header::SnapshotHeader;

use super::compression::compress_payload;

/// Writer for .nstate snapshot files.
pub struct SnapshotWriter {
    dimension: usize,
}

impl SnapshotWriter {
    /// Create a new writer with the given vector dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Write a complete state to an .nstate file.
    ///
    /// The snapshot is written to a sibling temporary file and renamed into
    /// place, so readers never observe a partial file.
    pub fn write_to_file(&self, state: &NarrativeState, path: &Path) -> StateResult<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);
        {
            let file = std::fs::File::create(&tmp)?;
            let mut writer = std::io::BufWriter::new(file);
            self.write_to(state, &mut writer)?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Write a complete state to any writer.
    pub fn write_to(&self, state: &NarrativeState, writer: &mut impl Write) -> StateResult<()> {
        let (parts, memory_vectors, corpus_vectors) = state.to_parts();

        // Step 1: Encode and compress the record payload
        let json = serde_json::to_vec(&parts).map_err(|e| StateError::Serialization(e.to_string()))?;
        let payload = compress_payload(&json);

        // Step 2: Write header
        let mut header = SnapshotHeader::new(self.dimension as u32);
        header.moment_count = parts.moments.len() as u64;
        header.take_count = parts.takes.len() as u64;
        header.fact_count = parts.facts.len() as u64;
        header.memory_count = memory_vectors.len() as u64;
        header.corpus_count = corpus_vectors.len() as u64;
        header.payload_length = payload.len() as u64;
        header.write_to(writer)?;

        // Step 3: Write payload
        writer.write_all(&payload)?;

        // Step 4: Write vector block, memories then corpus
        for vec in memory_vectors.iter().chain(corpus_vectors.iter()) {
            for &val in vec {
                writer.write_all(&val.to_le_bytes())?;
            }
            // Pad if the vector is shorter than dimension
            let remaining = self.dimension.saturating_sub(vec.len());
            for _ in 0..remaining {
                writer.write_all(&0.0f32.to_le_bytes())?;
            }
        }

        writer.flush()?;
        Ok(())
    }
}
