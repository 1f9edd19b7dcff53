//! Reads .nstate snapshot files into in-memory state.

use std::io::Read;
use std::path::Path;

use crate::index::IndexKind;
use crate::state::{NarrativeState, StateParts};
use crate::types::error::{StateError, StateResult};
use crate::types::header::{SnapshotHeader, HEADER_SIZE};

use super::compression::decompress_payload;

/// Reader for .nstate snapshot files.
pub struct SnapshotReader;

impl SnapshotReader {
    /// Read only the header of an .nstate file.
    pub fn read_header(path: &Path) -> StateResult<SnapshotHeader> {
        let mut file = std::fs::File::open(path)?;
        SnapshotHeader::read_from(&mut file)
    }

    /// Read an .nstate file into a NarrativeState.
    pub fn read_from_file(path: &Path, index_kind: IndexKind) -> StateResult<NarrativeState> {
        let data = std::fs::read(path)?;
        let mut cursor = std::io::Cursor::new(data);
        Self::read_from(&mut cursor, index_kind)
    }

    /// Read from any reader into a NarrativeState.
    pub fn read_from(reader: &mut impl Read, index_kind: IndexKind) -> StateResult<NarrativeState> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        if (data.len() as u64) < HEADER_SIZE {
            return Err(StateError::Truncated);
        }

        // Parse header
        let header = SnapshotHeader::read_from(&mut std::io::Cursor::new(&data[..64]))?;
        let dimension = header.dimension as usize;

        let vec_start = header.vector_block_offset().ok_or(StateError::Truncated)?;
        let vec_end = header
            .vector_block_length()
            .and_then(|len| vec_start.checked_add(len))
            .ok_or(StateError::Truncated)?;
        if vec_end > data.len() as u64 {
            return Err(StateError::Truncated);
        }

        // Decode payload
        let payload = decompress_payload(&data[HEADER_SIZE as usize..vec_start as usize])?;
        let parts: StateParts = serde_json::from_slice(&payload)
            .map_err(|e| StateError::Serialization(e.to_string()))?;
        if parts.memories.len() as u64 != header.memory_count
            || parts.corpus.len() as u64 != header.corpus_count
        {
            return Err(StateError::Serialization(
                "record counts disagree with header".into(),
            ));
        }

        // Read vector block
        let mut vectors = data[vec_start as usize..vec_end as usize]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]));
        let mut take_vectors = |count: u64| -> Vec<Vec<f32>> {
            (0..count)
                .map(|_| vectors.by_ref().take(dimension).collect())
                .collect()
        };
        let memory_vectors = take_vectors(header.memory_count);
        let corpus_vectors = take_vectors(header.corpus_count);

        let state = NarrativeState::from_parts(
            parts,
            memory_vectors,
            corpus_vectors,
            dimension,
            index_kind,
        )?;
        log::debug!(
            "snapshot read: {} moments, {} takes, {} memories, {} corpus chunks",
            header.moment_count,
            header.take_count,
            header.memory_count,
            header.corpus_count
        );
        Ok(state)
    }
}
