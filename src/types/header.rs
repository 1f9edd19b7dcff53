//! File header for .nstate snapshot files.

use std::io::{Read, Write};

use crate::types::error::{StateError, StateResult};
use crate::types::{FORMAT_VERSION, SNAPSHOT_MAGIC};

/// Header of an .nstate file. Fixed size: 64 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotHeader {
    /// Magic bytes: [0x4E, 0x53, 0x54, 0x41] ("NSTA").
    pub magic: [u8; 4],
    /// Format version (currently 1).
    pub version: u32,
    /// Embedding dimensionality of every stored vector.
    pub dimension: u32,
    /// Number of moments in the payload.
    pub moment_count: u64,
    /// Number of takes in the payload.
    pub take_count: u64,
    /// Number of facts in the payload.
    pub fact_count: u64,
    /// Number of memories; also the number of memory vectors.
    pub memory_count: u64,
    /// Number of corpus chunks; also the number of corpus vectors.
    pub corpus_count: u64,
    /// Length in bytes of the compressed payload that follows the header.
    pub payload_length: u64,
}

/// The fixed size of a SnapshotHeader on disk: 64 bytes.
pub const HEADER_SIZE: u64 = 64;

impl SnapshotHeader {
    /// Create a new header with default magic and version.
    pub fn new(dimension: u32) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            dimension,
            moment_count: 0,
            take_count: 0,
            fact_count: 0,
            memory_count: 0,
            corpus_count: 0,
            payload_length: 0,
        }
    }

    /// Byte offset of the vector block, or `None` if it overflows.
    pub fn vector_block_offset(&self) -> Option<u64> {
        HEADER_SIZE.checked_add(self.payload_length)
    }

    /// Size in bytes of the vector block, or `None` if it overflows.
    pub fn vector_block_length(&self) -> Option<u64> {
        self.memory_count
            .checked_add(self.corpus_count)?
            .checked_mul(self.dimension as u64)?
            .checked_mul(4)
    }

    /// Write this header to the given writer. Writes exactly 64 bytes.
    ///
    /// Layout (all little-endian):
    /// - 0x00..0x04: magic (4 bytes)
    /// - 0x04..0x08: version (u32)
    /// - 0x08..0x0C: dimension (u32)
    /// - 0x0C..0x10: _reserved (u32, written as 0)
    /// - 0x10..0x18: moment_count (u64)
    /// - 0x18..0x20: take_count (u64)
    /// - 0x20..0x28: fact_count (u64)
    /// - 0x28..0x30: memory_count (u64)
    /// - 0x30..0x38: corpus_count (u64)
    /// - 0x38..0x40: payload_length (u64)
    pub fn write_to(&self, writer: &mut impl Write) -> StateResult<()> {
        writer.write_all(&self.magic)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&self.dimension.to_le_bytes())?;
        writer.write_all(&0u32.to_le_bytes())?; // _reserved
        writer.write_all(&self.moment_count.to_le_bytes())?;
        writer.write_all(&self.take_count.to_le_bytes())?;
        writer.write_all(&self.fact_count.to_le_bytes())?;
        writer.write_all(&self.memory_count.to_le_bytes())?;
        writer.write_all(&self.corpus_count.to_le_bytes())?;
        writer.write_all(&self.payload_length.to_le_bytes())?;
        Ok(())
    }

    /// Read a header from the given reader. Reads exactly 64 bytes.
    pub fn read_from(reader: &mut impl Read) -> StateResult<Self> {
        let mut buf = [0u8; 64];
        reader.read_exact(&mut buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                StateError::Truncated
            } else {
                StateError::Io(e)
            }
        })?;

        let magic = [buf[0], buf[1], buf[2], buf[3]];
        if magic != SNAPSHOT_MAGIC {
            return Err(StateError::InvalidMagic);
        }

        let version = read_u32(&buf, 4);
        if version != FORMAT_VERSION {
            return Err(StateError::UnsupportedVersion(version));
        }

        // bytes 12..16 are reserved
        Ok(Self {
            magic,
            version,
            dimension: read_u32(&buf, 8),
            moment_count: read_u64(&buf, 16),
            take_count: read_u64(&buf, 24),
            fact_count: read_u64(&buf, 32),
            memory_count: read_u64(&buf, 40),
            corpus_count: read_u64(&buf, 48),
            payload_length: read_u64(&buf, 56),
        })
    }
}

fn read_u32(buf: &[u8; 64], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(buf: &[u8; 64], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}
