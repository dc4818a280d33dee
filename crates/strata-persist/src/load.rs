use strata_core::snapshot::WorldSnapshot;

use crate::compat;
use crate::compress;
use crate::error::PersistError;
use crate::format::*;

/// Parsed snapshot file.
pub struct SnapshotData {
    pub header: SnapshotHeader,
    pub snapshot: WorldSnapshot,
    /// Compatibility warnings (e.g., chunk size mismatch).
    pub warnings: Vec<String>,
}

/// Load and parse a snapshot file from raw bytes.
pub fn decode_snapshot(bytes: &[u8], current_chunk_size: u32) -> Result<SnapshotData, PersistError> {
    if bytes.len() < HEADER_SIZE {
        return Err(PersistError::FileTooSmall {
            actual: bytes.len(),
            minimum: HEADER_SIZE,
        });
    }

    let header: SnapshotHeader = bytemuck::pod_read_unaligned(&bytes[..HEADER_SIZE]);
    let warnings = compat::validate_header(&header, current_chunk_size)?;

    let table_end = HEADER_SIZE + header.table_len as usize;
    if bytes.len() < table_end {
        return Err(PersistError::TruncatedFile {
            expected: table_end,
            actual: bytes.len(),
        });
    }
    if bytes.len() > table_end {
        log::warn!(
            "Snapshot has {} trailing bytes after the entry table",
            bytes.len() - table_end
        );
    }

    let entry_count = header.entry_count as usize;
    let raw = compress::decompress_table(&bytes[HEADER_SIZE..table_end], entry_count)?;
    let entries = compress::unpack_entries(&raw, entry_count)?;

    Ok(SnapshotData {
        header,
        snapshot: WorldSnapshot {
            chunk_size: header.chunk_size,
            saved_at_ms: header.saved_at_ms,
            entries,
        },
        warnings,
    })
}
