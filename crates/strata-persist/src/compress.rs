use glam::IVec3;
use strata_core::snapshot::SnapshotEntry;
use strata_core::types::ChunkTag;

use crate::error::PersistError;
use crate::format::ENTRY_SIZE;

/// Pack entries into the raw little-endian table.
pub fn pack_entries(entries: &[SnapshotEntry]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(entries.len() * ENTRY_SIZE);
    for entry in entries {
        raw.extend_from_slice(&entry.coord.x.to_le_bytes());
        raw.extend_from_slice(&entry.coord.y.to_le_bytes());
        raw.extend_from_slice(&entry.coord.z.to_le_bytes());
        raw.extend_from_slice(&entry.tag.0.to_le_bytes());
    }
    raw
}

/// Unpack a raw table. The length must be exactly `expected * ENTRY_SIZE`.
pub fn unpack_entries(raw: &[u8], expected: usize) -> Result<Vec<SnapshotEntry>, PersistError> {
    if raw.len() != expected * ENTRY_SIZE {
        return Err(PersistError::EntryCountMismatch {
            expected,
            actual: raw.len(),
        });
    }

    let entries = raw
        .chunks_exact(ENTRY_SIZE)
        .map(|e| {
            let x = i32::from_le_bytes([e[0], e[1], e[2], e[3]]);
            let y = i32::from_le_bytes([e[4], e[5], e[6], e[7]]);
            let z = i32::from_le_bytes([e[8], e[9], e[10], e[11]]);
            let tag = u16::from_le_bytes([e[12], e[13]]);
            SnapshotEntry {
                coord: IVec3::new(x, y, z),
                tag: ChunkTag(tag),
            }
        })
        .collect();
    Ok(entries)
}

/// Compress a packed table using LZ4.
pub fn compress_table(raw: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(raw)
}

/// Decompress a table holding `entry_count` entries. The size prefix is
/// checked against the entry count before anything is allocated.
pub fn decompress_table(compressed: &[u8], entry_count: usize) -> Result<Vec<u8>, PersistError> {
    let expected_len = entry_count
        .checked_mul(ENTRY_SIZE)
        .ok_or(PersistError::TooManyEntries(entry_count))?;
    let declared = declared_table_len(compressed)?;
    if declared != expected_len {
        return Err(PersistError::EntryCountMismatch {
            expected: entry_count,
            actual: declared,
        });
    }
    lz4_flex::decompress_size_prepended(compressed)
        .map_err(|e| PersistError::DecompressError(e.to_string()))
}

/// Uncompressed length from the little-endian `u32` prefix.
fn declared_table_len(compressed: &[u8]) -> Result<usize, PersistError> {
    match compressed.get(..4) {
        Some(&[a, b, c, d]) => Ok(u32::from_le_bytes([a, b, c, d]) as usize),
        _ => Err(PersistError::DecompressError(format!(
            "size prefix needs 4 bytes, table has {}",
            compressed.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_layout_is_little_endian() {
        let raw = pack_entries(&[SnapshotEntry {
            coord: IVec3::new(1, -1, 256),
            tag: ChunkTag(0x0203),
        }]);
        assert_eq!(raw.len(), ENTRY_SIZE);
        assert_eq!(&raw[0..4], &[1, 0, 0, 0]);
        assert_eq!(&raw[4..8], &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(&raw[8..12], &[0, 1, 0, 0]);
        assert_eq!(&raw[12..14], &[0x03, 0x02]);
    }

    #[test]
    fn test_unpack_rejects_wrong_length() {
        let raw = vec![0u8; ENTRY_SIZE * 2 + 1];
        let result = unpack_entries(&raw, 2);
        assert!(matches!(
            result,
            Err(PersistError::EntryCountMismatch { expected: 2, actual: 29 })
        ));
    }

    #[test]
    fn test_decompress_garbage_fails() {
        // Claims ten entries, provides none.
        let mut bogus = ((ENTRY_SIZE * 10) as u32).to_le_bytes().to_vec();
        bogus.extend_from_slice(&[0xF0]);
        assert!(matches!(
            decompress_table(&bogus, 10),
            Err(PersistError::DecompressError(_))
        ));
    }

    #[test]
    fn test_oversized_prefix_rejected_before_decompressing() {
        let mut bogus = 0xFFFF_FFF0u32.to_le_bytes().to_vec();
        bogus.extend_from_slice(&[0x00]);
        assert!(matches!(
            decompress_table(&bogus, 3),
            Err(PersistError::EntryCountMismatch {
                expected: 3,
                actual: 0xFFFF_FFF0
            })
        ));
    }

    #[test]
    fn test_missing_prefix_rejected() {
        assert!(matches!(
            decompress_table(&[0x01, 0x02], 0),
            Err(PersistError::DecompressError(_))
        ));
    }

    #[test]
    fn test_large_table_compresses() {
        let entries: Vec<SnapshotEntry> = (0..1024)
            .map(|i| SnapshotEntry {
                coord: IVec3::new(i % 32, 0, i / 32),
                tag: ChunkTag(1),
            })
            .collect();
        let raw = pack_entries(&entries);
        let compressed = compress_table(&raw);
        assert!(compressed.len() < raw.len());
        assert_eq!(decompress_table(&compressed, 1024).expect("decompress"), raw);
    }
}
