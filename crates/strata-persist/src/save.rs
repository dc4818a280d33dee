use strata_core::snapshot::WorldSnapshot;

use crate::compress;
use crate::error::PersistError;
use crate::format::*;

/// Serialize a snapshot into the Strata binary format.
///
/// Layout: header (32B) + LZ4 size-prepended entry table (14B × N raw).
pub fn encode_snapshot(snapshot: &WorldSnapshot) -> Result<Vec<u8>, PersistError> {
    let entry_count = u32::try_from(snapshot.entries.len())
        .map_err(|_| PersistError::TooManyEntries(snapshot.entries.len()))?;

    let table = compress::compress_table(&compress::pack_entries(&snapshot.entries));
    let table_len =
        u32::try_from(table.len()).map_err(|_| PersistError::TooManyEntries(snapshot.entries.len()))?;

    let header = SnapshotHeader::new(
        entry_count,
        snapshot.chunk_size,
        snapshot.saved_at_ms,
        table_len,
    );

    let mut output = Vec::with_capacity(HEADER_SIZE + table.len());
    output.extend_from_slice(bytemuck::bytes_of(&header));
    output.extend_from_slice(&table);
    Ok(output)
}
