use crate::error::PersistError;
use crate::format::{SnapshotHeader, FORMAT_VERSION, MAGIC};

/// Validate a snapshot header and return any compatibility warnings.
///
/// A chunk size mismatch produces a warning, not an error: the coordinates
/// are still meaningful, only their world-space extent differs.
pub fn validate_header(
    header: &SnapshotHeader,
    current_chunk_size: u32,
) -> Result<Vec<String>, PersistError> {
    if header.magic != MAGIC {
        return Err(PersistError::InvalidMagic);
    }

    if header.version != FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion(header.version));
    }

    let mut warnings = Vec::new();
    if header.chunk_size != current_chunk_size {
        warnings.push(format!(
            "Snapshot was taken with chunk size {} (current: {}). \
             Restored chunks will cover different world regions.",
            header.chunk_size, current_chunk_size
        ));
    }

    Ok(warnings)
}
