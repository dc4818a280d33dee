use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use strata_core::snapshot::{SnapshotStore, StoreError, WorldSnapshot};

use crate::error::PersistError;
use crate::load::decode_snapshot;
use crate::save::encode_snapshot;

impl From<PersistError> for StoreError {
    fn from(e: PersistError) -> Self {
        StoreError::Corrupt(e.to_string())
    }
}

fn decode_logged(bytes: &[u8], chunk_size: u32) -> Result<WorldSnapshot, StoreError> {
    let data = decode_snapshot(bytes, chunk_size)?;
    for warning in &data.warnings {
        log::warn!("{}", warning);
    }
    Ok(data.snapshot)
}

/// Snapshot store backed by a single file.
///
/// Saves go to a sibling `.tmp` file that is then renamed over the target,
/// so a crash mid-write leaves the previous snapshot intact.
pub struct FileStore {
    path: PathBuf,
    /// Grid chunk size, used to flag snapshots taken with another size.
    chunk_size: u32,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, chunk_size: u32) -> Self {
        Self {
            path: path.into(),
            chunk_size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl SnapshotStore for FileStore {
    fn save(&mut self, snapshot: &WorldSnapshot) -> Result<(), StoreError> {
        let bytes = encode_snapshot(snapshot)?;
        let temp = self.temp_path();
        std::fs::write(&temp, &bytes)?;
        std::fs::rename(&temp, &self.path)?;
        log::debug!(
            "Saved snapshot with {} chunks to {} ({} bytes)",
            snapshot.entries.len(),
            self.path.display(),
            bytes.len()
        );
        Ok(())
    }

    fn load(&mut self) -> Result<Option<WorldSnapshot>, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = decode_logged(&bytes, self.chunk_size)?;
        log::info!(
            "Loaded snapshot with {} chunks from {}",
            snapshot.entries.len(),
            self.path.display()
        );
        Ok(Some(snapshot))
    }
}

/// Snapshot store that keeps the encoded bytes in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bytes: Option<Vec<u8>>,
    chunk_size: u32,
    saves: usize,
}

impl MemoryStore {
    pub fn new(chunk_size: u32) -> Self {
        Self {
            bytes: None,
            chunk_size,
            saves: 0,
        }
    }

    /// Encoded form of the last save.
    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl SnapshotStore for MemoryStore {
    fn save(&mut self, snapshot: &WorldSnapshot) -> Result<(), StoreError> {
        self.bytes = Some(encode_snapshot(snapshot)?);
        self.saves += 1;
        Ok(())
    }

    fn load(&mut self) -> Result<Option<WorldSnapshot>, StoreError> {
        match &self.bytes {
            Some(bytes) => Ok(Some(decode_logged(bytes, self.chunk_size)?)),
            None => Ok(None),
        }
    }
}
