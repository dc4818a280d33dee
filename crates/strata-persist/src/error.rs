/// Errors that can occur while encoding or decoding snapshot files.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("invalid magic bytes (expected STRA)")]
    InvalidMagic,

    #[error("unsupported snapshot format version {0}")]
    UnsupportedVersion(u16),

    /// Shorter than the fixed header.
    #[error("snapshot too small: {actual} bytes, header needs {minimum}")]
    FileTooSmall { actual: usize, minimum: usize },

    /// The header's `table_len` runs past the end of the input.
    #[error("snapshot truncated: entry table ends at byte {expected}, input has {actual}")]
    TruncatedFile { expected: usize, actual: usize },

    #[error("entry table decompression failed: {0}")]
    DecompressError(String),

    /// Table size, in bytes, disagrees with the header's entry count.
    #[error("entry table holds {actual} bytes, header declares {expected} entries")]
    EntryCountMismatch { expected: usize, actual: usize },

    #[error("snapshot holds {0} entries, more than the format can index")]
    TooManyEntries(usize),
}
