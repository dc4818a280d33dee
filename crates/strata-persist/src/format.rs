/// Magic bytes identifying a Strata snapshot file.
pub const MAGIC: [u8; 4] = *b"STRA";

/// Current snapshot format version.
pub const FORMAT_VERSION: u16 = 1;

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 32;

/// Size of one decompressed entry: x, y, z as i32 plus a u16 tag.
pub const ENTRY_SIZE: usize = 14;

/// Snapshot file header. Fixed 32 bytes, repr(C) for byte-level serialization.
///
/// Followed by `table_len` bytes of LZ4 data (size-prepended) that
/// decompress to `entry_count * ENTRY_SIZE` bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub _pad0: u16,
    pub entry_count: u32,
    pub chunk_size: u32,
    pub saved_at_ms: u64,
    /// Compressed entry table length in bytes.
    pub table_len: u32,
    pub _pad1: u32,
}

impl SnapshotHeader {
    pub fn new(entry_count: u32, chunk_size: u32, saved_at_ms: u64, table_len: u32) -> Self {
        Self {
            magic: MAGIC,
            version: FORMAT_VERSION,
            _pad0: 0,
            entry_count,
            chunk_size,
            saved_at_ms,
            table_len,
            _pad1: 0,
        }
    }
}
