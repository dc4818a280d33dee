pub mod compat;
pub mod compress;
pub mod error;
pub mod format;
pub mod load;
pub mod save;
pub mod store;

pub use error::PersistError;
pub use format::SnapshotHeader;
pub use load::{decode_snapshot, SnapshotData};
pub use save::encode_snapshot;
pub use store::{FileStore, MemoryStore};
