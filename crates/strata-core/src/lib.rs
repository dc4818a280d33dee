pub mod config;
pub mod constants;
pub mod error;
pub mod math;
pub mod snapshot;
pub mod types;

pub use config::GridConfig;
pub use error::StrataError;
pub use snapshot::{SnapshotEntry, SnapshotStore, StoreError, WorldSnapshot};
pub use types::{ChunkCoord, ChunkTag, DistanceMetric, WorldPos};
