pub mod collector;
pub mod diff;
pub mod error;
pub mod manifest;
pub mod mirror;
pub mod offsite;
pub mod ops;
pub mod pathmap;
pub mod pool;
pub mod snapshot;
pub mod types;

pub use diff::{DiffResult, DiffStats, Outcome, WorkItem};
pub use error::{Error, Result};
pub use pathmap::PathMapper;
pub use snapshot::{Snapshot, SnapshotStore};
pub use types::*;
