pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod storage;

pub use core::{Direction, SyncConfig, SyncEngine, SyncReport};
pub use error::{SyncError, SyncResult};
pub use storage::{Bucket, ObjectStore, OpendalStore};
