pub mod comparator;
pub mod engine;
pub mod path_key;
pub mod scanner;
pub mod transfer;

pub use comparator::{reconcile, FileSet, ReconciliationResult};
pub use engine::{Direction, RemoteRootMode, SyncConfig, SyncEngine, SyncReport, TransferOutcome};
pub use path_key::{normalize, PathKey, RootKind};
pub use scanner::{walk_local, walk_remote, walk_remote_root, LocalRoot, RemoteRoot};
pub use transfer::{Phase, ProgressEvent, TransferProgress};
