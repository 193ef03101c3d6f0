pub mod store;
pub mod tracker;

pub use store::{LocalProjectionStore, MergeOutcome, ReplaceOutcome, Snapshot};
pub use tracker::{PendingKind, PendingWrite, PendingWriteTracker};
