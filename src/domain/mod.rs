pub mod entities;
pub mod projection;
pub mod value_objects;

pub use entities::{DomainRecord, ServerRecord};
pub use projection::{LocalProjectionStore, PendingWriteTracker};
pub use value_objects::{Collection, OwnerRef, RecordId, RecordPayload};
