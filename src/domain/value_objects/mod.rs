pub mod collection;
pub mod owner_ref;
pub mod payload;
pub mod record_id;

pub use collection::{ClubId, Collection};
pub use owner_ref::OwnerRef;
pub use payload::{CLIENT_HINT_PREFIX, RecordPayload};
pub use record_id::{RecordId, TEMP_ID_PREFIX};
