pub mod memory_store;
pub mod normalize;

pub use memory_store::{InMemoryRemoteStore, ScriptedResponse};
pub use normalize::{normalize_row, normalize_rows};
