pub mod activity_notifier;
pub mod remote_store;

pub use activity_notifier::ActivityNotifier;
pub use remote_store::{RemoteEvent, RemoteFeed, RemoteStore, WriteFailure};
