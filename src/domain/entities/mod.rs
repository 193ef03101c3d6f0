pub mod chat_message;
pub mod film;
pub mod membership;
pub mod record;

pub use chat_message::{Attachment, ChatMessage, ChatMessageDraft};
pub use film::{FeaturedFilm, FilmRef, WatchlistEntry};
pub use membership::MemberRole;
pub use record::{DomainRecord, ServerRecord};
