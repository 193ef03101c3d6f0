pub mod chat_service;
pub mod featured_service;
pub mod live_feed;
pub mod projection_view;
pub mod reconciler;
pub mod watchlist_service;

pub use chat_service::ChatService;
pub use featured_service::FeaturedFilmService;
pub use live_feed::{LiveFeed, SubscriptionHandle};
pub use projection_view::ProjectionView;
pub use reconciler::{
    FailureClass, FailureReason, ReconcileOutcome, Reconciler, RetryPolicy, RollbackReport,
};
pub use watchlist_service::WatchlistService;
