// モジュール定義
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

pub use application::ports::{ActivityNotifier, RemoteEvent, RemoteFeed, RemoteStore, WriteFailure};
pub use application::services::{
    ChatService, FailureClass, FailureReason, FeaturedFilmService, LiveFeed, ProjectionView,
    ReconcileOutcome, Reconciler, RetryPolicy, RollbackReport, SubscriptionHandle,
    WatchlistService,
};
pub use domain::entities::{
    Attachment, ChatMessage, ChatMessageDraft, DomainRecord, FeaturedFilm, FilmRef, MemberRole,
    ServerRecord, WatchlistEntry,
};
pub use domain::projection::{LocalProjectionStore, PendingWriteTracker};
pub use domain::value_objects::{ClubId, Collection, OwnerRef, RecordId, RecordPayload};
pub use infrastructure::remote::{InMemoryRemoteStore, ScriptedResponse};
pub use shared::{AppConfig, AppError, ValidationFailureKind};
pub use state::{SessionContext, SessionDeps};

/// ログ設定の初期化
///
/// `RUST_LOG` が未設定なら `filmclub=debug,info`。ホスト側で既に
/// subscriber が設定されている場合は何もしない。
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filmclub=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
