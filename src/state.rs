use crate::application::ports::{ActivityNotifier, RemoteStore};
use crate::application::services::{
    ChatService, FeaturedFilmService, ProjectionView, Reconciler, RetryPolicy, SubscriptionHandle,
    WatchlistService,
};
use crate::domain::entities::MemberRole;
use crate::domain::projection::PendingWriteTracker;
use crate::domain::value_objects::{ClubId, Collection, OwnerRef};
use crate::shared::{AppConfig, AppError, ReconcilerMetrics, ReconcilerMetricsSnapshot};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// セッション開始時に外部から渡される依存関係
pub struct SessionDeps {
    pub remote: Arc<dyn RemoteStore>,
    pub notifier: Option<Arc<dyn ActivityNotifier>>,
    pub config: AppConfig,
}

impl SessionDeps {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            notifier: None,
            config: AppConfig::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ActivityNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }
}

/// サインイン中のユーザーに紐づく状態を管理する構造体
///
/// ビュー・仮 ID トラッカー・購読はすべてここに属し、`sign_out` で確実に破棄される。
pub struct SessionContext {
    user: OwnerRef,
    config: AppConfig,
    reconciler: Reconciler,
    views: Mutex<HashMap<Collection, ProjectionView>>,
    subscriptions: Mutex<Vec<SubscriptionHandle>>,
}

impl SessionContext {
    pub fn sign_in(user: OwnerRef, deps: SessionDeps) -> Result<Self, AppError> {
        deps.config
            .validate()
            .map_err(AppError::ConfigurationError)?;

        let reconciler = Reconciler::new(
            deps.remote,
            Arc::new(PendingWriteTracker::new()),
            deps.notifier,
            RetryPolicy::from(&deps.config.reconciler),
            Arc::new(ReconcilerMetrics::new()),
        );
        info!(user = %user, "Session started");

        Ok(Self {
            user,
            config: deps.config,
            reconciler,
            views: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
        })
    }

    pub fn user(&self) -> &OwnerRef {
        &self.user
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<PendingWriteTracker> {
        self.reconciler.tracker()
    }

    pub fn metrics(&self) -> ReconcilerMetricsSnapshot {
        self.reconciler.metrics().snapshot()
    }

    /// The session's view of `collection`; every service over the same
    /// collection shares it.
    pub fn view(&self, collection: &Collection) -> ProjectionView {
        lock(&self.views)
            .entry(collection.clone())
            .or_insert_with(|| ProjectionView::new(collection.clone()))
            .clone()
    }

    pub fn chat(&self, club: ClubId, role: MemberRole) -> ChatService {
        let view = self.view(&ChatService::messages_collection(&club));
        ChatService::new(
            club,
            self.user.clone(),
            role,
            view,
            self.reconciler.clone(),
            self.config.chat.clone(),
        )
    }

    /// Chat with history loaded and, unless the feed is disabled, a live
    /// subscription owned by the session.
    pub async fn open_chat(&self, club: ClubId, role: MemberRole) -> Result<ChatService, AppError> {
        let chat = self.chat(club, role);
        if self.config.feed.enabled {
            let handle = chat.attach_live().await?;
            self.track(handle);
        }
        chat.refresh().await?;
        Ok(chat)
    }

    pub fn featured_films(&self, club: ClubId, role: MemberRole) -> FeaturedFilmService {
        let view = self.view(&FeaturedFilmService::collection(&club));
        FeaturedFilmService::new(club, self.user.clone(), role, view, self.reconciler.clone())
    }

    pub fn watchlist(&self) -> Result<WatchlistService, AppError> {
        let view = self.view(&WatchlistService::collection(&self.user)?);
        Ok(WatchlistService::new(
            self.user.clone(),
            view,
            self.reconciler.clone(),
        ))
    }

    /// Hands a subscription to the session so sign-out can close it.
    pub fn track(&self, handle: SubscriptionHandle) {
        debug!(collection = %handle.collection(), "Subscription tracked");
        lock(&self.subscriptions).push(handle);
    }

    pub fn active_subscriptions(&self) -> usize {
        lock(&self.subscriptions)
            .iter()
            .filter(|handle| handle.is_active())
            .count()
    }

    /// Tears the session down: later writes through any service are refused,
    /// subscriptions are closed, every view is emptied and pending writes are
    /// forgotten. Responses still in flight land as stale.
    pub async fn sign_out(self) {
        self.reconciler.close();

        let subscriptions: Vec<SubscriptionHandle> = lock(&self.subscriptions).drain(..).collect();
        let closed = subscriptions.len();
        for handle in subscriptions {
            handle.unsubscribe();
        }

        let views: Vec<ProjectionView> = lock(&self.views).drain().map(|(_, view)| view).collect();
        for view in &views {
            view.clear().await;
        }

        self.reconciler.tracker().reset();
        info!(
            user = %self.user,
            subscriptions = closed,
            views = views.len(),
            "Session closed"
        );
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ChatMessageDraft;
    use crate::infrastructure::remote::InMemoryRemoteStore;
    use crate::shared::config::ReconcilerConfig;

    fn club() -> ClubId {
        ClubId::new("42".to_string()).unwrap()
    }

    fn session(remote: Arc<InMemoryRemoteStore>) -> SessionContext {
        SessionContext::sign_in(OwnerRef::parse("user-a").unwrap(), SessionDeps::new(remote))
            .expect("sign in")
    }

    #[test]
    fn invalid_config_is_refused_at_sign_in() {
        let config = AppConfig {
            reconciler: ReconcilerConfig {
                max_attempts: 0,
                ..ReconcilerConfig::default()
            },
            ..AppConfig::default()
        };
        let deps = SessionDeps::new(Arc::new(InMemoryRemoteStore::new())).with_config(config);

        let result = SessionContext::sign_in(OwnerRef::parse("user-a").unwrap(), deps);
        assert!(matches!(result, Err(AppError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn services_over_one_collection_share_a_view() {
        let session = session(Arc::new(InMemoryRemoteStore::new()));
        let first = session.chat(club(), MemberRole::Member);
        let second = session.chat(club(), MemberRole::Member);

        first
            .send_message(ChatMessageDraft::text("hello"))
            .await
            .expect("send");
        assert_eq!(second.messages().await.len(), 1);
    }

    #[tokio::test]
    async fn sign_out_tears_everything_down() {
        let session = session(Arc::new(InMemoryRemoteStore::new()));
        let chat = session
            .open_chat(club(), MemberRole::Member)
            .await
            .expect("open chat");
        chat.send_message(ChatMessageDraft::text("bye"))
            .await
            .expect("send");
        assert_eq!(session.active_subscriptions(), 1);

        let tracker = session.tracker().clone();
        session.sign_out().await;

        assert!(chat.view().is_empty().await);
        assert_eq!(tracker.in_flight_count(), 0);
        let err = chat
            .send_message(ChatMessageDraft::text("still there?"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionClosed));
    }
}
