use crate::application::ports::WriteFailure;
use crate::application::services::live_feed::{LiveFeed, SubscriptionHandle};
use crate::application::services::projection_view::ProjectionView;
use crate::application::services::reconciler::{ReconcileOutcome, Reconciler};
use crate::domain::entities::{ChatMessage, ChatMessageDraft, MemberRole};
use crate::domain::value_objects::{ClubId, Collection, OwnerRef, RecordId, RecordPayload};
use crate::shared::config::ChatConfig;
use crate::shared::{AppError, ValidationFailureKind};
use serde_json::Value;
use tracing::{debug, info};

pub const MESSAGES_TABLE: &str = "club_messages";
pub const REPORTS_TABLE: &str = "message_reports";

/// クラブチャット。送信は楽観的に反映し、失敗時は入力内容を返す。
pub struct ChatService {
    club: ClubId,
    viewer: OwnerRef,
    role: MemberRole,
    view: ProjectionView,
    reports: Collection,
    reconciler: Reconciler,
    config: ChatConfig,
}

impl ChatService {
    pub fn new(
        club: ClubId,
        viewer: OwnerRef,
        role: MemberRole,
        view: ProjectionView,
        reconciler: Reconciler,
        config: ChatConfig,
    ) -> Self {
        let reports = Collection::scoped(REPORTS_TABLE, &club);
        Self {
            club,
            viewer,
            role,
            view,
            reports,
            reconciler,
            config,
        }
    }

    pub fn messages_collection(club: &ClubId) -> Collection {
        Collection::scoped(MESSAGES_TABLE, club)
    }

    pub fn view(&self) -> &ProjectionView {
        &self.view
    }

    pub fn club(&self) -> &ClubId {
        &self.club
    }

    /// Shows the message at once and reconciles it with the backend. A
    /// rolled-back outcome carries the typed text for the composer.
    pub async fn send_message(
        &self,
        draft: ChatMessageDraft,
    ) -> Result<ReconcileOutcome, AppError> {
        self.validate_draft(&draft)?;

        let outcome = self
            .reconciler
            .submit(
                &self.view,
                &self.viewer,
                draft.to_payload(),
                Some(draft.text.clone()),
            )
            .await?;

        if let ReconcileOutcome::Reconciled(record) = &outcome {
            debug!(club = %self.club, message_id = %record.id, "Chat message sent");
        }
        Ok(outcome)
    }

    /// Authors may delete their own messages; moderators any message.
    pub async fn delete_message(&self, id: &RecordId) -> Result<(), AppError> {
        let Some(record) = self.view.get(id).await else {
            return Err(AppError::NotFound(format!("Message {id} not found")));
        };
        if !record.is_owned_by(&self.viewer) && !self.role.can_moderate_messages() {
            return Err(AppError::validation(
                ValidationFailureKind::PermissionDenied,
                "You can only delete your own messages.",
            ));
        }

        self.reconciler.delete(&self.view, id).await
    }

    /// Files a moderation report. Reporting the same message twice is not
    /// an error.
    pub async fn report_message(&self, id: &RecordId, reason: &str) -> Result<(), AppError> {
        self.ensure_reconciled(id).await?;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::validation(
                ValidationFailureKind::EmptyContent,
                "Please tell us what is wrong with this message.",
            ));
        }

        let payload = RecordPayload::empty()
            .with("message_id", Value::String(id.to_string()))
            .with("reason", Value::String(reason.to_string()));

        match self
            .reconciler
            .remote()
            .write(&self.reports, &self.viewer, &payload)
            .await
        {
            Ok(_) | Err(WriteFailure::Duplicate { .. }) => {
                info!(club = %self.club, message_id = %id, "Message reported");
                Ok(())
            }
            Err(failure) => Err(failure.into()),
        }
    }

    /// Shareable link to a message. Only reconciled messages have one.
    pub async fn permalink(&self, id: &RecordId) -> Result<String, AppError> {
        self.ensure_reconciled(id).await?;
        Ok(format!(
            "{}/{}/chat#{}",
            self.config.permalink_base.trim_end_matches('/'),
            self.club,
            id
        ))
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.view.render(|record| ChatMessage::from(record)).await
    }

    /// Re-fetches the channel history; messages still being sent are kept,
    /// as is anything that reached the view while the history was loading.
    pub async fn refresh(&self) -> Result<usize, AppError> {
        let since = self.view.read().await.revision();
        let rows = self
            .reconciler
            .remote()
            .list(self.view.collection())
            .await?;
        let count = rows.len();
        self.view
            .mutate(|store| store.reset_with(rows, since))
            .await;
        debug!(club = %self.club, count, "Chat history refreshed");
        Ok(count)
    }

    pub async fn attach_live(&self) -> Result<SubscriptionHandle, AppError> {
        LiveFeed::attach(self.reconciler.remote(), self.view.clone()).await
    }

    fn validate_draft(&self, draft: &ChatMessageDraft) -> Result<(), AppError> {
        if draft.is_empty() {
            return Err(AppError::validation(
                ValidationFailureKind::EmptyContent,
                "Message cannot be empty.",
            ));
        }
        let length = draft.trimmed_text().chars().count();
        if length > self.config.max_message_length {
            return Err(AppError::validation(
                ValidationFailureKind::ContentTooLarge,
                format!(
                    "Message is too long ({length}/{} characters).",
                    self.config.max_message_length
                ),
            ));
        }
        Ok(())
    }

    async fn ensure_reconciled(&self, id: &RecordId) -> Result<(), AppError> {
        let store = self.view.read().await;
        if self.reconciler.tracker().is_provisional(id, &store) {
            return Err(AppError::validation(
                ValidationFailureKind::ProvisionalRecord,
                "This message is still being sent.",
            ));
        }
        if !store.contains(id) {
            return Err(AppError::NotFound(format!("Message {id} not found")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{RemoteFeed, RemoteStore};
    use crate::application::services::reconciler::RetryPolicy;
    use crate::domain::entities::{DomainRecord, ServerRecord};
    use crate::domain::projection::PendingWriteTracker;
    use crate::infrastructure::remote::{InMemoryRemoteStore, ScriptedResponse};
    use crate::shared::ReconcilerMetrics;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn club() -> ClubId {
        ClubId::new("42".to_string()).unwrap()
    }

    fn user(id: &str) -> OwnerRef {
        OwnerRef::parse(id).unwrap()
    }

    fn reconciler(remote: Arc<dyn RemoteStore>) -> Reconciler {
        Reconciler::new(
            remote,
            Arc::new(PendingWriteTracker::new()),
            None,
            RetryPolicy {
                max_attempts: 2,
                backoff: Duration::from_millis(1),
                timeout: Duration::from_secs(1),
            },
            Arc::new(ReconcilerMetrics::new()),
        )
    }

    fn service_with(
        remote: Arc<InMemoryRemoteStore>,
        viewer: &str,
        role: MemberRole,
        view: ProjectionView,
    ) -> ChatService {
        ChatService::new(
            club(),
            user(viewer),
            role,
            view,
            reconciler(remote),
            ChatConfig::default(),
        )
    }

    fn service(remote: Arc<InMemoryRemoteStore>, role: MemberRole) -> ChatService {
        let view = ProjectionView::new(ChatService::messages_collection(&club()));
        service_with(remote, "user-a", role, view)
    }

    #[tokio::test]
    async fn send_message_reconciles_in_place() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let chat = service(remote.clone(), MemberRole::Member);

        let outcome = chat
            .send_message(ChatMessageDraft::text("  hello  "))
            .await
            .expect("send");

        let messages = chat.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "hello");
        assert!(!messages[0].is_pending);
        assert_eq!(Some(&messages[0].id), outcome.record().map(|r| &r.id));
        assert_eq!(
            remote
                .row_count(&ChatService::messages_collection(&club()))
                .await,
            1
        );
    }

    #[tokio::test]
    async fn local_validation_never_reaches_the_store() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let chat = service(remote.clone(), MemberRole::Member);

        let err = chat
            .send_message(ChatMessageDraft::text("   "))
            .await
            .unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationFailureKind::EmptyContent));

        let err = chat
            .send_message(ChatMessageDraft::text("x".repeat(2001)))
            .await
            .unwrap_err();
        assert_eq!(
            err.validation_kind(),
            Some(ValidationFailureKind::ContentTooLarge)
        );
        assert!(chat.view().is_empty().await);
    }

    #[tokio::test]
    async fn rejected_message_returns_typed_text() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        remote.block_word("spoiler").await;
        let chat = service(remote, MemberRole::Member);

        let outcome = chat
            .send_message(ChatMessageDraft::text("the spoiler is..."))
            .await
            .expect("send");

        let report = outcome.rollback().expect("rolled back");
        assert_eq!(report.restored_input.as_deref(), Some("the spoiler is..."));
        assert_eq!(
            report.reason.kind,
            Some(ValidationFailureKind::ContentRejected)
        );
        assert!(chat.messages().await.is_empty());
    }

    #[tokio::test]
    async fn members_cannot_delete_others_messages() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let collection = ChatService::messages_collection(&club());
        let view = ProjectionView::new(collection.clone());
        let row = remote
            .insert_from_other_actor(
                &collection,
                &user("user-b"),
                RecordPayload::empty().with("text", Value::String("hi".to_string())),
            )
            .await
            .expect("insert");
        view.mutate(|store| store.merge_remote(row.clone()))
            .await;

        let member = service_with(remote.clone(), "user-a", MemberRole::Member, view.clone());
        let err = member.delete_message(&row.id).await.unwrap_err();
        assert_eq!(
            err.validation_kind(),
            Some(ValidationFailureKind::PermissionDenied)
        );
        assert_eq!(view.len().await, 1);

        let moderator = service_with(remote.clone(), "user-c", MemberRole::Moderator, view.clone());
        moderator.delete_message(&row.id).await.expect("delete");
        assert!(view.is_empty().await);
        assert_eq!(remote.row_count(&collection).await, 0);
    }

    #[tokio::test]
    async fn system_messages_belong_to_nobody() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let collection = ChatService::messages_collection(&club());
        let row = remote
            .insert_system_row(
                &collection,
                RecordPayload::empty().with("text", Value::String("user-b joined".to_string())),
            )
            .await
            .expect("insert");
        let chat = service(remote.clone(), MemberRole::Member);
        chat.refresh().await.expect("refresh");

        let messages = chat.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].author, None);
        assert!(!messages[0].is_mine(&user("user-a")));

        let err = chat.delete_message(&row.id).await.unwrap_err();
        assert_eq!(
            err.validation_kind(),
            Some(ValidationFailureKind::PermissionDenied)
        );
        assert_eq!(remote.row_count(&collection).await, 1);
    }

    #[tokio::test]
    async fn provisional_messages_cannot_be_reported_or_linked() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let chat = service(remote, MemberRole::Member);
        let temp_id = chat.reconciler.tracker().mint();
        chat.view
            .mutate(|store| {
                store.append(DomainRecord::provisional(
                    temp_id.clone(),
                    user("user-a"),
                    RecordPayload::empty(),
                ))
            })
            .await
            .expect("append");

        let err = chat.permalink(&temp_id).await.unwrap_err();
        assert_eq!(
            err.validation_kind(),
            Some(ValidationFailureKind::ProvisionalRecord)
        );
        let err = chat.report_message(&temp_id, "spam").await.unwrap_err();
        assert_eq!(
            err.validation_kind(),
            Some(ValidationFailureKind::ProvisionalRecord)
        );
    }

    #[tokio::test]
    async fn reconciled_message_has_permalink_and_can_be_reported() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let chat = service(remote.clone(), MemberRole::Member);
        let outcome = chat
            .send_message(ChatMessageDraft::text("hello"))
            .await
            .expect("send");
        let id = outcome.record().expect("reconciled").id.clone();

        let link = chat.permalink(&id).await.expect("permalink");
        assert_eq!(link, format!("/clubs/42/chat#{id}"));

        chat.report_message(&id, "off topic").await.expect("report");
        let reports = Collection::scoped(REPORTS_TABLE, &club());
        assert_eq!(remote.row_count(&reports).await, 1);
    }

    #[tokio::test]
    async fn refresh_keeps_messages_in_flight() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let collection = ChatService::messages_collection(&club());
        remote
            .insert_from_other_actor(&collection, &user("user-b"), RecordPayload::empty())
            .await
            .expect("insert");
        let chat = service(remote.clone(), MemberRole::Member);

        remote
            .script(ScriptedResponse::Delay(Duration::from_millis(50)))
            .await;
        let sending = {
            let view = chat.view.clone();
            let reconciler = chat.reconciler.clone();
            tokio::spawn(async move {
                reconciler
                    .submit(
                        &view,
                        &user("user-a"),
                        ChatMessageDraft::text("later").to_payload(),
                        None,
                    )
                    .await
            })
        };
        while chat.view.is_empty().await {
            tokio::task::yield_now().await;
        }

        assert_eq!(chat.refresh().await.expect("refresh"), 1);
        let pending: Vec<bool> = chat.messages().await.iter().map(|m| m.is_pending).collect();
        assert_eq!(pending, vec![false, true]);

        let outcome = sending.await.expect("join").expect("submit");
        assert!(outcome.is_success());
        assert_eq!(chat.view.len().await, 2);
    }

    /// Backend whose listing is held after the rows are read.
    struct HeldListing {
        inner: Arc<InMemoryRemoteStore>,
        listed: Notify,
        release: Notify,
    }

    #[async_trait]
    impl RemoteStore for HeldListing {
        async fn write(
            &self,
            collection: &Collection,
            owner: &OwnerRef,
            fields: &RecordPayload,
        ) -> Result<ServerRecord, WriteFailure> {
            self.inner.write(collection, owner, fields).await
        }

        async fn delete(&self, collection: &Collection, id: &RecordId) -> Result<(), WriteFailure> {
            self.inner.delete(collection, id).await
        }

        async fn list(&self, collection: &Collection) -> Result<Vec<ServerRecord>, AppError> {
            let rows = self.inner.list(collection).await?;
            self.listed.notify_one();
            self.release.notified().await;
            Ok(rows)
        }

        async fn subscribe(&self, collection: &Collection) -> Result<RemoteFeed, AppError> {
            self.inner.subscribe(collection).await
        }
    }

    #[tokio::test]
    async fn refresh_keeps_messages_reconciled_while_loading() {
        let remote = Arc::new(HeldListing {
            inner: Arc::new(InMemoryRemoteStore::new()),
            listed: Notify::new(),
            release: Notify::new(),
        });
        let chat = Arc::new(ChatService::new(
            club(),
            user("user-a"),
            MemberRole::Member,
            ProjectionView::new(ChatService::messages_collection(&club())),
            reconciler(remote.clone()),
            ChatConfig::default(),
        ));

        let refreshing = {
            let chat = chat.clone();
            tokio::spawn(async move { chat.refresh().await })
        };
        remote.listed.notified().await;

        let outcome = chat
            .send_message(ChatMessageDraft::text("sent while loading"))
            .await
            .expect("send");
        assert!(outcome.is_success());
        remote.release.notify_one();

        assert_eq!(refreshing.await.expect("join").expect("refresh"), 0);
        let messages = chat.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "sent while loading");
        assert!(!messages[0].is_pending);
    }

    #[tokio::test]
    async fn live_updates_from_other_members_appear() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let chat = service(remote.clone(), MemberRole::Member);

        let handle = chat.attach_live().await.expect("attach");
        let mut revisions = chat.view.watch();
        remote
            .insert_from_other_actor(
                &ChatService::messages_collection(&club()),
                &user("user-b"),
                RecordPayload::empty().with("text", Value::String("hey".to_string())),
            )
            .await
            .expect("insert");

        revisions.changed().await.expect("revision");
        let messages = chat.messages().await;
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].is_mine(&user("user-a")));
        handle.unsubscribe();
    }
}
