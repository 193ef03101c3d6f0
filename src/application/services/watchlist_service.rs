use crate::application::services::projection_view::ProjectionView;
use crate::application::services::reconciler::{ReconcileOutcome, Reconciler};
use crate::domain::entities::film::FIELD_FILM_ID;
use crate::domain::entities::{DomainRecord, FilmRef, WatchlistEntry};
use crate::domain::value_objects::{Collection, OwnerRef, RecordId};
use crate::shared::{AppError, ValidationFailureKind};
use tracing::debug;

pub const WATCHLIST_TABLE: &str = "watchlist";

/// 個人のウォッチリスト。追加は冪等（既に登録済みなら成功扱い）。
pub struct WatchlistService {
    owner: OwnerRef,
    view: ProjectionView,
    reconciler: Reconciler,
}

impl WatchlistService {
    pub fn new(owner: OwnerRef, view: ProjectionView, reconciler: Reconciler) -> Self {
        Self {
            owner,
            view,
            reconciler,
        }
    }

    pub fn collection(owner: &OwnerRef) -> Result<Collection, AppError> {
        Collection::new(format!("{WATCHLIST_TABLE}:{owner}")).map_err(AppError::InvalidInput)
    }

    pub fn view(&self) -> &ProjectionView {
        &self.view
    }

    /// Adds `film`. An entry that is already saved is returned as is, and a
    /// unique-key conflict from the backend counts as success.
    pub async fn add(&self, film: FilmRef) -> Result<ReconcileOutcome, AppError> {
        film.validate()
            .map_err(|message| AppError::validation(ValidationFailureKind::Generic, message))?;

        if let Some(existing) = self.find_film(film.film_id.trim()).await {
            if existing.is_provisional {
                return Err(AppError::validation(
                    ValidationFailureKind::ProvisionalRecord,
                    "This film is already being added.",
                ));
            }
            debug!(film_id = %film.film_id, "Film already on watchlist");
            return Ok(ReconcileOutcome::Reconciled(existing));
        }

        self.reconciler
            .submit(&self.view, &self.owner, film.to_payload(), None)
            .await
    }

    pub async fn remove(&self, id: &RecordId) -> Result<(), AppError> {
        self.reconciler.delete(&self.view, id).await
    }

    pub async fn entries(&self) -> Vec<WatchlistEntry> {
        self.view.render(|record| WatchlistEntry::from(record)).await
    }

    pub async fn contains(&self, film_id: &str) -> bool {
        self.find_film(film_id).await.is_some()
    }

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
        Ok(count)
    }

    async fn find_film(&self, film_id: &str) -> Option<DomainRecord> {
        let store = self.view.read().await;
        store
            .snapshot()
            .iter()
            .find(|record| record.payload.get_str(FIELD_FILM_ID) == Some(film_id))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::reconciler::RetryPolicy;
    use crate::domain::projection::PendingWriteTracker;
    use crate::domain::value_objects::RecordPayload;
    use crate::infrastructure::remote::InMemoryRemoteStore;
    use crate::shared::ReconcilerMetrics;
    use serde_json::Value;
    use std::sync::Arc;

    fn owner() -> OwnerRef {
        OwnerRef::parse("user-a").unwrap()
    }

    async fn remote() -> Arc<InMemoryRemoteStore> {
        Arc::new(
            InMemoryRemoteStore::new()
                .with_unique_key(WATCHLIST_TABLE, &["user_id", "film_id"])
                .await,
        )
    }

    fn service(remote: Arc<InMemoryRemoteStore>) -> WatchlistService {
        let reconciler = Reconciler::new(
            remote,
            Arc::new(PendingWriteTracker::new()),
            None,
            RetryPolicy::default(),
            Arc::new(ReconcilerMetrics::new()),
        );
        let view = ProjectionView::new(WatchlistService::collection(&owner()).unwrap());
        WatchlistService::new(owner(), view, reconciler)
    }

    #[tokio::test]
    async fn adding_twice_keeps_one_entry() {
        let remote = remote().await;
        let watchlist = service(remote.clone());

        let first = watchlist
            .add(FilmRef::new("603", "The Matrix"))
            .await
            .expect("add");
        let second = watchlist
            .add(FilmRef::new("603", "The Matrix"))
            .await
            .expect("add again");

        assert_eq!(first.record(), second.record());
        assert_eq!(watchlist.entries().await.len(), 1);
        let collection = WatchlistService::collection(&owner()).unwrap();
        assert_eq!(remote.row_count(&collection).await, 1);
    }

    #[tokio::test]
    async fn duplicate_from_another_device_counts_as_success() {
        let remote = remote().await;
        let collection = WatchlistService::collection(&owner()).unwrap();
        let saved = remote
            .insert_from_other_actor(
                &collection,
                &owner(),
                RecordPayload::empty().with(FIELD_FILM_ID, Value::String("603".to_string())),
            )
            .await
            .expect("insert");
        let watchlist = service(remote.clone());

        let outcome = watchlist
            .add(FilmRef::new("603", "The Matrix"))
            .await
            .expect("add");

        assert!(outcome.is_success());
        assert_eq!(outcome.record().map(|r| &r.id), Some(&saved.id));
        assert_eq!(watchlist.entries().await.len(), 1);
        assert_eq!(remote.row_count(&collection).await, 1);
    }

    #[tokio::test]
    async fn remove_is_optimistic() {
        let remote = remote().await;
        let watchlist = service(remote);
        let outcome = watchlist
            .add(FilmRef::new("13", "Forrest Gump"))
            .await
            .expect("add");
        let id = outcome.record().expect("reconciled").id.clone();

        watchlist.remove(&id).await.expect("remove");
        assert!(!watchlist.contains("13").await);
    }
}
