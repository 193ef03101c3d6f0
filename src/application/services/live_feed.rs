use crate::application::ports::{RemoteEvent, RemoteFeed, RemoteStore};
use crate::application::services::projection_view::ProjectionView;
use crate::domain::projection::MergeOutcome;
use crate::domain::value_objects::Collection;
use crate::shared::error::AppError;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Cancellable realtime subscription bound to one view.
///
/// Dropping the handle aborts the pump task, so no handler keeps mutating a
/// view that is no longer rendered.
#[derive(Debug)]
pub struct SubscriptionHandle {
    collection: Collection,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn unsubscribe(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(collection = %self.collection, "Realtime subscription closed");
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

pub struct LiveFeed;

impl LiveFeed {
    /// Subscribes to the view's collection and merges every pushed change
    /// into it. Rows already present (by id) are updated, never duplicated.
    pub async fn attach(
        remote: &Arc<dyn RemoteStore>,
        view: ProjectionView,
    ) -> Result<SubscriptionHandle, AppError> {
        let collection = view.collection().clone();
        let feed = remote.subscribe(&collection).await?;
        info!(collection = %collection, "Realtime subscription opened");

        let task = tokio::spawn(pump(feed, view));
        Ok(SubscriptionHandle {
            collection,
            task: Some(task),
        })
    }
}

async fn pump(mut feed: RemoteFeed, view: ProjectionView) {
    while let Some(event) = feed.next().await {
        apply_event(&view, event).await;
    }
    debug!(collection = %view.collection(), "Realtime feed ended");
}

pub(crate) async fn apply_event(view: &ProjectionView, event: RemoteEvent) {
    match event {
        RemoteEvent::Inserted(row) | RemoteEvent::Updated(row) => {
            let record_id = row.id.clone();
            let outcome = view
                .mutate(|store| store.merge_remote(row))
                .await;
            match outcome {
                MergeOutcome::Inserted { index } => {
                    debug!(record_id = %record_id, index, "Remote record inserted")
                }
                MergeOutcome::Updated { index } => {
                    debug!(record_id = %record_id, index, "Remote record updated")
                }
            }
        }
        RemoteEvent::Deleted(id) => {
            if view.mutate(|store| store.remove(&id)).await.is_some() {
                debug!(record_id = %id, "Remote record removed");
            }
        }
    }
}
