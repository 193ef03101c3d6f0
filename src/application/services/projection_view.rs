use crate::domain::entities::DomainRecord;
use crate::domain::projection::LocalProjectionStore;
use crate::domain::value_objects::{Collection, RecordId};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, watch};

/// Shared handle to one view's projection store.
///
/// All mutations go through [`mutate`](Self::mutate), which publishes the new
/// store revision on a watch channel so the rendering side knows to redraw.
#[derive(Clone)]
pub struct ProjectionView {
    collection: Collection,
    store: Arc<RwLock<LocalProjectionStore>>,
    revisions: Arc<watch::Sender<u64>>,
}

impl ProjectionView {
    pub fn new(collection: Collection) -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            collection,
            store: Arc::new(RwLock::new(LocalProjectionStore::new())),
            revisions: Arc::new(tx),
        }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, LocalProjectionStore> {
        self.store.read().await
    }

    pub async fn mutate<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut LocalProjectionStore) -> R,
    {
        let mut store = self.store.write().await;
        let before = store.revision();
        let result = f(&mut store);
        let after = store.revision();
        drop(store);

        if after != before {
            self.revisions.send_replace(after);
        }
        result
    }

    /// Receiver that changes whenever the store is effectively mutated.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.revisions.subscribe()
    }

    pub async fn records(&self) -> Vec<DomainRecord> {
        self.read().await.snapshot().to_vec()
    }

    pub async fn render<T, F>(&self, f: F) -> Vec<T>
    where
        F: Fn(&DomainRecord) -> T,
    {
        let store = self.read().await;
        store.snapshot().iter().map(f).collect()
    }

    pub async fn get(&self, id: &RecordId) -> Option<DomainRecord> {
        self.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.mutate(|store| store.clear()).await;
    }
}

impl std::fmt::Debug for ProjectionView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionView")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}
