use crate::domain::projection::LocalProjectionStore;
use crate::domain::value_objects::RecordId;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Create,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub kind: PendingKind,
    pub started_at: DateTime<Utc>,
}

/// 仮 ID の発行と、送信中の書き込みの記録。
///
/// セッション単位で 1 つだけ生成し、各ビューで共有する。
#[derive(Debug, Default)]
pub struct PendingWriteTracker {
    sequence: AtomicU64,
    in_flight: Mutex<HashMap<RecordId, PendingWrite>>,
}

impl PendingWriteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints `temp_<sequence>_<random>`. The sequence makes ids unique within
    /// the session; the random part keeps them distinct across sessions.
    pub fn mint(&self) -> RecordId {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let salt = rand::random::<u32>() & 0x00ff_ffff;
        RecordId::temporary(&format!("{sequence}_{salt:06x}"))
    }

    pub fn begin(&self, id: &RecordId, kind: PendingKind) {
        self.entries().insert(
            id.clone(),
            PendingWrite {
                kind,
                started_at: Utc::now(),
            },
        );
    }

    pub fn complete(&self, id: &RecordId) -> Option<PendingWrite> {
        self.entries().remove(id)
    }

    pub fn is_in_flight(&self, id: &RecordId) -> bool {
        self.entries().contains_key(id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.entries().len()
    }

    /// Whether `id` lacks a durable identity. Actions that hand the id to
    /// other users or to moderation (reporting, permalinks) must be gated on
    /// this returning false.
    pub fn is_provisional(&self, id: &RecordId, store: &LocalProjectionStore) -> bool {
        if id.is_temporary() || store.is_provisional(id) {
            return true;
        }
        self.entries()
            .get(id)
            .is_some_and(|pending| pending.kind == PendingKind::Create)
    }

    pub fn reset(&self) {
        self.entries().clear();
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<RecordId, PendingWrite>> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
