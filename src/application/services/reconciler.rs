use crate::application::ports::{ActivityNotifier, RemoteStore, WriteFailure};
use crate::application::services::projection_view::ProjectionView;
use crate::domain::entities::{DomainRecord, ServerRecord};
use crate::domain::projection::{PendingKind, PendingWriteTracker, ReplaceOutcome};
use crate::domain::value_objects::{Collection, OwnerRef, RecordId, RecordPayload};
use crate::shared::config::ReconcilerConfig;
use crate::shared::error::AppError;
use crate::shared::metrics::ReconcilerMetrics;
use crate::shared::validation::ValidationFailureKind;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Transient,
    Validation,
}

/// What the user is told after a rollback. `message` is display-ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReason {
    pub class: FailureClass,
    pub kind: Option<ValidationFailureKind>,
    pub message: String,
}

impl FailureReason {
    fn from_failure(failure: &WriteFailure) -> Self {
        let class = if failure.is_transient() {
            FailureClass::Transient
        } else {
            FailureClass::Validation
        };
        let kind = match failure {
            WriteFailure::Rejected { kind, .. } => Some(*kind),
            _ => None,
        };
        Self {
            class,
            kind,
            message: AppError::from(failure.clone()).user_message(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackReport {
    pub temp_id: RecordId,
    /// Input to put back into the composer so the user can retry.
    pub restored_input: Option<String>,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Reconciled(DomainRecord),
    /// The backend already held this row and did not return it. The
    /// provisional record was dropped; the row arrives via realtime or refresh.
    AlreadyPresent { temp_id: RecordId },
    RolledBack(RollbackReport),
    /// The provisional record was gone when the response arrived.
    Stale { temp_id: RecordId },
}

impl ReconcileOutcome {
    pub fn record(&self) -> Option<&DomainRecord> {
        match self {
            ReconcileOutcome::Reconciled(record) => Some(record),
            _ => None,
        }
    }

    pub fn rollback(&self) -> Option<&RollbackReport> {
        match self {
            ReconcileOutcome::RolledBack(report) => Some(report),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::Reconciled(_) | ReconcileOutcome::AlreadyPresent { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub timeout: Duration,
}

impl From<&ReconcilerConfig> for RetryPolicy {
    fn from(config: &ReconcilerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff(),
            timeout: config.write_timeout(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ReconcilerConfig::default())
    }
}

/// Drives optimistic writes: provisional insert, remote write, then promote
/// or roll back against a [`ProjectionView`].
#[derive(Clone)]
pub struct Reconciler {
    remote: Arc<dyn RemoteStore>,
    tracker: Arc<PendingWriteTracker>,
    notifier: Option<Arc<dyn ActivityNotifier>>,
    policy: RetryPolicy,
    metrics: Arc<ReconcilerMetrics>,
    closed: Arc<AtomicBool>,
}

impl Reconciler {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        tracker: Arc<PendingWriteTracker>,
        notifier: Option<Arc<dyn ActivityNotifier>>,
        policy: RetryPolicy,
        metrics: Arc<ReconcilerMetrics>,
    ) -> Self {
        Self {
            remote,
            tracker,
            notifier,
            policy,
            metrics,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Refuses every later submit or delete, on this handle and all clones.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), AppError> {
        if self.is_closed() {
            return Err(AppError::SessionClosed);
        }
        Ok(())
    }

    pub fn tracker(&self) -> &Arc<PendingWriteTracker> {
        &self.tracker
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    pub fn metrics(&self) -> &Arc<ReconcilerMetrics> {
        &self.metrics
    }

    /// Full optimistic create. The returned outcome is always terminal; no
    /// write failure escapes as an error.
    ///
    /// A duplicate reported on a retry is our own earlier attempt whose
    /// response was lost, so it is reconciled and notified like a fresh
    /// write. A duplicate on the first attempt was written elsewhere and
    /// is not notified again.
    pub async fn submit(
        &self,
        view: &ProjectionView,
        owner: &OwnerRef,
        payload: RecordPayload,
        restore_input: Option<String>,
    ) -> Result<ReconcileOutcome, AppError> {
        self.ensure_open()?;
        let temp_id = self.tracker.mint();
        let fields = payload.server_fields();
        let record = DomainRecord::provisional(temp_id.clone(), owner.clone(), payload);

        view.mutate(|store| store.append(record)).await?;
        self.tracker.begin(&temp_id, PendingKind::Create);
        debug!(
            collection = %view.collection(),
            temp_id = %temp_id,
            "Optimistic record appended"
        );

        let collection = view.collection().clone();
        let (result, attempts) = self
            .with_retry(|| self.remote.write(&collection, owner, &fields))
            .await;

        let outcome = match result {
            Ok(row) => {
                self.metrics.record_write_success();
                self.promote(view, &temp_id, row, true).await
            }
            Err(WriteFailure::Duplicate { existing }) => {
                self.metrics.record_duplicate();
                debug!(temp_id = %temp_id, attempts, "Duplicate write treated as success");
                match existing {
                    Some(row) => self.promote(view, &temp_id, row, attempts > 1).await,
                    None => self.drop_duplicate(view, &temp_id).await,
                }
            }
            Err(failure) => {
                self.metrics.record_write_failure();
                self.roll_back(view, &temp_id, &failure, restore_input)
                    .await
            }
        };
        Ok(outcome)
    }

    /// Success transition for `temp_id`. A response for a record that was
    /// already rolled back is ignored.
    pub async fn confirm(
        &self,
        view: &ProjectionView,
        temp_id: &RecordId,
        row: ServerRecord,
    ) -> ReconcileOutcome {
        self.promote(view, temp_id, row, true).await
    }

    /// Failure transition for `temp_id`: removes the provisional record and
    /// reports what to show and restore.
    pub async fn roll_back(
        &self,
        view: &ProjectionView,
        temp_id: &RecordId,
        failure: &WriteFailure,
        restore_input: Option<String>,
    ) -> ReconcileOutcome {
        self.tracker.complete(temp_id);
        let removed = view
            .mutate(|store| {
                if store.is_provisional(temp_id) {
                    store.remove(temp_id)
                } else {
                    None
                }
            })
            .await;

        if removed.is_none() {
            self.metrics.record_stale();
            debug!(temp_id = %temp_id, "Rollback found no provisional record; ignoring");
            return ReconcileOutcome::Stale {
                temp_id: temp_id.clone(),
            };
        }

        self.metrics.record_rollback();
        warn!(
            collection = %view.collection(),
            temp_id = %temp_id,
            "Optimistic write rolled back: {}",
            failure
        );
        ReconcileOutcome::RolledBack(RollbackReport {
            temp_id: temp_id.clone(),
            restored_input: restore_input,
            reason: FailureReason::from_failure(failure),
        })
    }

    /// Optimistic delete: the record disappears at once and comes back in
    /// its old slot if the remote delete fails.
    pub async fn delete(&self, view: &ProjectionView, id: &RecordId) -> Result<(), AppError> {
        self.ensure_open()?;
        {
            let store = view.read().await;
            if self.tracker.is_provisional(id, &store) {
                return Err(AppError::validation(
                    ValidationFailureKind::ProvisionalRecord,
                    "This item is still being saved.",
                ));
            }
        }

        let Some((index, record)) = view.mutate(|store| store.remove(id)).await else {
            return Err(AppError::NotFound(format!("Record {id} is not in this view")));
        };

        self.tracker.begin(id, PendingKind::Delete);
        let collection = view.collection().clone();
        let (result, _) = self
            .with_retry(|| self.remote.delete(&collection, id))
            .await;
        self.tracker.complete(id);

        match result {
            Ok(()) | Err(WriteFailure::NotFound(_)) => {
                self.metrics.record_delete_success();
                debug!(collection = %collection, record_id = %id, "Record deleted");
                Ok(())
            }
            Err(failure) => {
                self.metrics.record_delete_failure();
                view.mutate(|store| store.restore(index, record)).await;
                warn!(
                    collection = %collection,
                    record_id = %id,
                    "Delete failed, record restored: {}",
                    failure
                );
                Err(failure.into())
            }
        }
    }

    async fn promote(
        &self,
        view: &ProjectionView,
        temp_id: &RecordId,
        row: ServerRecord,
        notify: bool,
    ) -> ReconcileOutcome {
        self.tracker.complete(temp_id);
        let promoted = view
            .mutate(|store| match store.replace(temp_id, &row) {
                ReplaceOutcome::Applied { index } => store.snapshot().get(index).cloned(),
                ReplaceOutcome::Missing => None,
            })
            .await;

        let Some(record) = promoted else {
            self.metrics.record_stale();
            debug!(
                temp_id = %temp_id,
                record_id = %row.id,
                "Late success for a record that is no longer provisional; ignoring"
            );
            return ReconcileOutcome::Stale {
                temp_id: temp_id.clone(),
            };
        };

        debug!(
            collection = %view.collection(),
            temp_id = %temp_id,
            record_id = %record.id,
            "Optimistic record reconciled"
        );
        if notify {
            self.fire_secondary_effect(view.collection().clone(), record.clone());
        }
        ReconcileOutcome::Reconciled(record)
    }

    async fn drop_duplicate(&self, view: &ProjectionView, temp_id: &RecordId) -> ReconcileOutcome {
        self.tracker.complete(temp_id);
        view.mutate(|store| store.remove(temp_id)).await;
        ReconcileOutcome::AlreadyPresent {
            temp_id: temp_id.clone(),
        }
    }

    fn fire_secondary_effect(&self, collection: Collection, record: DomainRecord) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(err) = notifier.record_activity(&collection, &record).await {
                warn!(
                    collection = %collection,
                    record_id = %record.id,
                    "Best-effort activity update failed: {}",
                    err
                );
            }
        });
    }

    /// Runs `op` with the per-attempt timeout, retrying transient failures
    /// up to the policy's attempt budget with a fixed backoff. Returns the
    /// last result and how many attempts were made.
    async fn with_retry<T, F, Fut>(&self, mut op: F) -> (Result<T, WriteFailure>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, WriteFailure>>,
    {
        let mut attempt = 1;
        loop {
            let result = match timeout(self.policy.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(WriteFailure::Timeout(self.policy.timeout)),
            };

            match result {
                Err(failure) if failure.is_transient() && attempt < self.policy.max_attempts => {
                    self.metrics.record_retry();
                    debug!(attempt, "Transient remote failure, retrying: {}", failure);
                    sleep(self.policy.backoff).await;
                    attempt += 1;
                }
                other => return (other, attempt),
            }
        }
    }
}
