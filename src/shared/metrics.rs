use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const UNSET_TS: u64 = 0;

#[derive(Debug)]
pub struct AtomicMetric {
    success: AtomicU64,
    failure: AtomicU64,
    last_success_ms: AtomicU64,
    last_failure_ms: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct AtomicSnapshot {
    pub successes: u64,
    pub failures: u64,
    pub last_success_ms: Option<u64>,
    pub last_failure_ms: Option<u64>,
}

impl AtomicMetric {
    pub const fn new() -> Self {
        Self {
            success: AtomicU64::new(0),
            failure: AtomicU64::new(0),
            last_success_ms: AtomicU64::new(UNSET_TS),
            last_failure_ms: AtomicU64::new(UNSET_TS),
        }
    }

    pub fn record_success(&self) {
        self.success.fetch_add(1, Ordering::Relaxed);
        self.last_success_ms
            .store(current_unix_ms(), Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failure.fetch_add(1, Ordering::Relaxed);
        self.last_failure_ms
            .store(current_unix_ms(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AtomicSnapshot {
        AtomicSnapshot {
            successes: self.success.load(Ordering::Relaxed),
            failures: self.failure.load(Ordering::Relaxed),
            last_success_ms: timestamp_to_option(self.last_success_ms.load(Ordering::Relaxed)),
            last_failure_ms: timestamp_to_option(self.last_failure_ms.load(Ordering::Relaxed)),
        }
    }

    pub fn reset(&self) {
        self.success.store(0, Ordering::Relaxed);
        self.failure.store(0, Ordering::Relaxed);
        self.last_success_ms.store(UNSET_TS, Ordering::Relaxed);
        self.last_failure_ms.store(UNSET_TS, Ordering::Relaxed);
    }
}

impl Default for AtomicMetric {
    fn default() -> Self {
        Self::new()
    }
}

/// 楽観的更新の確定・ロールバック件数。
#[derive(Debug, Default)]
pub struct ReconcilerMetrics {
    writes: AtomicMetric,
    deletes: AtomicMetric,
    rollbacks: AtomicU64,
    retries: AtomicU64,
    duplicates: AtomicU64,
    stale_responses: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ReconcilerMetricsSnapshot {
    pub writes: AtomicSnapshot,
    pub deletes: AtomicSnapshot,
    pub rollbacks: u64,
    pub retries: u64,
    pub duplicates: u64,
    pub stale_responses: u64,
}

impl ReconcilerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_write_success(&self) {
        self.writes.record_success();
    }

    pub fn record_write_failure(&self) {
        self.writes.record_failure();
    }

    pub fn record_delete_success(&self) {
        self.deletes.record_success();
    }

    pub fn record_delete_failure(&self) {
        self.deletes.record_failure();
    }

    pub fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.stale_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ReconcilerMetricsSnapshot {
        ReconcilerMetricsSnapshot {
            writes: self.writes.snapshot(),
            deletes: self.deletes.snapshot(),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            stale_responses: self.stale_responses.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.writes.reset();
        self.deletes.reset();
        self.rollbacks.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.duplicates.store(0, Ordering::Relaxed);
        self.stale_responses.store(0, Ordering::Relaxed);
    }
}

#[inline]
pub fn current_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(UNSET_TS)
}

#[inline]
pub fn timestamp_to_option(value: u64) -> Option<u64> {
    if value == UNSET_TS { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_and_reset() {
        let metrics = ReconcilerMetrics::new();
        metrics.record_write_success();
        metrics.record_write_failure();
        metrics.record_rollback();
        metrics.record_retry();
        metrics.record_retry();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.writes.successes, 1);
        assert_eq!(snapshot.writes.failures, 1);
        assert!(snapshot.writes.last_success_ms.is_some());
        assert_eq!(snapshot.rollbacks, 1);
        assert_eq!(snapshot.retries, 2);

        metrics.reset();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.writes.successes, 0);
        assert_eq!(snapshot.writes.last_success_ms, None);
        assert_eq!(snapshot.retries, 0);
    }
}
