use crate::domain::entities::ServerRecord;
use crate::domain::value_objects::{Collection, OwnerRef, RecordId, RecordPayload};
use crate::shared::error::AppError;
use crate::shared::validation::ValidationFailureKind;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Error)]
pub enum WriteFailure {
    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Write timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rejected ({kind}): {message}")]
    Rejected {
        kind: ValidationFailureKind,
        message: String,
    },

    /// Unique-constraint violation. `existing` is the row already stored, when
    /// the backend returns it.
    #[error("Duplicate write")]
    Duplicate { existing: Option<ServerRecord> },

    #[error("Record not found: {0}")]
    NotFound(String),
}

impl WriteFailure {
    pub fn rejected(kind: ValidationFailureKind, message: impl Into<String>) -> Self {
        WriteFailure::Rejected {
            kind,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, WriteFailure::Transient(_) | WriteFailure::Timeout(_))
    }
}

impl From<WriteFailure> for AppError {
    fn from(err: WriteFailure) -> Self {
        match err {
            WriteFailure::Transient(msg) => AppError::Network(msg),
            WriteFailure::Timeout(after) => AppError::Timeout(format!("no response after {after:?}")),
            WriteFailure::Rejected { kind, message } => AppError::ValidationError { kind, message },
            WriteFailure::Duplicate { .. } => AppError::Conflict("duplicate write".to_string()),
            WriteFailure::NotFound(msg) => AppError::NotFound(msg),
        }
    }
}

/// Realtime change pushed by the backend for one collection.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    Inserted(ServerRecord),
    Updated(ServerRecord),
    Deleted(RecordId),
}

/// Receiving end of a realtime channel. Dropping it closes the channel.
#[derive(Debug)]
pub struct RemoteFeed {
    receiver: mpsc::UnboundedReceiver<RemoteEvent>,
}

impl RemoteFeed {
    pub fn new(receiver: mpsc::UnboundedReceiver<RemoteEvent>) -> Self {
        Self { receiver }
    }

    pub fn channel() -> (mpsc::UnboundedSender<RemoteEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx))
    }

    pub async fn next(&mut self) -> Option<RemoteEvent> {
        self.receiver.recv().await
    }
}

/// バックエンド（認証・テーブル・リアルタイム）を抽象化したポート。
///
/// 実装はサーバーから受け取った行を境界で [`ServerRecord`] に正規化して返す。
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Durable create. Only server fields are passed; client hints stay local.
    async fn write(
        &self,
        collection: &Collection,
        owner: &OwnerRef,
        fields: &RecordPayload,
    ) -> Result<ServerRecord, WriteFailure>;

    /// Durable delete of an already reconciled record.
    async fn delete(&self, collection: &Collection, id: &RecordId) -> Result<(), WriteFailure>;

    /// Current rows of a collection, in server order.
    async fn list(&self, collection: &Collection) -> Result<Vec<ServerRecord>, AppError>;

    /// Opens a realtime channel for rows written by other actors.
    async fn subscribe(&self, collection: &Collection) -> Result<RemoteFeed, AppError>;
}
