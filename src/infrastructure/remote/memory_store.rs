use crate::application::ports::{RemoteEvent, RemoteFeed, RemoteStore, WriteFailure};
use crate::domain::entities::ServerRecord;
use crate::domain::value_objects::{Collection, OwnerRef, RecordId, RecordPayload};
use crate::infrastructure::remote::normalize::normalize_row;
use crate::shared::error::AppError;
use crate::shared::validation::ValidationFailureKind;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;
use uuid::Uuid;

/// Scripted behaviour for the next write or delete call, consumed in order.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Fail without touching stored rows.
    Fail(WriteFailure),
    /// Wait before handling the call normally.
    Delay(Duration),
    /// Persist the row, then report a failure (a lost response).
    CommitThenFail(WriteFailure),
}

#[derive(Default)]
struct StoreState {
    rows: HashMap<Collection, Vec<Value>>,
    unique_keys: HashMap<String, Vec<String>>,
    blocked_words: Vec<String>,
    subscribers: HashMap<Collection, Vec<mpsc::UnboundedSender<RemoteEvent>>>,
    script: VecDeque<ScriptedResponse>,
}

/// In-process backend with realtime fan-out, unique constraints and a
/// content filter. Rows are kept in the raw shape the hosted backend returns
/// and go through boundary normalization on the way out.
#[derive(Default)]
pub struct InMemoryRemoteStore {
    state: Mutex<StoreState>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a unique constraint over `columns` for every collection of `table`.
    pub async fn with_unique_key(self, table: &str, columns: &[&str]) -> Self {
        self.state.lock().await.unique_keys.insert(
            table.to_string(),
            columns.iter().map(|column| column.to_string()).collect(),
        );
        self
    }

    /// Rejects writes whose text fields contain `word` (case-insensitive).
    pub async fn block_word(&self, word: &str) {
        self.state
            .lock()
            .await
            .blocked_words
            .push(word.to_lowercase());
    }

    pub async fn script(&self, response: ScriptedResponse) {
        self.state.lock().await.script.push_back(response);
    }

    pub async fn row_count(&self, collection: &Collection) -> usize {
        self.state
            .lock()
            .await
            .rows
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Simulates a row created in another session; it is pushed to
    /// subscribers like any other insert.
    pub async fn insert_from_other_actor(
        &self,
        collection: &Collection,
        owner: &OwnerRef,
        fields: RecordPayload,
    ) -> Result<ServerRecord, AppError> {
        let mut state = self.state.lock().await;
        let raw = build_row(Some(owner), &fields);
        let record = normalize_row(&raw)?;
        state.rows.entry(collection.clone()).or_default().push(raw);
        broadcast(&mut state, collection, RemoteEvent::Inserted(record.clone()));
        Ok(record)
    }

    /// Simulates a row the backend writes on its own (join notices, imports).
    /// It carries no `user_id` column.
    pub async fn insert_system_row(
        &self,
        collection: &Collection,
        fields: RecordPayload,
    ) -> Result<ServerRecord, AppError> {
        let mut state = self.state.lock().await;
        let raw = build_row(None, &fields);
        let record = normalize_row(&raw)?;
        state.rows.entry(collection.clone()).or_default().push(raw);
        broadcast(&mut state, collection, RemoteEvent::Inserted(record.clone()));
        Ok(record)
    }

    async fn next_script(&self) -> Option<ScriptedResponse> {
        loop {
            let next = self.state.lock().await.script.pop_front();
            match next {
                Some(ScriptedResponse::Delay(delay)) => tokio::time::sleep(delay).await,
                other => return other,
            }
        }
    }

    fn find_duplicate(
        state: &StoreState,
        collection: &Collection,
        owner: &OwnerRef,
        fields: &RecordPayload,
    ) -> Option<Value> {
        let columns = state.unique_keys.get(collection.table())?;
        let candidate = build_row(Some(owner), fields);
        state.rows.get(collection)?.iter().find(|existing| {
            columns
                .iter()
                .all(|column| existing.get(column) == candidate.get(column))
        })
        .cloned()
    }

    fn check_content(state: &StoreState, fields: &RecordPayload) -> Result<(), WriteFailure> {
        for value in fields.as_map().values() {
            let Some(text) = value.as_str() else {
                continue;
            };
            let lowered = text.to_lowercase();
            if state
                .blocked_words
                .iter()
                .any(|word| lowered.contains(word.as_str()))
            {
                return Err(WriteFailure::rejected(
                    ValidationFailureKind::ContentRejected,
                    "Your message was blocked by the content filter.",
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn write(
        &self,
        collection: &Collection,
        owner: &OwnerRef,
        fields: &RecordPayload,
    ) -> Result<ServerRecord, WriteFailure> {
        let scripted = self.next_script().await;
        if let Some(ScriptedResponse::Fail(failure)) = scripted {
            return Err(failure);
        }

        let mut state = self.state.lock().await;
        Self::check_content(&state, fields)?;

        if let Some(existing) = Self::find_duplicate(&state, collection, owner, fields) {
            debug!(collection = %collection, "Unique constraint violated");
            return Err(WriteFailure::Duplicate {
                existing: normalize_row(&existing).ok(),
            });
        }

        let raw = build_row(Some(owner), fields);
        let record = normalize_row(&raw).map_err(|err| WriteFailure::Transient(err.to_string()))?;
        state.rows.entry(collection.clone()).or_default().push(raw);
        broadcast(&mut state, collection, RemoteEvent::Inserted(record.clone()));

        match scripted {
            Some(ScriptedResponse::CommitThenFail(failure)) => Err(failure),
            _ => Ok(record),
        }
    }

    async fn delete(&self, collection: &Collection, id: &RecordId) -> Result<(), WriteFailure> {
        let scripted = self.next_script().await;
        if let Some(ScriptedResponse::Fail(failure)) = scripted {
            return Err(failure);
        }

        let mut state = self.state.lock().await;
        let rows = state.rows.entry(collection.clone()).or_default();
        let Some(index) = rows
            .iter()
            .position(|row| row.get("id").and_then(Value::as_str) == Some(id.as_str()))
        else {
            return Err(WriteFailure::NotFound(id.to_string()));
        };
        rows.remove(index);
        broadcast(&mut state, collection, RemoteEvent::Deleted(id.clone()));

        match scripted {
            Some(ScriptedResponse::CommitThenFail(failure)) => Err(failure),
            _ => Ok(()),
        }
    }

    async fn list(&self, collection: &Collection) -> Result<Vec<ServerRecord>, AppError> {
        let state = self.state.lock().await;
        let mut records = match state.rows.get(collection) {
            Some(rows) => rows.iter().map(normalize_row).collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        records.sort_by_key(|record| record.created_at);
        Ok(records)
    }

    async fn subscribe(&self, collection: &Collection) -> Result<RemoteFeed, AppError> {
        let (tx, feed) = RemoteFeed::channel();
        self.state
            .lock()
            .await
            .subscribers
            .entry(collection.clone())
            .or_default()
            .push(tx);
        Ok(feed)
    }
}

fn build_row(owner: Option<&OwnerRef>, fields: &RecordPayload) -> Value {
    let mut row: Map<String, Value> = fields.server_fields().into_inner();
    row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    row.insert(
        "inserted_at".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
    if let Some(owner) = owner {
        row.insert("user_id".to_string(), Value::String(owner.to_string()));
    }
    Value::Object(row)
}

fn broadcast(state: &mut StoreState, collection: &Collection, event: RemoteEvent) {
    if let Some(subscribers) = state.subscribers.get_mut(collection) {
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection() -> Collection {
        Collection::new("watchlist:user-a".to_string()).unwrap()
    }

    fn owner() -> OwnerRef {
        OwnerRef::parse("user-a").unwrap()
    }

    fn film(id: &str) -> RecordPayload {
        RecordPayload::new(json!({"film_id": id, "local_poster_url": "blob:p"})).unwrap()
    }

    #[tokio::test]
    async fn write_normalizes_and_broadcasts() {
        let store = InMemoryRemoteStore::new();
        let mut feed = store.subscribe(&collection()).await.expect("subscribe");

        let record = store
            .write(&collection(), &owner(), &film("603"))
            .await
            .expect("write");
        assert!(!record.id.is_temporary());
        assert_eq!(record.owner, Some(owner()));
        assert!(record.fields.get("local_poster_url").is_none());

        assert_eq!(feed.next().await, Some(RemoteEvent::Inserted(record)));
    }

    #[tokio::test]
    async fn unique_key_returns_existing_row() {
        let store = InMemoryRemoteStore::new()
            .with_unique_key("watchlist", &["user_id", "film_id"])
            .await;
        let first = store
            .write(&collection(), &owner(), &film("603"))
            .await
            .expect("first write");

        match store.write(&collection(), &owner(), &film("603")).await {
            Err(WriteFailure::Duplicate { existing }) => assert_eq!(existing, Some(first)),
            other => panic!("expected duplicate, got {other:?}"),
        }
        assert_eq!(store.row_count(&collection()).await, 1);
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let store = InMemoryRemoteStore::new();
        store
            .script(ScriptedResponse::Fail(WriteFailure::Transient("down".to_string())))
            .await;
        store
            .script(ScriptedResponse::CommitThenFail(WriteFailure::Transient(
                "response lost".to_string(),
            )))
            .await;

        assert!(store.write(&collection(), &owner(), &film("1")).await.is_err());
        assert_eq!(store.row_count(&collection()).await, 0);
        assert!(store.write(&collection(), &owner(), &film("1")).await.is_err());
        assert_eq!(store.row_count(&collection()).await, 1);
        assert!(store.write(&collection(), &owner(), &film("2")).await.is_ok());
    }

    #[tokio::test]
    async fn blocked_words_are_rejected() {
        let store = InMemoryRemoteStore::new();
        store.block_word("Spoiler").await;
        let payload = RecordPayload::new(json!({"text": "big SPOILER ahead"})).unwrap();

        let err = store
            .write(&collection(), &owner(), &payload)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WriteFailure::Rejected {
                kind: ValidationFailureKind::ContentRejected,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn delete_missing_row_is_not_found() {
        let store = InMemoryRemoteStore::new();
        let record = store
            .write(&collection(), &owner(), &film("603"))
            .await
            .expect("write");

        store.delete(&collection(), &record.id).await.expect("delete");
        assert!(matches!(
            store.delete(&collection(), &record.id).await,
            Err(WriteFailure::NotFound(_))
        ));
        assert!(store.list(&collection()).await.expect("list").is_empty());
    }
}
