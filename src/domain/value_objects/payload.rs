use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys with this prefix are client-only rendering hints. They never leave the
/// device and survive promotion to the authoritative record.
pub const CLIENT_HINT_PREFIX: &str = "local_";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecordPayload(Map<String, Value>);

impl RecordPayload {
    pub fn new(value: Value) -> Result<Self, String> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err("Record payload cannot be null".to_string()),
            _ => Err("Record payload must be a JSON object".to_string()),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The part of the payload that is sent to the remote store.
    pub fn server_fields(&self) -> RecordPayload {
        Self(
            self.0
                .iter()
                .filter(|(key, _)| !key.starts_with(CLIENT_HINT_PREFIX))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }

    /// Overlays `incoming` onto this payload. Keys the incoming side does not
    /// carry are kept as they are.
    pub fn merge_from(&mut self, incoming: &RecordPayload) {
        for (key, value) in &incoming.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn merged_with(&self, incoming: &RecordPayload) -> RecordPayload {
        let mut merged = self.clone();
        merged.merge_from(incoming);
        merged
    }
}

impl From<RecordPayload> for Value {
    fn from(payload: RecordPayload) -> Self {
        Value::Object(payload.0)
    }
}
