//! Boundary normalization of backend rows.
//!
//! Rows come back from the hosted backend in several shapes depending on the
//! table and on which optional columns were selected: ids as numbers or
//! strings, `created_at` or `inserted_at`, RFC 3339 strings or epoch
//! milliseconds, owner columns named `owner_id`, `user_id` or `author_id`, or
//! an embedded `profile` object. Everything is folded into [`ServerRecord`]
//! here so the rest of the crate only ever sees one shape.

use crate::domain::entities::ServerRecord;
use crate::domain::value_objects::{OwnerRef, RecordId, RecordPayload};
use crate::shared::error::AppError;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

const ID_KEY: &str = "id";
const TIMESTAMP_KEYS: [&str; 3] = ["created_at", "inserted_at", "createdAt"];
const OWNER_KEYS: [&str; 3] = ["owner_id", "user_id", "author_id"];
const PROFILE_KEYS: [&str; 2] = ["profile", "profiles"];

pub fn normalize_row(value: &Value) -> Result<ServerRecord, AppError> {
    let Value::Object(map) = value else {
        return Err(AppError::DeserializationError(
            "Remote row must be a JSON object".to_string(),
        ));
    };

    let id = parse_id(map)?;
    let created_at = parse_created_at(map)?;
    let owner = parse_owner(map)?;

    let fields: Map<String, Value> = map
        .iter()
        .filter(|(key, _)| {
            let key = key.as_str();
            key != ID_KEY && !TIMESTAMP_KEYS.contains(&key) && !OWNER_KEYS.contains(&key)
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let mut record = ServerRecord::new(id, created_at, RecordPayload::from_map(fields));
    if let Some(owner) = owner {
        record = record.with_owner(owner);
    }
    Ok(record)
}

pub fn normalize_rows(values: &[Value]) -> Result<Vec<ServerRecord>, AppError> {
    values.iter().map(normalize_row).collect()
}

fn parse_id(map: &Map<String, Value>) -> Result<RecordId, AppError> {
    let raw = match map.get(ID_KEY) {
        Some(Value::String(value)) => value.clone(),
        Some(Value::Number(value)) => value.to_string(),
        Some(other) => {
            return Err(AppError::DeserializationError(format!(
                "Unsupported id value: {other}"
            )));
        }
        None => {
            return Err(AppError::DeserializationError(
                "Remote row is missing `id`".to_string(),
            ));
        }
    };
    RecordId::authoritative(&raw).map_err(AppError::InvalidInput)
}

fn parse_created_at(map: &Map<String, Value>) -> Result<DateTime<Utc>, AppError> {
    let value = TIMESTAMP_KEYS
        .iter()
        .find_map(|key| map.get(*key).filter(|value| !value.is_null()))
        .ok_or_else(|| {
            AppError::DeserializationError("Remote row is missing a creation timestamp".to_string())
        })?;

    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|err| {
                AppError::DeserializationError(format!("Invalid timestamp `{text}`: {err}"))
            }),
        Value::Number(number) => number
            .as_i64()
            .and_then(millis_to_datetime)
            .ok_or_else(|| {
                AppError::DeserializationError(format!("Invalid epoch timestamp: {number}"))
            }),
        other => Err(AppError::DeserializationError(format!(
            "Unsupported timestamp value: {other}"
        ))),
    }
}

fn parse_owner(map: &Map<String, Value>) -> Result<Option<OwnerRef>, AppError> {
    let flat = OWNER_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(value_as_id));
    let nested = || {
        PROFILE_KEYS.iter().find_map(|key| {
            map.get(*key)
                .and_then(|profile| profile.get(ID_KEY))
                .and_then(value_as_id)
        })
    };

    match flat.or_else(nested) {
        Some(raw) => OwnerRef::new(raw)
            .map(Some)
            .map_err(AppError::InvalidInput),
        None => Ok(None),
    }
}

fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
