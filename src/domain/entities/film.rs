use crate::domain::entities::DomainRecord;
use crate::domain::value_objects::{OwnerRef, RecordId, RecordPayload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const FIELD_FILM_ID: &str = "film_id";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_NOTE: &str = "note";
pub const FIELD_POSTER_URL: &str = "local_poster_url";

/// Film reference as picked from search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilmRef {
    pub film_id: String,
    pub title: String,
    pub poster_url: Option<String>,
}

impl FilmRef {
    pub fn new(film_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            film_id: film_id.into(),
            title: title.into(),
            poster_url: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.film_id.trim().is_empty() {
            return Err("Film ID is required".to_string());
        }
        Ok(())
    }

    pub fn to_payload(&self) -> RecordPayload {
        let mut payload = RecordPayload::empty()
            .with(FIELD_FILM_ID, Value::String(self.film_id.trim().to_string()))
            .with(FIELD_TITLE, Value::String(self.title.trim().to_string()));
        if let Some(poster) = &self.poster_url {
            payload.insert(FIELD_POSTER_URL, Value::String(poster.clone()));
        }
        payload
    }
}

/// クラブページに掲載される注目作品。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeaturedFilm {
    pub id: RecordId,
    pub film_id: String,
    pub title: String,
    pub note: Option<String>,
    pub featured_by: Option<OwnerRef>,
    pub featured_at: DateTime<Utc>,
    pub is_pending: bool,
}

impl From<&DomainRecord> for FeaturedFilm {
    fn from(record: &DomainRecord) -> Self {
        let payload = &record.payload;
        Self {
            id: record.id.clone(),
            film_id: payload.get_str(FIELD_FILM_ID).unwrap_or_default().to_string(),
            title: payload.get_str(FIELD_TITLE).unwrap_or_default().to_string(),
            note: payload.get_str(FIELD_NOTE).map(str::to_string),
            featured_by: record.owner.clone(),
            featured_at: record.created_at,
            is_pending: record.is_provisional,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchlistEntry {
    pub id: RecordId,
    pub film_id: String,
    pub title: String,
    pub added_at: DateTime<Utc>,
    pub is_pending: bool,
}

impl From<&DomainRecord> for WatchlistEntry {
    fn from(record: &DomainRecord) -> Self {
        let payload = &record.payload;
        Self {
            id: record.id.clone(),
            film_id: payload.get_str(FIELD_FILM_ID).unwrap_or_default().to_string(),
            title: payload.get_str(FIELD_TITLE).unwrap_or_default().to_string(),
            added_at: record.created_at,
            is_pending: record.is_provisional,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn film_payload_keeps_poster_as_client_hint() {
        let film = FilmRef {
            film_id: " 603 ".to_string(),
            title: "The Matrix".to_string(),
            poster_url: Some("https://img.example/603.jpg".to_string()),
        };
        let payload = film.to_payload();
        assert_eq!(payload.get_str(FIELD_FILM_ID), Some("603"));
        assert!(payload.server_fields().get(FIELD_POSTER_URL).is_none());
    }

    #[test]
    fn blank_film_id_is_invalid() {
        assert!(FilmRef::new("  ", "Untitled").validate().is_err());
    }
}
