use crate::domain::value_objects::{OwnerRef, RecordId, RecordPayload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record as rendered by a view. Provisional records carry a temporary id
/// and a locally stamped `created_at` until the remote write is confirmed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainRecord {
    pub id: RecordId,
    pub is_provisional: bool,
    pub created_at: DateTime<Utc>,
    pub payload: RecordPayload,
    /// `None` for rows the backend returned without an owner column (system
    /// messages, imports). Such records belong to nobody.
    pub owner: Option<OwnerRef>,
}

impl DomainRecord {
    pub fn provisional(id: RecordId, owner: OwnerRef, payload: RecordPayload) -> Self {
        Self {
            id,
            is_provisional: true,
            created_at: Utc::now(),
            payload,
            owner: Some(owner),
        }
    }

    pub fn is_owned_by(&self, owner: &OwnerRef) -> bool {
        self.owner.as_ref() == Some(owner)
    }

    /// Builds the authoritative version of this record. Server fields win,
    /// everything the server did not return (client hints included) is kept.
    pub fn promoted(&self, confirmed: &ServerRecord) -> DomainRecord {
        DomainRecord {
            id: confirmed.id.clone(),
            is_provisional: false,
            created_at: confirmed.created_at,
            payload: self.payload.merged_with(&confirmed.fields),
            owner: confirmed.owner.clone().or_else(|| self.owner.clone()),
        }
    }

    /// Applies a pushed update from the remote store onto an existing record.
    pub fn apply_remote(&mut self, update: &ServerRecord) {
        self.payload.merge_from(&update.fields);
        self.created_at = update.created_at;
        if let Some(owner) = &update.owner {
            self.owner = Some(owner.clone());
        }
    }
}

/// Canonical authoritative row, produced by boundary normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerRecord {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
    pub owner: Option<OwnerRef>,
    pub fields: RecordPayload,
}

impl ServerRecord {
    pub fn new(id: RecordId, created_at: DateTime<Utc>, fields: RecordPayload) -> Self {
        Self {
            id,
            created_at,
            owner: None,
            fields,
        }
    }

    pub fn with_owner(mut self, owner: OwnerRef) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Converts a fetched or pushed row into a renderable record.
    pub fn into_domain_record(self) -> DomainRecord {
        DomainRecord {
            id: self.id,
            is_provisional: false,
            created_at: self.created_at,
            payload: self.fields,
            owner: self.owner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn owner(value: &str) -> OwnerRef {
        OwnerRef::parse(value).unwrap()
    }

    #[test]
    fn promotion_takes_server_identity_and_keeps_local_fields() {
        let local = DomainRecord::provisional(
            RecordId::parse("temp_1").unwrap(),
            owner("user-a"),
            RecordPayload::new(json!({"text": "hello", "local_preview_url": "blob:1"})).unwrap(),
        );
        let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let confirmed = ServerRecord::new(
            RecordId::parse("srv_99").unwrap(),
            created_at,
            RecordPayload::new(json!({"text": "hello"})).unwrap(),
        );

        let promoted = local.promoted(&confirmed);
        assert_eq!(promoted.id.as_str(), "srv_99");
        assert!(!promoted.is_provisional);
        assert_eq!(promoted.created_at, created_at);
        assert_eq!(promoted.owner, Some(owner("user-a")));
        assert_eq!(promoted.payload.get_str("local_preview_url"), Some("blob:1"));
    }

    #[test]
    fn ownerless_rows_belong_to_nobody() {
        let row = ServerRecord::new(
            RecordId::parse("sys_1").unwrap(),
            Utc::now(),
            RecordPayload::empty(),
        );
        let record = row.into_domain_record();
        assert_eq!(record.owner, None);
        assert!(!record.is_owned_by(&owner("user-a")));
        assert!(!record.is_provisional);
    }
}
