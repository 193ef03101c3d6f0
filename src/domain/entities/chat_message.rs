use crate::domain::entities::DomainRecord;
use crate::domain::value_objects::{OwnerRef, RecordId, RecordPayload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const FIELD_TEXT: &str = "text";
pub const FIELD_ATTACHMENT_PATH: &str = "attachment_path";
pub const FIELD_PREVIEW_URL: &str = "local_preview_url";

/// 添付ファイル（アップロード済みオブジェクトのパスと、端末内プレビュー URL）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub storage_path: String,
    pub preview_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageDraft {
    pub text: String,
    pub attachment: Option<Attachment>,
}

impl ChatMessageDraft {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }

    pub fn is_empty(&self) -> bool {
        self.trimmed_text().is_empty() && self.attachment.is_none()
    }

    pub fn to_payload(&self) -> RecordPayload {
        let mut payload = RecordPayload::empty().with(
            FIELD_TEXT,
            Value::String(self.trimmed_text().to_string()),
        );
        if let Some(attachment) = &self.attachment {
            payload.insert(
                FIELD_ATTACHMENT_PATH,
                Value::String(attachment.storage_path.clone()),
            );
            if let Some(preview) = &attachment.preview_url {
                payload.insert(FIELD_PREVIEW_URL, Value::String(preview.clone()));
            }
        }
        payload
    }
}

/// Render model of a chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: RecordId,
    pub author: Option<OwnerRef>,
    pub text: String,
    pub attachment_path: Option<String>,
    pub preview_url: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub is_pending: bool,
}

impl ChatMessage {
    pub fn is_mine(&self, viewer: &OwnerRef) -> bool {
        self.author.as_ref() == Some(viewer)
    }
}

impl From<&DomainRecord> for ChatMessage {
    fn from(record: &DomainRecord) -> Self {
        let payload = &record.payload;
        Self {
            id: record.id.clone(),
            author: record.owner.clone(),
            text: payload.get_str(FIELD_TEXT).unwrap_or_default().to_string(),
            attachment_path: payload.get_str(FIELD_ATTACHMENT_PATH).map(str::to_string),
            preview_url: payload.get_str(FIELD_PREVIEW_URL).map(str::to_string),
            sent_at: record.created_at,
            is_pending: record.is_provisional,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_payload_is_trimmed_and_carries_preview_hint() {
        let draft = ChatMessageDraft::text("  see you at 8  ").with_attachment(Attachment {
            storage_path: "chat/42/poster.png".to_string(),
            preview_url: Some("blob:poster".to_string()),
        });

        let payload = draft.to_payload();
        assert_eq!(payload.get_str(FIELD_TEXT), Some("see you at 8"));
        assert_eq!(
            payload.get_str(FIELD_ATTACHMENT_PATH),
            Some("chat/42/poster.png")
        );
        assert!(payload.server_fields().get(FIELD_PREVIEW_URL).is_none());
    }

    #[test]
    fn attachment_only_draft_is_not_empty() {
        assert!(ChatMessageDraft::text("   ").is_empty());
        let draft = ChatMessageDraft::text("").with_attachment(Attachment {
            storage_path: "chat/1/a.jpg".to_string(),
            preview_url: None,
        });
        assert!(!draft.is_empty());
    }
}
