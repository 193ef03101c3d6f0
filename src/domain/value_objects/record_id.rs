use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// 仮 ID の予約プレフィックス。リモートストアはこの形式の ID を発行しない。
pub const TEMP_ID_PREFIX: &str = "temp_";

/// Identifier of a record in a local projection: either a locally minted
/// temporary id (`temp_...`) or an authoritative id issued by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(value: String) -> Result<Self, String> {
        Self::validate(&value)?;
        Ok(Self(value))
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        Self::validate(value)?;
        Ok(Self(value.to_string()))
    }

    /// Parses an id that must have been issued by the remote store.
    pub fn authoritative(value: &str) -> Result<Self, String> {
        let id = Self::parse(value)?;
        if id.is_temporary() {
            return Err(format!(
                "Remote identifier must not use the reserved prefix `{TEMP_ID_PREFIX}`: {value}"
            ));
        }
        Ok(id)
    }

    pub(crate) fn temporary(suffix: &str) -> Self {
        Self(format!("{TEMP_ID_PREFIX}{suffix}"))
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_ID_PREFIX) && self.0.len() > TEMP_ID_PREFIX.len()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            return Err("Record ID cannot be empty".to_string());
        }
        Ok(())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl FromStr for RecordId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
