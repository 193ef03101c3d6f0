use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote table / realtime channel a projection mirrors, e.g. `club_messages:42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Collection(String);

impl Collection {
    pub fn new(value: String) -> Result<Self, String> {
        Self::validate(&value)?;
        Ok(Self(value))
    }

    /// A collection scoped to one club (`<table>:<club id>`).
    pub fn scoped(table: &str, club: &ClubId) -> Self {
        Self(format!("{table}:{}", club.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn table(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }

    fn validate(value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            return Err("Collection name cannot be empty".to_string());
        }
        if value.chars().any(char::is_whitespace) {
            return Err(format!("Collection name must not contain whitespace: {value}"));
        }
        Ok(())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClubId(String);

impl ClubId {
    pub fn new(value: String) -> Result<Self, String> {
        if value.trim().is_empty() {
            return Err("Club ID cannot be empty".to_string());
        }
        if value.contains(':') {
            return Err(format!("Club ID must not contain ':': {value}"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_collection_keeps_table_name() {
        let club = ClubId::new("42".to_string()).unwrap();
        let collection = Collection::scoped("club_messages", &club);
        assert_eq!(collection.as_str(), "club_messages:42");
        assert_eq!(collection.table(), "club_messages");
    }

    #[test]
    fn invalid_names_are_rejected() {
        assert!(Collection::new("club messages".to_string()).is_err());
        assert!(ClubId::new("a:b".to_string()).is_err());
    }
}
