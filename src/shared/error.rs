use crate::shared::validation::ValidationFailureKind;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Network(String),
    Timeout(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    InvalidInput(String),
    ValidationError {
        kind: ValidationFailureKind,
        message: String,
    },
    ConfigurationError(String),
    SerializationError(String),
    DeserializationError(String),
    SessionClosed,
    Internal(String),
}

impl AppError {
    pub fn validation(kind: ValidationFailureKind, message: impl Into<String>) -> Self {
        AppError::ValidationError {
            kind,
            message: message.into(),
        }
    }

    pub fn validation_kind(&self) -> Option<ValidationFailureKind> {
        match self {
            AppError::ValidationError { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Network-class failures that a caller may retry as-is.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Network(_) | AppError::Timeout(_))
    }

    /// Short text suitable for a toast. Never exposes the raw error.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(_) | AppError::Timeout(_) => {
                "Failed to send, try again.".to_string()
            }
            AppError::ValidationError { message, .. } => message.clone(),
            AppError::Unauthorized(_) => "You are not allowed to do that.".to_string(),
            AppError::NotFound(_) => "That item no longer exists.".to_string(),
            AppError::Conflict(_) => "That change conflicts with a newer one.".to_string(),
            AppError::SessionClosed => "You have been signed out.".to_string(),
            _ => "Something went wrong.".to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Network(msg) => write!(f, "Network error: {}", msg),
            AppError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::ValidationError { kind, message } => {
                write!(f, "Validation error ({}): {}", kind, message)
            }
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppError::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            AppError::SessionClosed => write!(f, "Session closed"),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Internal(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        AppError::Timeout(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_hides_raw_transport_detail() {
        let err = AppError::Network("connection reset by peer (os error 104)".to_string());
        assert!(err.is_transient());
        assert_eq!(err.user_message(), "Failed to send, try again.");
    }

    #[test]
    fn validation_message_is_relayed() {
        let err = AppError::validation(
            ValidationFailureKind::ContentRejected,
            "Message contains blocked words",
        );
        assert!(!err.is_transient());
        assert_eq!(
            err.validation_kind(),
            Some(ValidationFailureKind::ContentRejected)
        );
        assert_eq!(err.user_message(), "Message contains blocked words");
    }
}
