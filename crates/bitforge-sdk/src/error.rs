//! Error types for the Bitforge SDK

use crate::capability::Capability;
use bitforge_client::{ClientError, ErrorKind};
use thiserror::Error;

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

/// SDK error types
#[derive(Error, Debug)]
pub enum SdkError {
    /// Remote call failed
    #[error(transparent)]
    Remote(#[from] ClientError),

    /// Input rejected before any remote call
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Purchase short-circuited on the local balance
    #[error("Insufficient codeBits: need {required}, have {available}")]
    InsufficientBalance { required: u64, available: u64 },

    /// Item already in the inventory
    #[error("Already owned: {0}")]
    AlreadyOwned(String),

    /// Operation needs a signed-in session
    #[error("Not signed in")]
    NotAuthenticated,

    /// Session lacks the capability
    #[error("Missing capability: {0}")]
    Forbidden(Capability),

    /// Cached value could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SdkError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SdkError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Category of this error, for view-level messaging
    pub fn kind(&self) -> ErrorKind {
        match self {
            SdkError::Remote(e) => e.kind(),
            SdkError::Validation { .. }
            | SdkError::InsufficientBalance { .. }
            | SdkError::AlreadyOwned(_) => ErrorKind::ValidationFailure,
            SdkError::NotAuthenticated | SdkError::Forbidden(_) => ErrorKind::Unauthorized,
            SdkError::Serialization(_) | SdkError::Config(_) => ErrorKind::ServerFailure,
        }
    }

    /// Short notice suitable for a transient toast
    pub fn user_message(&self) -> String {
        match self {
            SdkError::Remote(ClientError::Validation { message, .. }) if !message.is_empty() => {
                message.clone()
            }
            SdkError::Validation { message, .. } => message.clone(),
            SdkError::InsufficientBalance { required, available } => format!(
                "Not enough codeBits ({} more needed)",
                required.saturating_sub(*available)
            ),
            SdkError::AlreadyOwned(_) => "You already own this".to_string(),
            _ => match self.kind() {
                ErrorKind::NetworkFailure => "Can't reach the server, check your connection".into(),
                ErrorKind::Unauthorized => "Please sign in again".into(),
                ErrorKind::NotFound => "Not found".into(),
                ErrorKind::ValidationFailure => "Request was rejected".into(),
                ErrorKind::ServerFailure => "Something went wrong, try again later".into(),
            },
        }
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_errors_map_to_validation() {
        assert_eq!(
            SdkError::validation("name", "too short").kind(),
            ErrorKind::ValidationFailure
        );
        assert_eq!(
            SdkError::InsufficientBalance {
                required: 1200,
                available: 1000
            }
            .kind(),
            ErrorKind::ValidationFailure
        );
        assert_eq!(SdkError::NotAuthenticated.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_user_message() {
        let err = SdkError::InsufficientBalance {
            required: 1200,
            available: 1000,
        };
        assert_eq!(err.user_message(), "Not enough codeBits (200 more needed)");

        let err = SdkError::Remote(ClientError::Network("refused".into()));
        assert!(err.user_message().contains("connection"));
    }
}
