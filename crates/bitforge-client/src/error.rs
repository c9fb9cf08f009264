//! Error types for the platform client

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Normalized failure category for every remote call.
///
/// Views and the mutation executor only branch on this, never on raw HTTP
/// status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// No response was received
    NetworkFailure,
    /// 401 / 403, the token is missing, expired or rejected
    Unauthorized,
    /// 4xx with a structured error body (insufficient balance, duplicate tag, ...)
    ValidationFailure,
    /// 5xx, or a success response the client could not decode
    ServerFailure,
    /// The addressed resource does not exist
    NotFound,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkFailure => "NETWORK_FAILURE",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::ValidationFailure => "VALIDATION_FAILURE",
            Self::ServerFailure => "SERVER_FAILURE",
            Self::NotFound => "NOT_FOUND",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured error body returned by the backend on 4xx responses.
///
/// The backend is not consistent about the message key, so both `error` and
/// `message` are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
}

impl ApiErrorBody {
    pub fn text(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }
}

/// Platform client error
#[derive(Debug, Error)]
pub enum ClientError {
    /// Request never produced a response
    #[error("Network error: {0}")]
    Network(String),

    /// Token missing or rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Request rejected by server-side validation
    #[error("Validation failed: {message}")]
    Validation {
        status: u16,
        message: String,
        field: Option<String>,
    },

    /// Resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Server returned a 5xx
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Success response with a body we could not decode
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Token storage could not be read or written
    #[error("Token storage error: {0}")]
    TokenStore(String),
}

impl ClientError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Network(_) => ErrorKind::NetworkFailure,
            ClientError::Unauthorized(_) => ErrorKind::Unauthorized,
            ClientError::Validation { .. } => ErrorKind::ValidationFailure,
            ClientError::NotFound(_) => ErrorKind::NotFound,
            ClientError::Server { .. }
            | ClientError::InvalidResponse(_)
            | ClientError::TokenStore(_) => ErrorKind::ServerFailure,
        }
    }

    /// Build an error from a non-success status and its raw body.
    pub fn from_status(status: u16, path: &str, body: &str) -> Self {
        let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
        let message = parsed
            .as_ref()
            .and_then(|b| b.text())
            .map(str::to_string)
            .unwrap_or_else(|| body.trim().to_string());

        match status {
            401 | 403 => ClientError::Unauthorized(if message.is_empty() {
                path.to_string()
            } else {
                message
            }),
            404 => ClientError::NotFound(path.to_string()),
            400..=499 => ClientError::Validation {
                status,
                message,
                field: parsed.and_then(|b| b.field),
            },
            _ => ClientError::Server { status, message },
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::from_status(status.as_u16(), err.url().map(|u| u.path()).unwrap_or(""), "")
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::InvalidResponse(err.to_string())
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ClientError::from_status(401, "/api/auth/me", "").kind(),
            ErrorKind::Unauthorized
        );
        // Admin routes answer 403 to non-admin tokens
        assert_eq!(
            ClientError::from_status(403, "/api/admin/metrics", "").kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(
            ClientError::from_status(404, "/api/users/x", "").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ClientError::from_status(422, "/api/clans/create", "{}").kind(),
            ErrorKind::ValidationFailure
        );
        assert_eq!(
            ClientError::from_status(503, "/api/clans", "down").kind(),
            ErrorKind::ServerFailure
        );
    }

    #[test]
    fn test_structured_validation_body() {
        let err = ClientError::from_status(
            400,
            "/api/clans/create",
            r#"{"error":"Clan tag already taken","field":"tag"}"#,
        );
        match err {
            ClientError::Validation { status, message, field } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Clan tag already taken");
                assert_eq!(field.as_deref(), Some("tag"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_message_key_fallback() {
        let err = ClientError::from_status(400, "/api/marketplace/purchase", r#"{"message":"Insufficient codeBits"}"#);
        assert_eq!(err.to_string(), "Validation failed: Insufficient codeBits");
    }
}
