use crate::shared::error::AppError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl FieldError {
    /// Validation rule name, whichever of `rule` or `code` the server used.
    pub fn rule_or_code(&self) -> Option<&str> {
        self.rule.as_deref().or(self.code.as_deref())
    }
}

impl ErrorEnvelope {
    /// Parses a response body; bodies that are not an envelope keep their text as the message.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => envelope,
            Err(_) => {
                let trimmed = body.trim();
                ErrorEnvelope {
                    message: (!trimmed.is_empty()).then(|| trimmed.to_string()),
                    ..Default::default()
                }
            }
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("transport error: {message}")]
    Transport { message: String, timeout: bool },
    #[error("server responded with status {status}")]
    Status { status: u16, envelope: ErrorEnvelope },
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn envelope(&self) -> Option<&ErrorEnvelope> {
        match self {
            RemoteError::Status { envelope, .. } => Some(envelope),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport { .. })
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return RemoteError::Decode(err.to_string());
        }
        RemoteError::Transport {
            timeout: err.is_timeout(),
            message: err.to_string(),
        }
    }
}

impl From<RemoteError> for AppError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Transport { message, .. } => AppError::Network(message),
            RemoteError::Status { status: 401, envelope } => {
                AppError::Unauthorized(envelope.message.unwrap_or_default())
            }
            RemoteError::Status { status: 404, envelope } => {
                AppError::NotFound(envelope.message.unwrap_or_default())
            }
            RemoteError::Status { status, envelope } => AppError::Network(format!(
                "status {status}: {}",
                envelope.message.unwrap_or_default()
            )),
            RemoteError::Decode(message) => AppError::DeserializationError(message),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no authenticated session")]
    Unauthenticated,
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("unsupported operation: {entity_type}.{operation}")]
    UnsupportedOperation {
        entity_type: String,
        operation: String,
    },
    #[error("no sync handler registered for {0}")]
    NoHandler(String),
    #[error("storage error: {0}")]
    Storage(#[from] AppError),
}
