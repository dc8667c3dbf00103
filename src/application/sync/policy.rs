use super::error::{RemoteError, SyncError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Missing or rejected credentials; nothing is counted against the operation.
    Unauthenticated,
    /// Worth replaying later without user action.
    Transient,
    /// Replaying the same payload cannot succeed.
    Permanent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Treat 5xx responses as transient.
    pub retry_server_errors: bool,
    /// Additional statuses treated as transient.
    pub transient_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_server_errors: true,
            transient_statuses: vec![408, 425, 429],
        }
    }
}

impl RetryPolicy {
    pub fn classify(&self, error: &SyncError) -> FailureClass {
        match error {
            SyncError::Unauthenticated => FailureClass::Unauthenticated,
            SyncError::Remote(remote) => self.classify_remote(remote),
            SyncError::Storage(_) => FailureClass::Transient,
            SyncError::InvalidOperation(_)
            | SyncError::UnsupportedOperation { .. }
            | SyncError::NoHandler(_) => FailureClass::Permanent,
        }
    }

    fn classify_remote(&self, error: &RemoteError) -> FailureClass {
        match error {
            RemoteError::Transport { .. } => FailureClass::Transient,
            RemoteError::Status { status: 401, .. } => FailureClass::Unauthenticated,
            RemoteError::Status { status, .. } => {
                if self.retry_server_errors && (500..600).contains(status) {
                    FailureClass::Transient
                } else if self.transient_statuses.contains(status) {
                    FailureClass::Transient
                } else {
                    FailureClass::Permanent
                }
            }
            // The server may already have applied the request.
            RemoteError::Decode(_) => FailureClass::Permanent,
        }
    }

    /// `retries` is the count after the failed attempt was recorded.
    pub fn is_exhausted(&self, retries: u32) -> bool {
        retries >= self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::sync::error::ErrorEnvelope;

    fn status(code: u16) -> SyncError {
        SyncError::Remote(RemoteError::Status {
            status: code,
            envelope: ErrorEnvelope::default(),
        })
    }

    #[test]
    fn classifies_statuses() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.classify(&status(401)), FailureClass::Unauthenticated);
        assert_eq!(policy.classify(&status(503)), FailureClass::Transient);
        assert_eq!(policy.classify(&status(429)), FailureClass::Transient);
        assert_eq!(policy.classify(&status(422)), FailureClass::Permanent);
        assert_eq!(policy.classify(&status(409)), FailureClass::Permanent);
        assert_eq!(policy.classify(&status(403)), FailureClass::Permanent);
    }

    #[test]
    fn transport_and_session_errors() {
        let policy = RetryPolicy::default();
        let timeout = SyncError::Remote(RemoteError::Transport {
            message: "timed out".into(),
            timeout: true,
        });

        assert_eq!(policy.classify(&timeout), FailureClass::Transient);
        assert_eq!(
            policy.classify(&SyncError::Unauthenticated),
            FailureClass::Unauthenticated
        );
        assert_eq!(
            policy.classify(&SyncError::NoHandler("crop".into())),
            FailureClass::Permanent
        );
    }

    #[test]
    fn server_errors_can_be_made_permanent() {
        let policy = RetryPolicy {
            retry_server_errors: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.classify(&status(500)), FailureClass::Permanent);
    }

    #[test]
    fn exhaustion_threshold() {
        let policy = RetryPolicy::default();
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
    }
}
