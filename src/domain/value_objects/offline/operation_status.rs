use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Eligible for automatic replay.
    Pending,
    /// Surfaced to the user; skipped until the entity is edited again.
    Failed,
    Unknown(String),
}

impl OperationStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Failed => "failed",
            OperationStatus::Unknown(value) => value.as_str(),
        }
    }

    pub fn is_replayable(&self) -> bool {
        matches!(self, OperationStatus::Pending)
    }
}

impl From<&str> for OperationStatus {
    fn from(value: &str) -> Self {
        match value {
            "pending" => OperationStatus::Pending,
            "failed" => OperationStatus::Failed,
            other => OperationStatus::Unknown(other.to_string()),
        }
    }
}
