use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    CreateBulk,
    Update,
    Delete,
    Activate,
    Deactivate,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::CreateBulk => "create_bulk",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Activate => "activate",
            OperationKind::Deactivate => "deactivate",
        }
    }

    /// Verbs that bring an entity into existence on the server.
    pub fn is_create(&self) -> bool {
        matches!(self, OperationKind::Create | OperationKind::CreateBulk)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(OperationKind::Create),
            "create_bulk" => Ok(OperationKind::CreateBulk),
            "update" => Ok(OperationKind::Update),
            "delete" => Ok(OperationKind::Delete),
            "activate" => Ok(OperationKind::Activate),
            "deactivate" => Ok(OperationKind::Deactivate),
            other => Err(format!("Unknown operation kind: {other}")),
        }
    }
}
