use serde::{Deserialize, Serialize};
use std::fmt;

pub const PARCEL: &str = "parcel";
pub const ACTOR: &str = "actor";
pub const RELATION: &str = "relation";

/// Tag selecting the entity sync handler for an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityType(String);

impl EntityType {
    pub fn new(value: String) -> Result<Self, String> {
        Self::validate(&value)?;
        Ok(Self(value))
    }

    pub fn parcel() -> Self {
        Self(PARCEL.to_string())
    }

    pub fn actor() -> Self {
        Self(ACTOR.to_string())
    }

    pub fn relation() -> Self {
        Self(RELATION.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            return Err("Entity type cannot be empty".to_string());
        }
        if value.chars().any(|c| c.is_whitespace() || c.is_ascii_uppercase()) {
            return Err(format!("Entity type must be a lowercase tag: {value}"));
        }
        Ok(())
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.0
    }
}
