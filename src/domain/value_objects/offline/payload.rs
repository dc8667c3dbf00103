use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request body source of a queued operation. Always a JSON object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct OperationPayload(Map<String, Value>);

impl OperationPayload {
    pub fn new(value: Value) -> Result<Self, String> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err("Operation payload must be a JSON object".to_string()),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| format!("Invalid JSON payload: {e}"))?;
        Self::new(value)
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_object(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Shallow field-level merge: top-level keys of `patch` win, others survive.
    pub fn merge(&mut self, patch: OperationPayload) {
        for (key, value) in patch.0 {
            self.0.insert(key, value);
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_inner(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<OperationPayload> for Value {
    fn from(payload: OperationPayload) -> Self {
        payload.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_non_object_payloads() {
        assert!(OperationPayload::new(json!([1, 2])).is_err());
        assert!(OperationPayload::new(Value::Null).is_err());
        assert!(OperationPayload::from_json_str("{").is_err());
    }

    #[test]
    fn merge_overwrites_only_given_fields() {
        let mut base = OperationPayload::new(json!({"name": "North", "surface": 12})).unwrap();
        base.merge(OperationPayload::new(json!({"surface": 14, "crop": "wheat"})).unwrap());

        assert_eq!(
            base.to_json(),
            json!({"name": "North", "surface": 14, "crop": "wheat"})
        );
    }
}
