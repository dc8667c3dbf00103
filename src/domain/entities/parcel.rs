use super::mirror::MirrorRecord;
use crate::domain::value_objects::mirror::{LocalId, ServerId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const LOCAL_ID_FIELD: &str = "localId";
pub const IDENTIFICATION_FIELD: &str = "identificationId";
pub const PRODUCER_FIELD: &str = "producerId";
pub const PARCEL_ID_FIELD: &str = "parcelId";
pub const PARCELS_FIELD: &str = "parcels";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Parcel {
    pub local_id: Option<LocalId>,
    pub server_id: Option<ServerId>,
    pub producer_id: Option<String>,
    pub identification_id: Option<String>,
    pub attributes: Map<String, Value>,
    /// Created locally and not yet confirmed by the server.
    pub pending: bool,
}

impl Parcel {
    /// Server id when known, local id otherwise.
    pub fn id(&self) -> Option<&str> {
        self.server_id
            .as_ref()
            .map(ServerId::as_str)
            .or_else(|| self.local_id.as_ref().map(LocalId::as_str))
    }
}

impl From<MirrorRecord> for Parcel {
    fn from(record: MirrorRecord) -> Self {
        let attributes = match record.data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let identification_id = attributes
            .get(IDENTIFICATION_FIELD)
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            pending: record.pending_entity_id.is_some(),
            local_id: record.local_id,
            server_id: record.server_id,
            producer_id: record.parent_id,
            identification_id,
            attributes,
        }
    }
}

/// A parcel as entered by the user, before it is queued.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParcelDraft {
    pub identification_id: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl ParcelDraft {
    pub fn new(identification_id: impl Into<String>) -> Self {
        Self {
            identification_id: identification_id.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: Value) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    /// Parcel fields as they are mirrored locally (no routing fields).
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = self.attributes.clone();
        fields.insert(
            IDENTIFICATION_FIELD.to_string(),
            Value::String(self.identification_id.clone()),
        );
        fields
    }

    /// Entry of a `create_bulk` payload; `localId` correlates the server response.
    pub fn to_queue_entry(&self, local_id: &LocalId) -> Value {
        let mut entry = self.to_fields();
        entry.insert(
            LOCAL_ID_FIELD.to_string(),
            Value::String(local_id.to_string()),
        );
        Value::Object(entry)
    }
}
