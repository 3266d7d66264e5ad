use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open JSON object carried by a record.
pub type Payload = Map<String, Value>;

/// A unit of data flowing through the pipeline.
///
/// `uid` is assigned when the record is created and cannot be changed afterwards; every other
/// field is freely mutable by stages. The three payloads are schemaless and only the mapping and
/// the stages that read them know their keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    uid: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub tag_code: Option<String>,
    #[serde(default)]
    pub tag_values: Option<String>,
    #[serde(default)]
    pub data: Payload,
    #[serde(default)]
    pub metadata: Payload,
    #[serde(default)]
    pub affiliated_data: Payload,
}

impl Record {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            topic: String::new(),
            name: String::new(),
            data_type: String::new(),
            created_at: String::new(),
            tag_code: None,
            tag_values: None,
            data: Payload::new(),
            metadata: Payload::new(),
            affiliated_data: Payload::new(),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Returns `data[key]` when it is a string.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Returns `metadata[key]` when it is a string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}
