//! Input items of a batch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Binary payload attached to a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BinaryData {
    /// Base64-encoded content.
    pub data: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// One input item: free-form JSON plus named binary payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    pub json: serde_json::Map<String, serde_json::Value>,
    pub binary: HashMap<String, BinaryData>,
}

impl Record {
    #[must_use]
    pub fn with_binary(mut self, property: impl Into<String>, data: BinaryData) -> Self {
        self.binary.insert(property.into(), data);
        self
    }
}
