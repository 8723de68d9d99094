//! Shape of a table definition as written in the rulebook document.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::{DataType, FieldType};

#[derive(Debug, Clone, Deserialize)]
pub struct RawTable {
    #[serde(default, rename = "Description", alias = "description")]
    pub description: Option<String>,

    #[serde(default)]
    pub primary_key: Vec<String>,

    #[serde(default)]
    pub schema: Vec<RawField>,

    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawField {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub datatype: DataType,

    #[serde(default, rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub formula: Option<String>,

    #[serde(default, rename = "Description", alias = "description")]
    pub description: Option<String>,

    #[serde(default)]
    pub is_primary_key: bool,

    #[serde(default, rename = "RelatedTo", alias = "related_to")]
    pub related_to: Option<String>,
}

/// Top-level keys that hold document metadata rather than tables.
pub fn is_reserved(key: &str) -> bool {
    key.starts_with('$') || key.starts_with('_') || matches!(key, "model_name" | "Description")
}
