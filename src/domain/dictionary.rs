use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata for a single variable in a data source dictionary.
///
/// Dictionary files carry more fields than the service interprets; anything
/// beyond label/type/categories is preserved verbatim in `extra` so the
/// `/dictionary` endpoint returns the file content unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub var_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Variable name -> metadata, read-only after load.
pub type Dictionary = BTreeMap<String, VariableEntry>;

/// Category name -> flat list of member variable names.
pub type CategoryMap = BTreeMap<String, Vec<String>>;
