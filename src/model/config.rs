//! Application config record (singleton)

use serde::{Deserialize, Serialize};

/// Id of the one and only config row.
pub const CONFIG_ID: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "config_id")]
    pub id: i64,
    #[serde(default)]
    pub default_diagram_id: String,
}

fn config_id() -> i64 {
    CONFIG_ID
}

impl Config {
    pub fn new(default_diagram_id: impl Into<String>) -> Self {
        Self {
            id: CONFIG_ID,
            default_diagram_id: default_diagram_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_diagram_id: Option<String>,
}

impl ConfigPatch {
    pub fn default_diagram(id: impl Into<String>) -> Self {
        Self {
            default_diagram_id: Some(id.into()),
        }
    }
}
