//! Tables, their fields and indexes

use super::{missing, nullable, timestamp, Validate};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A table (or view) placed on a diagram.
///
/// `fields` and `indexes` are ordered; their order is preserved by every
/// backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DBTable {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub diagram_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub fields: Vec<DBField>,
    #[serde(default)]
    pub indexes: Vec<DBIndex>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(with = "timestamp", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub is_view: bool,
    #[serde(default)]
    pub is_materialized_view: bool,
    #[serde(default)]
    pub order: Option<i64>,
}

impl DBTable {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            diagram_id: String::new(),
            name: name.into(),
            schema: None,
            x: 0.0,
            y: 0.0,
            fields: Vec::new(),
            indexes: Vec::new(),
            color: None,
            created_at: Utc::now(),
            width: None,
            comment: None,
            is_view: false,
            is_materialized_view: false,
            order: None,
        }
    }
}

impl Validate for DBTable {
    fn validate(&self) -> Result<()> {
        if missing(&self.id) || missing(&self.name) {
            return Err(Error::Validation("Missing required fields: id or name".to_string()));
        }
        Ok(())
    }
}

/// The structured form of a field's data type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldType {
    pub id: String,
    pub name: String,
}

impl FieldType {
    /// Build the structured type from a display name such as
    /// `"character varying"` (id `"character_varying"`).
    pub fn from_name(name: &str) -> Self {
        Self {
            id: name.split(' ').collect::<Vec<_>>().join("_"),
            name: name.to_string(),
        }
    }
}

/// A column of a table.
///
/// Attributes not modelled here (defaults, precision, collation, ...) are
/// kept in `extra` so round-trips are lossless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DBField {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DBField {
    pub fn new(id: impl Into<String>, name: impl Into<String>, type_name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            field_type: FieldType::from_name(type_name),
            primary_key: false,
            unique: false,
            nullable: true,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DBIndex {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub field_ids: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Partial update of a table; only `Some` attributes are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub schema: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<DBField>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexes: Option<Vec<DBIndex>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub color: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub width: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub comment: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_view: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_materialized_view: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub order: Option<Option<i64>>,
}
