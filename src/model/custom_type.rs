//! User-defined database types (enums and composites)

use super::{missing, nullable, Validate};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomTypeKind {
    Enum,
    Composite,
}

impl CustomTypeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomTypeKind::Enum => "enum",
            CustomTypeKind::Composite => "composite",
        }
    }
}

impl std::str::FromStr for CustomTypeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "enum" => Ok(CustomTypeKind::Enum),
            "composite" => Ok(CustomTypeKind::Composite),
            _ => Err(Error::Validation(format!("Unknown custom type kind: {}", s))),
        }
    }
}

/// One member of a composite type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DBCustomTypeField {
    pub field: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DBCustomType {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub diagram_id: String,
    #[serde(default)]
    pub schema: Option<String>,
    /// The type's name, e.g. `order_status`.
    #[serde(default, rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub kind: Option<CustomTypeKind>,
    /// Enum labels, in declaration order.
    #[serde(default)]
    pub values: Vec<String>,
    /// Composite members, in declaration order.
    #[serde(default)]
    pub fields: Vec<DBCustomTypeField>,
}

impl DBCustomType {
    pub fn new(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            diagram_id: String::new(),
            schema: None,
            type_name: type_name.into(),
            kind: None,
            values: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn enumeration(id: impl Into<String>, type_name: impl Into<String>, values: &[&str]) -> Self {
        Self {
            kind: Some(CustomTypeKind::Enum),
            values: values.iter().map(|v| v.to_string()).collect(),
            ..Self::new(id, type_name)
        }
    }
}

impl Validate for DBCustomType {
    fn validate(&self) -> Result<()> {
        if missing(&self.id) || missing(&self.type_name) {
            return Err(Error::Validation("Missing required fields: id or type".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTypePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub schema: Option<Option<String>>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub kind: Option<Option<CustomTypeKind>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<DBCustomTypeField>>,
}
