//! Dependencies: directed table-to-table edges (e.g. a view on its source)

use super::{missing, nullable, timestamp, Validate};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DBDependency {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub diagram_id: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub table_id: String,
    #[serde(default)]
    pub dependent_schema: Option<String>,
    #[serde(default)]
    pub dependent_table_id: String,
    #[serde(with = "timestamp", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl DBDependency {
    pub fn new(
        id: impl Into<String>,
        table_id: impl Into<String>,
        dependent_table_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            diagram_id: String::new(),
            schema: None,
            table_id: table_id.into(),
            dependent_schema: None,
            dependent_table_id: dependent_table_id.into(),
            created_at: Utc::now(),
        }
    }
}

impl Validate for DBDependency {
    fn validate(&self) -> Result<()> {
        if missing(&self.id) || missing(&self.table_id) || missing(&self.dependent_table_id) {
            return Err(Error::Validation(
                "Missing required fields: id, tableId, or dependentTableId".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub schema: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub dependent_schema: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependent_table_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}
