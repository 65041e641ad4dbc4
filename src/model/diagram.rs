//! Diagram - the root aggregate

use super::{
    missing, nullable, timestamp, Area, DBCustomType, DBDependency, DBRelationship, DBTable,
    Validate,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One database schema visualization.
///
/// The child collections are only populated when requested through
/// [`DiagramIncludes`]; otherwise they are `None` (serialized as `null`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagram {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub database_type: String,
    #[serde(default)]
    pub database_edition: Option<String>,
    #[serde(with = "timestamp", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp", default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tables: Option<Vec<DBTable>>,
    #[serde(default)]
    pub relationships: Option<Vec<DBRelationship>>,
    #[serde(default)]
    pub dependencies: Option<Vec<DBDependency>>,
    #[serde(default)]
    pub areas: Option<Vec<Area>>,
    #[serde(default)]
    pub custom_types: Option<Vec<DBCustomType>>,
}

impl Diagram {
    pub fn new(id: impl Into<String>, name: impl Into<String>, database_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            database_type: database_type.into(),
            database_edition: None,
            created_at: now,
            updated_at: now,
            tables: None,
            relationships: None,
            dependencies: None,
            areas: None,
            custom_types: None,
        }
    }
}

impl Validate for Diagram {
    fn validate(&self) -> Result<()> {
        if missing(&self.id) || missing(&self.name) || missing(&self.database_type) {
            return Err(Error::Validation(
                "Missing required fields: id, name, or databaseType".to_string(),
            ));
        }
        for table in self.tables.iter().flatten() {
            table.validate()?;
        }
        for relationship in self.relationships.iter().flatten() {
            relationship.validate()?;
        }
        for dependency in self.dependencies.iter().flatten() {
            dependency.validate()?;
        }
        for area in self.areas.iter().flatten() {
            area.validate()?;
        }
        for custom_type in self.custom_types.iter().flatten() {
            custom_type.validate()?;
        }
        Ok(())
    }
}

/// Which child collections to attach to diagrams returned by list/get.
///
/// Flags are independent; the default attaches nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiagramIncludes {
    pub include_tables: bool,
    pub include_relationships: bool,
    pub include_dependencies: bool,
    pub include_areas: bool,
    pub include_custom_types: bool,
}

impl DiagramIncludes {
    pub fn all() -> Self {
        Self {
            include_tables: true,
            include_relationships: true,
            include_dependencies: true,
            include_areas: true,
            include_custom_types: true,
        }
    }

    pub fn any(&self) -> bool {
        self.include_tables
            || self.include_relationships
            || self.include_dependencies
            || self.include_areas
            || self.include_custom_types
    }

    /// Query parameters for the set flags only.
    pub fn query_pairs(&self) -> Vec<(&'static str, &'static str)> {
        [
            ("includeTables", self.include_tables),
            ("includeRelationships", self.include_relationships),
            ("includeDependencies", self.include_dependencies),
            ("includeAreas", self.include_areas),
            ("includeCustomTypes", self.include_custom_types),
        ]
        .into_iter()
        .filter(|(_, set)| *set)
        .map(|(name, _)| (name, "true"))
        .collect()
    }
}

/// Partial update of a diagram. Setting `id` to a different value renames
/// the diagram and re-points every child collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub database_edition: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DiagramPatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn move_to(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// The new id when this patch changes the diagram's identity.
    pub fn renamed_id<'a>(&'a self, current: &str) -> Option<&'a str> {
        self.id.as_deref().filter(|new_id| *new_id != current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_identity() {
        assert!(Diagram::new("d1", "Shop", "postgres").validate().is_ok());
        let err = Diagram::new("d1", "", "postgres").validate().unwrap_err();
        assert!(err.is_validation());
        assert!(Diagram::new("", "Shop", "postgres").validate().is_err());
    }

    #[test]
    fn test_absent_children_serialize_as_null() {
        let json = serde_json::to_value(Diagram::new("d1", "Shop", "postgres")).unwrap();
        assert!(json["tables"].is_null());
        assert!(json.as_object().unwrap().contains_key("customTypes"));
        assert!(json["databaseEdition"].is_null());
    }

    #[test]
    fn test_includes_query_pairs() {
        assert!(DiagramIncludes::default().query_pairs().is_empty());
        let includes = DiagramIncludes {
            include_tables: true,
            include_areas: true,
            ..DiagramIncludes::default()
        };
        assert_eq!(
            includes.query_pairs(),
            vec![("includeTables", "true"), ("includeAreas", "true")]
        );
        assert_eq!(DiagramIncludes::all().query_pairs().len(), 5);
    }

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let patch: DiagramPatch = serde_json::from_str(r#"{"databaseEdition": null}"#).unwrap();
        assert_eq!(patch.database_edition, Some(None));
        let patch: DiagramPatch = serde_json::from_str(r#"{"name": "Orders"}"#).unwrap();
        assert_eq!(patch.database_edition, None);
        assert_eq!(serde_json::to_string(&patch).unwrap(), r#"{"name":"Orders"}"#);
    }

    #[test]
    fn test_renamed_id_ignores_same_id() {
        assert_eq!(DiagramPatch::move_to("d1").renamed_id("d1"), None);
        assert_eq!(DiagramPatch::move_to("d2").renamed_id("d1"), Some("d2"));
        assert_eq!(DiagramPatch::rename("x").renamed_id("d1"), None);
    }
}
