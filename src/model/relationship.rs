//! Relationships between tables

use super::{missing, nullable, timestamp, Validate};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    #[default]
    One,
    Many,
}

impl Cardinality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::One => "one",
            Cardinality::Many => "many",
        }
    }
}

impl FromStr for Cardinality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "one" => Ok(Cardinality::One),
            "many" => Ok(Cardinality::Many),
            _ => Err(Error::Validation(format!("Unknown cardinality: {}", s))),
        }
    }
}

/// Legacy relationship kind. Superseded by the pair of cardinalities but
/// still accepted and stored when a client sends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::OneToOne => "one_to_one",
            RelationshipType::OneToMany => "one_to_many",
            RelationshipType::ManyToOne => "many_to_one",
            RelationshipType::ManyToMany => "many_to_many",
        }
    }

    /// (source, target) cardinalities implied by this kind.
    pub fn cardinalities(&self) -> (Cardinality, Cardinality) {
        match self {
            RelationshipType::OneToOne => (Cardinality::One, Cardinality::One),
            RelationshipType::OneToMany => (Cardinality::One, Cardinality::Many),
            RelationshipType::ManyToOne => (Cardinality::Many, Cardinality::One),
            RelationshipType::ManyToMany => (Cardinality::Many, Cardinality::Many),
        }
    }
}

impl FromStr for RelationshipType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "one_to_one" => Ok(RelationshipType::OneToOne),
            "one_to_many" => Ok(RelationshipType::OneToMany),
            "many_to_one" => Ok(RelationshipType::ManyToOne),
            "many_to_many" => Ok(RelationshipType::ManyToMany),
            _ => Err(Error::Validation(format!("Unknown relationship type: {}", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DBRelationship {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub diagram_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub source_schema: Option<String>,
    #[serde(default)]
    pub source_table_id: String,
    #[serde(default)]
    pub target_schema: Option<String>,
    #[serde(default)]
    pub target_table_id: String,
    #[serde(default)]
    pub source_field_id: Option<String>,
    #[serde(default)]
    pub target_field_id: Option<String>,
    #[serde(default, rename = "type")]
    pub relationship_type: Option<RelationshipType>,
    #[serde(default)]
    pub source_cardinality: Cardinality,
    #[serde(default)]
    pub target_cardinality: Cardinality,
    #[serde(with = "timestamp", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl DBRelationship {
    pub fn new(
        id: impl Into<String>,
        source_table_id: impl Into<String>,
        target_table_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            diagram_id: String::new(),
            name: None,
            source_schema: None,
            source_table_id: source_table_id.into(),
            target_schema: None,
            target_table_id: target_table_id.into(),
            source_field_id: None,
            target_field_id: None,
            relationship_type: None,
            source_cardinality: Cardinality::One,
            target_cardinality: Cardinality::Many,
            created_at: Utc::now(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Validate for DBRelationship {
    fn validate(&self) -> Result<()> {
        if missing(&self.id) || missing(&self.source_table_id) || missing(&self.target_table_id) {
            return Err(Error::Validation(
                "Missing required fields: id, sourceTableId, or targetTableId".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub name: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub source_schema: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_table_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub target_schema: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_table_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub source_field_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "nullable")]
    pub target_field_id: Option<Option<String>>,
    #[serde(
        default,
        rename = "type",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "nullable"
    )]
    pub relationship_type: Option<Option<RelationshipType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_cardinality: Option<Cardinality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cardinality: Option<Cardinality>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_roundtrip_and_cardinalities() {
        for kind in [
            RelationshipType::OneToOne,
            RelationshipType::OneToMany,
            RelationshipType::ManyToOne,
            RelationshipType::ManyToMany,
        ] {
            assert_eq!(kind.as_str().parse::<RelationshipType>().unwrap(), kind);
        }
        assert_eq!(
            RelationshipType::ManyToOne.cardinalities(),
            (Cardinality::Many, Cardinality::One)
        );
        assert!("sideways".parse::<RelationshipType>().is_err());
    }

    #[test]
    fn test_validate_requires_endpoints() {
        assert!(DBRelationship::new("r1", "t1", "t2").validate().is_ok());
        let err = DBRelationship::new("r1", "", "t2").validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Missing required fields: id, sourceTableId, or targetTableId"
        );
    }
}
