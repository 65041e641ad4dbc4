//! Entity model
//!
//! A [`Diagram`] owns six dependent collections:
//! - `tables` ([`DBTable`], with ordered fields and indexes)
//! - `relationships` ([`DBRelationship`])
//! - `dependencies` ([`DBDependency`])
//! - `areas` ([`Area`])
//! - `custom types` ([`DBCustomType`])
//! - the per-diagram [`DiagramFilter`]
//!
//! plus the singleton [`Config`]. Every type serializes with camelCase keys
//! and writes absent optionals as `null`.

pub mod area;
pub mod config;
pub mod custom_type;
pub mod dependency;
pub mod diagram;
pub mod filter;
pub mod relationship;
pub mod table;
pub mod timestamp;

pub use area::{Area, AreaPatch};
pub use config::{Config, ConfigPatch, CONFIG_ID};
pub use custom_type::{CustomTypeKind, CustomTypePatch, DBCustomType, DBCustomTypeField};
pub use dependency::{DBDependency, DependencyPatch};
pub use diagram::{Diagram, DiagramIncludes, DiagramPatch};
pub use filter::DiagramFilter;
pub use relationship::{Cardinality, DBRelationship, RelationshipPatch, RelationshipType};
pub use table::{DBField, DBIndex, DBTable, FieldType, TablePatch};

use crate::Result;
use serde::{Deserialize, Deserializer};

/// Required-field checks shared by every backend, so the same malformed
/// input produces the same error message everywhere.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub(crate) fn missing(value: &str) -> bool {
    value.trim().is_empty()
}

/// Deserialize a patch attribute that may be explicitly set to `null`.
///
/// Used with `#[serde(default)]`: an absent key stays `None`, `null` becomes
/// `Some(None)`, a value becomes `Some(Some(v))`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
