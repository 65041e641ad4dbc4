//! Row mapping between entities and relational columns
//!
//! [`Record`] describes how a child entity is stored in its table.
//! [`Patch`] describes how a partial update maps its exposed attribute names
//! onto columns. The attribute→column tables are fixed and tested below.

use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::str::FromStr;

use crate::model::{
    timestamp, Area, AreaPatch, ConfigPatch, CustomTypePatch, DBCustomType, DBDependency,
    DBRelationship, DBTable, DependencyPatch, Diagram, DiagramPatch, RelationshipPatch,
    TablePatch,
};
use crate::{Error, Result};

// ========== Value helpers ==========

pub(crate) fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

pub(crate) fn opt_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, text)
}

pub(crate) fn real(value: f64) -> Value {
    Value::Real(value)
}

pub(crate) fn opt_real(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::Real)
}

pub(crate) fn flag(value: bool) -> Value {
    Value::Integer(value as i64)
}

pub(crate) fn stamp(value: &DateTime<Utc>) -> Value {
    Value::Text(timestamp::to_native(value))
}

pub(crate) fn json<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(Value::Text(serde_json::to_string(value)?))
}

fn conversion_error(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// Decode a JSON text column.
pub(crate) fn json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

/// Decode a nullable JSON text column; SQL NULL stays `None`.
pub(crate) fn opt_json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn stamp_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    timestamp::parse(&raw).map_err(|e| conversion_error(idx, e))
}

fn enum_column<T: FromStr<Err = Error>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: Error| conversion_error(idx, e))
}

fn opt_enum_column<T: FromStr<Err = Error>>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| raw.parse().map_err(|e: Error| conversion_error(idx, e)))
        .transpose()
}

// ========== Records ==========

/// A child entity stored in its own table, owned by one diagram.
pub trait Record: Sized + Send + 'static {
    const TABLE: &'static str;
    /// Column order shared by `from_row` and `values`.
    const COLUMNS: &'static [&'static str];
    /// Listing order. Ties fall back to insertion order.
    const ORDER_BY: &'static str;
    /// Singular name used in log and error messages.
    const NOUN: &'static str;
    /// Path segment of the collection on the record service.
    const PATH: &'static str;
    /// Key wrapping the entity in record service request bodies.
    const BODY_KEY: &'static str;

    fn id(&self) -> &str;

    fn from_row(row: &Row) -> rusqlite::Result<Self>;

    /// Column values for this entity, stored under `diagram_id`.
    fn values(&self, diagram_id: &str) -> Result<Vec<Value>>;
}

/// Comma separated, quoted column list.
pub(crate) fn column_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Record for DBTable {
    const TABLE: &'static str = "db_tables";
    const COLUMNS: &'static [&'static str] = &[
        "id", "diagram_id", "name", "schema", "x", "y", "fields", "indexes", "color",
        "created_at", "width", "comment", "is_view", "is_materialized_view", "order",
    ];
    const ORDER_BY: &'static str = "rowid";
    const NOUN: &'static str = "table";
    const PATH: &'static str = "tables";
    const BODY_KEY: &'static str = "table";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(DBTable {
            id: row.get(0)?,
            diagram_id: row.get(1)?,
            name: row.get(2)?,
            schema: row.get(3)?,
            x: row.get(4)?,
            y: row.get(5)?,
            fields: json_column(row, 6)?,
            indexes: json_column(row, 7)?,
            color: row.get(8)?,
            created_at: stamp_column(row, 9)?,
            width: row.get(10)?,
            comment: row.get(11)?,
            is_view: row.get(12)?,
            is_materialized_view: row.get(13)?,
            order: row.get(14)?,
        })
    }

    fn values(&self, diagram_id: &str) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(diagram_id),
            text(&self.name),
            opt_text(self.schema.as_deref()),
            real(self.x),
            real(self.y),
            json(&self.fields)?,
            json(&self.indexes)?,
            opt_text(self.color.as_deref()),
            stamp(&self.created_at),
            opt_real(self.width),
            opt_text(self.comment.as_deref()),
            flag(self.is_view),
            flag(self.is_materialized_view),
            self.order.map_or(Value::Null, Value::Integer),
        ])
    }
}

impl Record for DBRelationship {
    const TABLE: &'static str = "db_relationships";
    const COLUMNS: &'static [&'static str] = &[
        "id", "diagram_id", "name", "source_schema", "source_table_id", "target_schema",
        "target_table_id", "source_field_id", "target_field_id", "type",
        "source_cardinality", "target_cardinality", "created_at",
    ];
    const ORDER_BY: &'static str = "name, rowid";
    const NOUN: &'static str = "relationship";
    const PATH: &'static str = "relationships";
    const BODY_KEY: &'static str = "relationship";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(DBRelationship {
            id: row.get(0)?,
            diagram_id: row.get(1)?,
            name: row.get(2)?,
            source_schema: row.get(3)?,
            source_table_id: row.get(4)?,
            target_schema: row.get(5)?,
            target_table_id: row.get(6)?,
            source_field_id: row.get(7)?,
            target_field_id: row.get(8)?,
            relationship_type: opt_enum_column(row, 9)?,
            source_cardinality: enum_column(row, 10)?,
            target_cardinality: enum_column(row, 11)?,
            created_at: stamp_column(row, 12)?,
        })
    }

    fn values(&self, diagram_id: &str) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(diagram_id),
            opt_text(self.name.as_deref()),
            opt_text(self.source_schema.as_deref()),
            text(&self.source_table_id),
            opt_text(self.target_schema.as_deref()),
            text(&self.target_table_id),
            opt_text(self.source_field_id.as_deref()),
            opt_text(self.target_field_id.as_deref()),
            opt_text(self.relationship_type.map(|t| t.as_str())),
            text(self.source_cardinality.as_str()),
            text(self.target_cardinality.as_str()),
            stamp(&self.created_at),
        ])
    }
}

impl Record for DBDependency {
    const TABLE: &'static str = "db_dependencies";
    const COLUMNS: &'static [&'static str] = &[
        "id", "diagram_id", "schema", "table_id", "dependent_schema", "dependent_table_id",
        "created_at",
    ];
    const ORDER_BY: &'static str = "rowid";
    const NOUN: &'static str = "dependency";
    const PATH: &'static str = "dependencies";
    const BODY_KEY: &'static str = "dependency";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(DBDependency {
            id: row.get(0)?,
            diagram_id: row.get(1)?,
            schema: row.get(2)?,
            table_id: row.get(3)?,
            dependent_schema: row.get(4)?,
            dependent_table_id: row.get(5)?,
            created_at: stamp_column(row, 6)?,
        })
    }

    fn values(&self, diagram_id: &str) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(diagram_id),
            opt_text(self.schema.as_deref()),
            text(&self.table_id),
            opt_text(self.dependent_schema.as_deref()),
            text(&self.dependent_table_id),
            stamp(&self.created_at),
        ])
    }
}

impl Record for Area {
    const TABLE: &'static str = "areas";
    const COLUMNS: &'static [&'static str] =
        &["id", "diagram_id", "name", "x", "y", "width", "height", "color"];
    const ORDER_BY: &'static str = "rowid";
    const NOUN: &'static str = "area";
    const PATH: &'static str = "areas";
    const BODY_KEY: &'static str = "area";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Area {
            id: row.get(0)?,
            diagram_id: row.get(1)?,
            name: row.get(2)?,
            x: row.get(3)?,
            y: row.get(4)?,
            width: row.get(5)?,
            height: row.get(6)?,
            color: row.get(7)?,
        })
    }

    fn values(&self, diagram_id: &str) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(diagram_id),
            text(&self.name),
            real(self.x),
            real(self.y),
            real(self.width),
            real(self.height),
            opt_text(self.color.as_deref()),
        ])
    }
}

impl Record for DBCustomType {
    const TABLE: &'static str = "db_custom_types";
    const COLUMNS: &'static [&'static str] =
        &["id", "diagram_id", "schema", "type", "kind", "values", "fields"];
    const ORDER_BY: &'static str = "type, rowid";
    const NOUN: &'static str = "custom type";
    const PATH: &'static str = "custom-types";
    const BODY_KEY: &'static str = "customType";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(DBCustomType {
            id: row.get(0)?,
            diagram_id: row.get(1)?,
            schema: row.get(2)?,
            type_name: row.get(3)?,
            kind: opt_enum_column(row, 4)?,
            values: json_column(row, 5)?,
            fields: json_column(row, 6)?,
        })
    }

    fn values(&self, diagram_id: &str) -> Result<Vec<Value>> {
        Ok(vec![
            text(&self.id),
            text(diagram_id),
            opt_text(self.schema.as_deref()),
            text(&self.type_name),
            opt_text(self.kind.map(|k| k.as_str())),
            json(&self.values)?,
            json(&self.fields)?,
        ])
    }
}

// ========== Diagram rows ==========

pub(crate) const DIAGRAM_COLUMNS: &[&str] = &[
    "id", "name", "database_type", "database_edition", "created_at", "updated_at",
];

/// The diagram's own fields; child collections are attached separately.
pub(crate) fn diagram_from_row(row: &Row) -> rusqlite::Result<Diagram> {
    Ok(Diagram {
        id: row.get(0)?,
        name: row.get(1)?,
        database_type: row.get(2)?,
        database_edition: row.get(3)?,
        created_at: stamp_column(row, 4)?,
        updated_at: stamp_column(row, 5)?,
        tables: None,
        relationships: None,
        dependencies: None,
        areas: None,
        custom_types: None,
    })
}

pub(crate) fn diagram_values(diagram: &Diagram) -> Vec<Value> {
    vec![
        text(&diagram.id),
        text(&diagram.name),
        text(&diagram.database_type),
        opt_text(diagram.database_edition.as_deref()),
        stamp(&diagram.created_at),
        stamp(&diagram.updated_at),
    ]
}

// ========== Patches ==========

/// A typed partial update.
pub trait Patch: Send + 'static {
    const TABLE: &'static str;
    /// Exposed attribute name → storage column.
    const COLUMNS: &'static [(&'static str, &'static str)];

    /// The attributes this patch sets, by exposed name.
    fn attributes(&self) -> Result<Vec<(&'static str, Value)>>;

    /// The attributes resolved to `(column, value)` pairs.
    fn assignments(&self) -> Result<Vec<(&'static str, Value)>> {
        self.attributes()?
            .into_iter()
            .map(|(attribute, value)| {
                Self::COLUMNS
                    .iter()
                    .find(|(name, _)| *name == attribute)
                    .map(|(_, column)| (*column, value))
                    .ok_or_else(|| {
                        Error::Validation(format!("Unknown attribute for {}: {}", Self::TABLE, attribute))
                    })
            })
            .collect()
    }
}

/// Collects set attributes in declaration order.
#[derive(Default)]
struct Attributes(Vec<(&'static str, Value)>);

impl Attributes {
    fn set(mut self, name: &'static str, value: Option<Value>) -> Self {
        if let Some(value) = value {
            self.0.push((name, value));
        }
        self
    }
}

fn nullable_text(value: &Option<Option<String>>) -> Option<Value> {
    value.as_ref().map(|v| opt_text(v.as_deref()))
}

impl Patch for DiagramPatch {
    const TABLE: &'static str = "diagrams";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("id", "id"),
        ("name", "name"),
        ("databaseType", "database_type"),
        ("databaseEdition", "database_edition"),
        ("createdAt", "created_at"),
        ("updatedAt", "updated_at"),
    ];

    fn attributes(&self) -> Result<Vec<(&'static str, Value)>> {
        Ok(Attributes::default()
            .set("id", self.id.as_deref().map(text))
            .set("name", self.name.as_deref().map(text))
            .set("databaseType", self.database_type.as_deref().map(text))
            .set("databaseEdition", nullable_text(&self.database_edition))
            .set("createdAt", self.created_at.as_ref().map(stamp))
            .set("updatedAt", self.updated_at.as_ref().map(stamp))
            .0)
    }
}

impl Patch for TablePatch {
    const TABLE: &'static str = "db_tables";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("diagramId", "diagram_id"),
        ("name", "name"),
        ("schema", "schema"),
        ("x", "x"),
        ("y", "y"),
        ("fields", "fields"),
        ("indexes", "indexes"),
        ("color", "color"),
        ("createdAt", "created_at"),
        ("width", "width"),
        ("comment", "comment"),
        ("isView", "is_view"),
        ("isMaterializedView", "is_materialized_view"),
        ("order", "order"),
    ];

    fn attributes(&self) -> Result<Vec<(&'static str, Value)>> {
        Ok(Attributes::default()
            .set("diagramId", self.diagram_id.as_deref().map(text))
            .set("name", self.name.as_deref().map(text))
            .set("schema", nullable_text(&self.schema))
            .set("x", self.x.map(real))
            .set("y", self.y.map(real))
            .set("fields", self.fields.as_ref().map(json).transpose()?)
            .set("indexes", self.indexes.as_ref().map(json).transpose()?)
            .set("color", nullable_text(&self.color))
            .set("createdAt", self.created_at.as_ref().map(stamp))
            .set("width", self.width.map(opt_real))
            .set("comment", nullable_text(&self.comment))
            .set("isView", self.is_view.map(flag))
            .set("isMaterializedView", self.is_materialized_view.map(flag))
            .set("order", self.order.map(|o| o.map_or(Value::Null, Value::Integer)))
            .0)
    }
}

impl Patch for RelationshipPatch {
    const TABLE: &'static str = "db_relationships";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("diagramId", "diagram_id"),
        ("name", "name"),
        ("sourceSchema", "source_schema"),
        ("sourceTableId", "source_table_id"),
        ("targetSchema", "target_schema"),
        ("targetTableId", "target_table_id"),
        ("sourceFieldId", "source_field_id"),
        ("targetFieldId", "target_field_id"),
        ("type", "type"),
        ("sourceCardinality", "source_cardinality"),
        ("targetCardinality", "target_cardinality"),
        ("createdAt", "created_at"),
    ];

    fn attributes(&self) -> Result<Vec<(&'static str, Value)>> {
        Ok(Attributes::default()
            .set("diagramId", self.diagram_id.as_deref().map(text))
            .set("name", nullable_text(&self.name))
            .set("sourceSchema", nullable_text(&self.source_schema))
            .set("sourceTableId", self.source_table_id.as_deref().map(text))
            .set("targetSchema", nullable_text(&self.target_schema))
            .set("targetTableId", self.target_table_id.as_deref().map(text))
            .set("sourceFieldId", nullable_text(&self.source_field_id))
            .set("targetFieldId", nullable_text(&self.target_field_id))
            .set("type", self.relationship_type.map(|t| opt_text(t.map(|t| t.as_str()))))
            .set("sourceCardinality", self.source_cardinality.map(|c| text(c.as_str())))
            .set("targetCardinality", self.target_cardinality.map(|c| text(c.as_str())))
            .set("createdAt", self.created_at.as_ref().map(stamp))
            .0)
    }
}

impl Patch for DependencyPatch {
    const TABLE: &'static str = "db_dependencies";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("diagramId", "diagram_id"),
        ("schema", "schema"),
        ("tableId", "table_id"),
        ("dependentSchema", "dependent_schema"),
        ("dependentTableId", "dependent_table_id"),
        ("createdAt", "created_at"),
    ];

    fn attributes(&self) -> Result<Vec<(&'static str, Value)>> {
        Ok(Attributes::default()
            .set("diagramId", self.diagram_id.as_deref().map(text))
            .set("schema", nullable_text(&self.schema))
            .set("tableId", self.table_id.as_deref().map(text))
            .set("dependentSchema", nullable_text(&self.dependent_schema))
            .set("dependentTableId", self.dependent_table_id.as_deref().map(text))
            .set("createdAt", self.created_at.as_ref().map(stamp))
            .0)
    }
}

impl Patch for AreaPatch {
    const TABLE: &'static str = "areas";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("diagramId", "diagram_id"),
        ("name", "name"),
        ("x", "x"),
        ("y", "y"),
        ("width", "width"),
        ("height", "height"),
        ("color", "color"),
    ];

    fn attributes(&self) -> Result<Vec<(&'static str, Value)>> {
        Ok(Attributes::default()
            .set("diagramId", self.diagram_id.as_deref().map(text))
            .set("name", self.name.as_deref().map(text))
            .set("x", self.x.map(real))
            .set("y", self.y.map(real))
            .set("width", self.width.map(real))
            .set("height", self.height.map(real))
            .set("color", nullable_text(&self.color))
            .0)
    }
}

impl Patch for CustomTypePatch {
    const TABLE: &'static str = "db_custom_types";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("diagramId", "diagram_id"),
        ("schema", "schema"),
        ("type", "type"),
        ("kind", "kind"),
        ("values", "values"),
        ("fields", "fields"),
    ];

    fn attributes(&self) -> Result<Vec<(&'static str, Value)>> {
        Ok(Attributes::default()
            .set("diagramId", self.diagram_id.as_deref().map(text))
            .set("schema", nullable_text(&self.schema))
            .set("type", self.type_name.as_deref().map(text))
            .set("kind", self.kind.map(|k| opt_text(k.map(|k| k.as_str()))))
            .set("values", self.values.as_ref().map(json).transpose()?)
            .set("fields", self.fields.as_ref().map(json).transpose()?)
            .0)
    }
}

impl Patch for ConfigPatch {
    const TABLE: &'static str = "config";
    const COLUMNS: &'static [(&'static str, &'static str)] =
        &[("defaultDiagramId", "default_diagram_id")];

    fn attributes(&self) -> Result<Vec<(&'static str, Value)>> {
        Ok(Attributes::default()
            .set("defaultDiagramId", self.default_diagram_id.as_deref().map(text))
            .0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Cardinality, CustomTypeKind, DBCustomTypeField, DBField, DBIndex, RelationshipType,
    };
    use crate::storage::schema;
    use rusqlite::Connection;
    use std::collections::BTreeSet;

    fn current_columns(table: &str) -> BTreeSet<String> {
        let conn = Connection::open_in_memory().unwrap();
        for stmt in schema::all_schema_statements() {
            conn.execute(stmt, []).unwrap();
        }
        crate::storage::migrations::table_columns(&conn, table)
            .unwrap()
            .into_iter()
            .collect()
    }

    /// Every mapping is one-to-one, every column exists, and the attribute
    /// names match the patch's serialized keys exactly.
    fn assert_mapping<P: Patch + Serialize>(full: &P) {
        let attributes: BTreeSet<&str> = P::COLUMNS.iter().map(|(a, _)| *a).collect();
        let columns: BTreeSet<&str> = P::COLUMNS.iter().map(|(_, c)| *c).collect();
        assert_eq!(attributes.len(), P::COLUMNS.len(), "duplicate attribute in {}", P::TABLE);
        assert_eq!(columns.len(), P::COLUMNS.len(), "duplicate column in {}", P::TABLE);

        let existing = current_columns(P::TABLE);
        for column in &columns {
            assert!(existing.contains(*column), "{} has no column {}", P::TABLE, column);
        }

        let serialized = serde_json::to_value(full).unwrap();
        let keys: BTreeSet<&str> = serialized.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, attributes, "attribute names drift from serde keys in {}", P::TABLE);

        let assigned = full.assignments().unwrap();
        assert_eq!(assigned.len(), P::COLUMNS.len());
    }

    #[test]
    fn test_diagram_patch_mapping() {
        let now = Utc::now();
        assert_mapping(&DiagramPatch {
            id: Some("d2".into()),
            name: Some("Shop".into()),
            database_type: Some("postgres".into()),
            database_edition: Some(None),
            created_at: Some(now),
            updated_at: Some(now),
        });
    }

    #[test]
    fn test_table_patch_mapping() {
        assert_mapping(&TablePatch {
            diagram_id: Some("d1".into()),
            name: Some("users".into()),
            schema: Some(Some("public".into())),
            x: Some(1.0),
            y: Some(2.0),
            fields: Some(vec![DBField::new("f1", "id", "int")]),
            indexes: Some(Vec::<DBIndex>::new()),
            color: Some(None),
            created_at: Some(Utc::now()),
            width: Some(Some(240.0)),
            comment: Some(None),
            is_view: Some(false),
            is_materialized_view: Some(false),
            order: Some(Some(3)),
        });
    }

    #[test]
    fn test_relationship_patch_mapping() {
        assert_mapping(&RelationshipPatch {
            diagram_id: Some("d1".into()),
            name: Some(Some("fk".into())),
            source_schema: Some(None),
            source_table_id: Some("t1".into()),
            target_schema: Some(None),
            target_table_id: Some("t2".into()),
            source_field_id: Some(None),
            target_field_id: Some(None),
            relationship_type: Some(Some(RelationshipType::OneToMany)),
            source_cardinality: Some(Cardinality::One),
            target_cardinality: Some(Cardinality::Many),
            created_at: Some(Utc::now()),
        });
    }

    #[test]
    fn test_dependency_area_custom_type_config_mappings() {
        assert_mapping(&DependencyPatch {
            diagram_id: Some("d1".into()),
            schema: Some(None),
            table_id: Some("t1".into()),
            dependent_schema: Some(None),
            dependent_table_id: Some("t2".into()),
            created_at: Some(Utc::now()),
        });
        assert_mapping(&AreaPatch {
            diagram_id: Some("d1".into()),
            name: Some("billing".into()),
            x: Some(0.0),
            y: Some(0.0),
            width: Some(10.0),
            height: Some(10.0),
            color: Some(Some("#fff".into())),
        });
        assert_mapping(&CustomTypePatch {
            diagram_id: Some("d1".into()),
            schema: Some(None),
            type_name: Some("mood".into()),
            kind: Some(Some(CustomTypeKind::Composite)),
            values: Some(vec![]),
            fields: Some(vec![DBCustomTypeField {
                field: "a".into(),
                field_type: "int".into(),
            }]),
        });
        assert_mapping(&ConfigPatch::default_diagram("d1"));
    }

    #[test]
    fn test_record_columns_exist() {
        fn check<R: Record>() {
            let existing = current_columns(R::TABLE);
            let declared: BTreeSet<String> = R::COLUMNS.iter().map(|c| c.to_string()).collect();
            assert_eq!(declared, existing, "record columns drift in {}", R::TABLE);
        }
        check::<DBTable>();
        check::<DBRelationship>();
        check::<DBDependency>();
        check::<Area>();
        check::<DBCustomType>();
    }

    #[test]
    fn test_empty_patch_has_no_assignments() {
        assert!(TablePatch::default().assignments().unwrap().is_empty());
        assert!(DiagramPatch::default().assignments().unwrap().is_empty());
    }
}
