//! Diagram duplication
//!
//! A copy gets fresh ids for the diagram and every entity it owns. All
//! references between entities (relationship ends, dependency ends, index
//! columns, filter table ids) are rewritten to the new ids; references to
//! ids outside the diagram are kept as they are.

use chrono::Utc;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::model::{Diagram, DiagramFilter, DiagramIncludes};
use crate::storage::DiagramStorage;
use crate::{Error, Result};

fn fresh_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Old id → new id.
#[derive(Debug, Default)]
struct IdMap(HashMap<String, String>);

impl IdMap {
    fn assign(&mut self, old: &str) -> String {
        let new = fresh_id();
        self.0.insert(old.to_string(), new.clone());
        new
    }

    fn resolve(&self, id: &str) -> String {
        self.0.get(id).cloned().unwrap_or_else(|| id.to_string())
    }
}

/// A copy of `source` (with whatever children it carries) under new ids.
pub fn clone_diagram(source: &Diagram) -> Diagram {
    let mut copy = source.clone();
    copy.id = fresh_id();

    let mut tables = IdMap::default();
    let mut fields = IdMap::default();

    if let Some(list) = copy.tables.as_mut() {
        for table in list.iter_mut() {
            table.id = tables.assign(&table.id);
            table.diagram_id = copy.id.clone();
            for field in table.fields.iter_mut() {
                field.id = fields.assign(&field.id);
            }
            for index in table.indexes.iter_mut() {
                index.id = fresh_id();
                for field_id in index.field_ids.iter_mut() {
                    *field_id = fields.resolve(field_id);
                }
            }
        }
    }

    if let Some(list) = copy.relationships.as_mut() {
        for relationship in list.iter_mut() {
            relationship.id = fresh_id();
            relationship.diagram_id = copy.id.clone();
            relationship.source_table_id = tables.resolve(&relationship.source_table_id);
            relationship.target_table_id = tables.resolve(&relationship.target_table_id);
            relationship.source_field_id = relationship.source_field_id.as_deref().map(|id| fields.resolve(id));
            relationship.target_field_id = relationship.target_field_id.as_deref().map(|id| fields.resolve(id));
        }
    }

    if let Some(list) = copy.dependencies.as_mut() {
        for dependency in list.iter_mut() {
            dependency.id = fresh_id();
            dependency.diagram_id = copy.id.clone();
            dependency.table_id = tables.resolve(&dependency.table_id);
            dependency.dependent_table_id = tables.resolve(&dependency.dependent_table_id);
        }
    }

    if let Some(list) = copy.areas.as_mut() {
        for area in list.iter_mut() {
            area.id = fresh_id();
            area.diagram_id = copy.id.clone();
        }
    }

    if let Some(list) = copy.custom_types.as_mut() {
        for custom_type in list.iter_mut() {
            custom_type.id = fresh_id();
            custom_type.diagram_id = copy.id.clone();
        }
    }

    copy
}

fn clone_filter(filter: &DiagramFilter, source: &Diagram, copy: &Diagram) -> DiagramFilter {
    let table_map: HashMap<&str, &str> = source
        .tables
        .iter()
        .flatten()
        .zip(copy.tables.iter().flatten())
        .map(|(old, new)| (old.id.as_str(), new.id.as_str()))
        .collect();

    DiagramFilter {
        diagram_id: copy.id.clone(),
        table_ids: filter.table_ids.as_ref().map(|ids| {
            ids.iter()
                .map(|id| table_map.get(id.as_str()).map_or_else(|| id.clone(), |new| new.to_string()))
                .collect()
        }),
        schemas_ids: filter.schemas_ids.clone(),
    }
}

/// Duplicate a stored diagram, its children and its filter. The copy is
/// named `<name> (Copy)` unless `name` is given.
pub async fn duplicate_diagram(
    storage: &dyn DiagramStorage,
    id: &str,
    name: Option<&str>,
) -> Result<Diagram> {
    let source = storage
        .get_diagram(id, DiagramIncludes::all())
        .await?
        .ok_or_else(|| Error::NotFound(format!("diagram '{}'", id)))?;

    let mut copy = clone_diagram(&source);
    copy.name = name
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} (Copy)", source.name));
    let now = Utc::now();
    copy.created_at = now;
    copy.updated_at = now;

    storage.add_diagram(copy.clone()).await?;

    if let Some(filter) = storage.get_diagram_filter(id).await? {
        let filter = clone_filter(&filter, &source, &copy);
        storage.put_diagram_filter(&copy.id, filter).await?;
    }

    info!("Duplicated diagram '{}' as '{}'", id, copy.id);
    Ok(copy)
}
