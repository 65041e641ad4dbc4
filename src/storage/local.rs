//! Embedded backend
//!
//! Runs every operation against a migrated SQLite file on the blocking pool.
//! Diagram rename and delete fan out to the child collections concurrently,
//! one statement per collection, with no rollback across collections.

use async_trait::async_trait;
use std::path::PathBuf;

use super::cascade::{self, ChildCollection};
use super::records::{Patch, Record};
use super::sqlite::{SharedStore, SqliteStore};
use super::DiagramStorage;
use crate::model::{
    Area, AreaPatch, Config, ConfigPatch, CustomTypePatch, DBCustomType, DBDependency,
    DBRelationship, DBTable, DependencyPatch, Diagram, DiagramFilter, DiagramIncludes,
    DiagramPatch, RelationshipPatch, TablePatch, Validate,
};
use crate::{Error, Result};

#[derive(Clone)]
pub struct LocalStore {
    store: SharedStore,
}

impl LocalStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Open (and migrate) the store file on the blocking pool.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let store = tokio::task::spawn_blocking(move || SqliteStore::open(&path))
            .await
            .map_err(|e| Error::Task(format!("open store: {}", e)))??;
        Ok(Self::new(SharedStore::new(store)))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(SharedStore::new(SqliteStore::open_in_memory()?)))
    }

    pub fn shared(&self) -> &SharedStore {
        &self.store
    }

    async fn add<R: Record + Validate>(&self, operation: &'static str, diagram_id: &str, record: R) -> Result<()> {
        record.validate()?;
        let diagram_id = diagram_id.to_string();
        self.store
            .run(operation, move |s| s.add_record(&diagram_id, &record))
            .await
    }

    async fn get<R: Record>(&self, operation: &'static str, diagram_id: &str, id: &str) -> Result<Option<R>> {
        let (diagram_id, id) = (diagram_id.to_string(), id.to_string());
        self.store
            .run(operation, move |s| s.get_record(&diagram_id, &id))
            .await
    }

    async fn list<R: Record>(&self, operation: &'static str, diagram_id: &str) -> Result<Vec<R>> {
        let diagram_id = diagram_id.to_string();
        self.store
            .run(operation, move |s| s.list_records(&diagram_id))
            .await
    }

    async fn update<P: Patch>(&self, operation: &'static str, id: &str, patch: P) -> Result<()> {
        let id = id.to_string();
        self.store
            .run(operation, move |s| s.update_record(&id, &patch))
            .await?;
        Ok(())
    }

    async fn delete<R: Record>(&self, operation: &'static str, diagram_id: &str, id: &str) -> Result<()> {
        let (diagram_id, id) = (diagram_id.to_string(), id.to_string());
        self.store
            .run(operation, move |s| s.delete_record::<R>(&diagram_id, &id))
            .await?;
        Ok(())
    }

    async fn delete_all<R: Record>(&self, operation: &'static str, diagram_id: &str) -> Result<()> {
        let diagram_id = diagram_id.to_string();
        self.store
            .run(operation, move |s| s.delete_records::<R>(&diagram_id))
            .await?;
        Ok(())
    }

    /// Re-point every child collection from `from` to `to`, concurrently.
    pub(crate) async fn reassign_children(&self, from: &str, to: &str) -> Result<usize> {
        cascade::fan_out("rename", from, |collection| {
            let (from, to) = (from.to_string(), to.to_string());
            self.store
                .run("reassign", move |s| s.reassign(collection, &from, &to))
        })
        .await
        .into_result()
    }

    async fn delete_children(&self, diagram_id: &str) -> Result<usize> {
        cascade::fan_out("delete", diagram_id, |collection: ChildCollection| {
            let diagram_id = diagram_id.to_string();
            self.store
                .run("delete_collection", move |s| s.delete_collection(collection, &diagram_id))
        })
        .await
        .into_result()
    }
}

#[async_trait]
impl DiagramStorage for LocalStore {
    fn backend(&self) -> &'static str {
        "embedded"
    }

    // ========== Config ==========

    async fn get_config(&self) -> Result<Option<Config>> {
        self.store.run("get_config", |s| s.get_config()).await
    }

    async fn update_config(&self, patch: ConfigPatch) -> Result<()> {
        self.store
            .run("update_config", move |s| {
                if s.get_config()?.is_none() {
                    return Err(Error::NotFound("config".to_string()));
                }
                s.update_config(&patch)
            })
            .await?;
        Ok(())
    }

    async fn initialize_config(&self, default_diagram_id: &str) -> Result<Config> {
        let config = Config::new(default_diagram_id);
        let row = config.clone();
        self.store
            .run("initialize_config", move |s| s.insert_config(&row))
            .await?;
        Ok(config)
    }

    // ========== Diagram filters ==========

    async fn get_diagram_filter(&self, diagram_id: &str) -> Result<Option<DiagramFilter>> {
        let diagram_id = diagram_id.to_string();
        self.store
            .run("get_diagram_filter", move |s| s.get_filter(&diagram_id))
            .await
    }

    async fn put_diagram_filter(&self, diagram_id: &str, filter: DiagramFilter) -> Result<()> {
        let diagram_id = diagram_id.to_string();
        self.store
            .run("put_diagram_filter", move |s| s.put_filter(&diagram_id, &filter))
            .await
    }

    async fn delete_diagram_filter(&self, diagram_id: &str) -> Result<()> {
        let diagram_id = diagram_id.to_string();
        self.store
            .run("delete_diagram_filter", move |s| s.delete_filter(&diagram_id))
            .await?;
        Ok(())
    }

    // ========== Diagrams ==========

    async fn add_diagram(&self, diagram: Diagram) -> Result<()> {
        diagram.validate()?;
        self.store
            .run("add_diagram", move |s| s.add_diagram(&diagram))
            .await
    }

    async fn list_diagrams(&self, includes: DiagramIncludes) -> Result<Vec<Diagram>> {
        self.store
            .run("list_diagrams", move |s| s.list_diagrams(includes))
            .await
    }

    async fn get_diagram(&self, id: &str, includes: DiagramIncludes) -> Result<Option<Diagram>> {
        let id = id.to_string();
        self.store
            .run("get_diagram", move |s| s.get_diagram(&id, includes))
            .await
    }

    async fn update_diagram(&self, id: &str, patch: DiagramPatch) -> Result<()> {
        let new_id = patch.renamed_id(id).map(str::to_string);
        let current = id.to_string();
        self.store
            .run("update_diagram", move |s| s.update_diagram(&current, &patch))
            .await?;

        if let Some(new_id) = new_id {
            self.reassign_children(id, &new_id).await?;
        }
        Ok(())
    }

    async fn delete_diagram(&self, id: &str) -> Result<()> {
        let diagram_id = id.to_string();
        let (row, children) = tokio::join!(
            self.store
                .run("delete_diagram", move |s| s.delete_diagram(&diagram_id)),
            self.delete_children(id),
        );
        row?;
        children?;
        Ok(())
    }

    // ========== Tables ==========

    async fn add_table(&self, diagram_id: &str, table: DBTable) -> Result<()> {
        self.add("add_table", diagram_id, table).await
    }

    async fn get_table(&self, diagram_id: &str, id: &str) -> Result<Option<DBTable>> {
        self.get("get_table", diagram_id, id).await
    }

    async fn update_table(&self, id: &str, patch: TablePatch) -> Result<()> {
        self.update("update_table", id, patch).await
    }

    async fn put_table(&self, diagram_id: &str, table: DBTable) -> Result<()> {
        table.validate()?;
        let diagram_id = diagram_id.to_string();
        self.store
            .run("put_table", move |s| s.put_record(&diagram_id, &table))
            .await
    }

    async fn delete_table(&self, diagram_id: &str, id: &str) -> Result<()> {
        self.delete::<DBTable>("delete_table", diagram_id, id).await
    }

    async fn list_tables(&self, diagram_id: &str) -> Result<Vec<DBTable>> {
        self.list("list_tables", diagram_id).await
    }

    async fn delete_diagram_tables(&self, diagram_id: &str) -> Result<()> {
        self.delete_all::<DBTable>("delete_diagram_tables", diagram_id).await
    }

    // ========== Relationships ==========

    async fn add_relationship(&self, diagram_id: &str, relationship: DBRelationship) -> Result<()> {
        self.add("add_relationship", diagram_id, relationship).await
    }

    async fn get_relationship(&self, diagram_id: &str, id: &str) -> Result<Option<DBRelationship>> {
        self.get("get_relationship", diagram_id, id).await
    }

    async fn update_relationship(&self, id: &str, patch: RelationshipPatch) -> Result<()> {
        self.update("update_relationship", id, patch).await
    }

    async fn delete_relationship(&self, diagram_id: &str, id: &str) -> Result<()> {
        self.delete::<DBRelationship>("delete_relationship", diagram_id, id).await
    }

    async fn list_relationships(&self, diagram_id: &str) -> Result<Vec<DBRelationship>> {
        self.list("list_relationships", diagram_id).await
    }

    async fn delete_diagram_relationships(&self, diagram_id: &str) -> Result<()> {
        self.delete_all::<DBRelationship>("delete_diagram_relationships", diagram_id)
            .await
    }

    // ========== Dependencies ==========

    async fn add_dependency(&self, diagram_id: &str, dependency: DBDependency) -> Result<()> {
        self.add("add_dependency", diagram_id, dependency).await
    }

    async fn get_dependency(&self, diagram_id: &str, id: &str) -> Result<Option<DBDependency>> {
        self.get("get_dependency", diagram_id, id).await
    }

    async fn update_dependency(&self, id: &str, patch: DependencyPatch) -> Result<()> {
        self.update("update_dependency", id, patch).await
    }

    async fn delete_dependency(&self, diagram_id: &str, id: &str) -> Result<()> {
        self.delete::<DBDependency>("delete_dependency", diagram_id, id).await
    }

    async fn list_dependencies(&self, diagram_id: &str) -> Result<Vec<DBDependency>> {
        self.list("list_dependencies", diagram_id).await
    }

    async fn delete_diagram_dependencies(&self, diagram_id: &str) -> Result<()> {
        self.delete_all::<DBDependency>("delete_diagram_dependencies", diagram_id)
            .await
    }

    // ========== Areas ==========

    async fn add_area(&self, diagram_id: &str, area: Area) -> Result<()> {
        self.add("add_area", diagram_id, area).await
    }

    async fn get_area(&self, diagram_id: &str, id: &str) -> Result<Option<Area>> {
        self.get("get_area", diagram_id, id).await
    }

    async fn update_area(&self, id: &str, patch: AreaPatch) -> Result<()> {
        self.update("update_area", id, patch).await
    }

    async fn delete_area(&self, diagram_id: &str, id: &str) -> Result<()> {
        self.delete::<Area>("delete_area", diagram_id, id).await
    }

    async fn list_areas(&self, diagram_id: &str) -> Result<Vec<Area>> {
        self.list("list_areas", diagram_id).await
    }

    async fn delete_diagram_areas(&self, diagram_id: &str) -> Result<()> {
        self.delete_all::<Area>("delete_diagram_areas", diagram_id).await
    }

    // ========== Custom types ==========

    async fn add_custom_type(&self, diagram_id: &str, custom_type: DBCustomType) -> Result<()> {
        self.add("add_custom_type", diagram_id, custom_type).await
    }

    async fn get_custom_type(&self, diagram_id: &str, id: &str) -> Result<Option<DBCustomType>> {
        self.get("get_custom_type", diagram_id, id).await
    }

    async fn update_custom_type(&self, id: &str, patch: CustomTypePatch) -> Result<()> {
        self.update("update_custom_type", id, patch).await
    }

    async fn delete_custom_type(&self, diagram_id: &str, id: &str) -> Result<()> {
        self.delete::<DBCustomType>("delete_custom_type", diagram_id, id).await
    }

    async fn list_custom_types(&self, diagram_id: &str) -> Result<Vec<DBCustomType>> {
        self.list("list_custom_types", diagram_id).await
    }

    async fn delete_diagram_custom_types(&self, diagram_id: &str) -> Result<()> {
        self.delete_all::<DBCustomType>("delete_diagram_custom_types", diagram_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> LocalStore {
        let store = LocalStore::open_in_memory().unwrap();
        store
            .add_diagram(Diagram::new("d1", "Shop", "postgres"))
            .await
            .unwrap();
        store.add_table("d1", DBTable::new("t1", "users")).await.unwrap();
        store
            .add_relationship("d1", DBRelationship::new("r1", "t1", "t1"))
            .await
            .unwrap();
        store
            .add_dependency("d1", DBDependency::new("dep1", "t1", "t1"))
            .await
            .unwrap();
        store.add_area("d1", Area::new("a1", "billing")).await.unwrap();
        store
            .add_custom_type("d1", DBCustomType::new("c1", "mood"))
            .await
            .unwrap();
        store
            .put_diagram_filter("d1", DiagramFilter::unfiltered("d1"))
            .await
            .unwrap();
        store
    }

    async fn drop_table(store: &LocalStore, table: &'static str) {
        store
            .shared()
            .run("drop", move |s| {
                s.connection().execute_batch(&format!("DROP TABLE {}", table))?;
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_scenario_add_list_delete() {
        let store = LocalStore::open_in_memory().unwrap();
        store
            .add_diagram(Diagram::new("d1", "Shop", "postgres"))
            .await
            .unwrap();
        store.add_table("d1", DBTable::new("t1", "users")).await.unwrap();

        let tables = store.list_tables("d1").await.unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].id, "t1");

        store.delete_diagram("d1").await.unwrap();
        assert!(store.list_tables("d1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_rejects_missing_fields() {
        let store = LocalStore::open_in_memory().unwrap();
        let err = store
            .add_diagram(Diagram::new("d1", "", "postgres"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Missing required fields: id, name, or databaseType"
        );

        let err = store
            .add_relationship("d1", DBRelationship::new("r1", "t1", ""))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(store.list_relationships("d1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_entities_are_none_not_errors() {
        let store = LocalStore::open_in_memory().unwrap();
        assert!(store.get_table("d1", "nope").await.unwrap().is_none());
        assert!(store.get_diagram("nope", DiagramIncludes::all()).await.unwrap().is_none());
        store.delete_area("d1", "nope").await.unwrap();
        store.update_area("nope", AreaPatch::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_config_requires_bootstrap() {
        let store = LocalStore::open_in_memory().unwrap();
        let err = store
            .update_config(ConfigPatch::default_diagram("d1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        store.initialize_config("").await.unwrap();
        store
            .update_config(ConfigPatch::default_diagram("d1"))
            .await
            .unwrap();
        assert_eq!(store.get_config().await.unwrap(), Some(Config::new("d1")));
    }

    #[tokio::test]
    async fn test_rename_repoints_every_collection() {
        let store = seeded().await;
        store
            .update_diagram("d1", DiagramPatch::move_to("d2"))
            .await
            .unwrap();

        assert!(store.get_diagram("d1", DiagramIncludes::default()).await.unwrap().is_none());
        let moved = store.get_diagram("d2", DiagramIncludes::all()).await.unwrap().unwrap();
        assert_eq!(moved.tables.unwrap()[0].diagram_id, "d2");
        assert_eq!(moved.relationships.unwrap().len(), 1);
        assert_eq!(moved.dependencies.unwrap().len(), 1);
        assert_eq!(moved.areas.unwrap().len(), 1);
        assert_eq!(moved.custom_types.unwrap().len(), 1);
        assert!(store.get_diagram_filter("d2").await.unwrap().is_some());

        assert!(store.list_tables("d1").await.unwrap().is_empty());
        assert!(store.get_diagram_filter("d1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rename_onto_taken_id_moves_nothing() {
        let store = seeded().await;
        store
            .add_diagram(Diagram::new("d2", "Billing", "mysql"))
            .await
            .unwrap();
        store.add_table("d2", DBTable::new("t2", "invoices")).await.unwrap();

        let err = store
            .update_diagram("d1", DiagramPatch::move_to("d2"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)), "got {err}");

        let original = store.get_diagram("d1", DiagramIncludes::all()).await.unwrap().unwrap();
        assert_eq!(original.name, "Shop");
        assert_eq!(original.tables.unwrap()[0].id, "t1");
        assert_eq!(original.areas.unwrap().len(), 1);
        assert!(store.get_diagram_filter("d1").await.unwrap().is_some());

        let other = store.get_diagram("d2", DiagramIncludes::all()).await.unwrap().unwrap();
        assert_eq!(other.name, "Billing");
        let tables = other.tables.unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].id, "t2");
        assert!(other.areas.unwrap().is_empty());
        assert!(store.get_diagram_filter("d2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rename_is_not_atomic() {
        let store = seeded().await;
        drop_table(&store, "areas").await;

        let err = store
            .update_diagram("d1", DiagramPatch::move_to("d2"))
            .await
            .unwrap_err();
        match err {
            Error::Cascade { failed, .. } => assert_eq!(failed, vec!["areas".to_string()]),
            other => panic!("expected cascade error, got {other}"),
        }

        // Steps that succeeded stay applied.
        assert!(store.get_diagram("d2", DiagramIncludes::default()).await.unwrap().is_some());
        assert_eq!(store.list_tables("d2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_clears_every_collection() {
        let store = seeded().await;
        store.delete_diagram("d1").await.unwrap();

        assert!(store.list_tables("d1").await.unwrap().is_empty());
        assert!(store.list_relationships("d1").await.unwrap().is_empty());
        assert!(store.list_dependencies("d1").await.unwrap().is_empty());
        assert!(store.list_areas("d1").await.unwrap().is_empty());
        assert!(store.list_custom_types("d1").await.unwrap().is_empty());
        assert!(store.get_diagram_filter("d1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_partial_failure_leaves_orphans() {
        let store = seeded().await;
        drop_table(&store, "db_custom_types").await;

        let err = store.delete_diagram("d1").await.unwrap_err();
        assert!(matches!(err, Error::Cascade { .. }));
        assert!(store.get_diagram("d1", DiagramIncludes::default()).await.unwrap().is_none());
        assert!(store.list_tables("d1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_custom_types_sorted_by_type() {
        let store = LocalStore::open_in_memory().unwrap();
        for (id, name) in [("c1", "status"), ("c2", "mood"), ("c3", "address")] {
            store
                .add_custom_type("d1", DBCustomType::new(id, name))
                .await
                .unwrap();
        }
        let names: Vec<_> = store
            .list_custom_types("d1")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.type_name)
            .collect();
        assert_eq!(names, vec!["address", "mood", "status"]);
    }
}
