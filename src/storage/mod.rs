//! Storage Layer - one contract, two backends
//!
//! [`DiagramStorage`] is the only interface the rest of the crate depends
//! on. Two implementations exist:
//! - [`LocalStore`]: embedded SQLite file, versioned by the migration chain
//! - [`RemoteStore`]: the chartstore record service over HTTP
//!
//! Backends are chosen at startup by [`open_storage`], which migrates
//! (embedded only) and bootstraps the config row before returning.

pub mod bootstrap;
pub mod cascade;
pub mod local;
pub mod migrations;
pub mod records;
pub mod remote;
pub mod schema;
pub mod sqlite;

pub use bootstrap::{ensure_config, open_storage};
pub use cascade::{CascadeOutcome, ChildCollection};
pub use local::LocalStore;
pub use migrations::{MigrationReport, MIGRATIONS};
pub use remote::RemoteStore;
pub use sqlite::{SharedStore, SqliteStore};

use async_trait::async_trait;

use crate::model::{
    Area, AreaPatch, Config, ConfigPatch, CustomTypePatch, DBCustomType, DBDependency,
    DBRelationship, DBTable, DependencyPatch, Diagram, DiagramFilter, DiagramIncludes,
    DiagramPatch, RelationshipPatch, TablePatch,
};
use crate::Result;

/// The persistence contract every backend satisfies identically.
///
/// Conventions shared by all entity operations:
/// - `add_*` validates required fields and fails with a validation error
///   before touching storage.
/// - `get_*` returns `Ok(None)` for an unknown id.
/// - `update_*` writes only the attributes set on the patch; an unknown id
///   is not an error.
/// - `delete_*` on an absent entity is not an error.
/// - relationships are listed by name and custom types by type name, ties in
///   insertion order; other collections list in insertion order.
#[async_trait]
pub trait DiagramStorage: Send + Sync {
    /// Short backend name for logs and CLI output.
    fn backend(&self) -> &'static str;

    // ========== Config ==========

    async fn get_config(&self) -> Result<Option<Config>>;

    /// Update the singleton in place. Fails with `NotFound` if bootstrap has
    /// not created it yet.
    async fn update_config(&self, patch: ConfigPatch) -> Result<()>;

    /// Create the singleton. Only bootstrap calls this.
    async fn initialize_config(&self, default_diagram_id: &str) -> Result<Config>;

    // ========== Diagram filters ==========

    async fn get_diagram_filter(&self, diagram_id: &str) -> Result<Option<DiagramFilter>>;
    async fn put_diagram_filter(&self, diagram_id: &str, filter: DiagramFilter) -> Result<()>;
    async fn delete_diagram_filter(&self, diagram_id: &str) -> Result<()>;

    // ========== Diagrams ==========

    /// Store the diagram and any attached children under its id.
    async fn add_diagram(&self, diagram: Diagram) -> Result<()>;
    async fn list_diagrams(&self, includes: DiagramIncludes) -> Result<Vec<Diagram>>;
    async fn get_diagram(&self, id: &str, includes: DiagramIncludes) -> Result<Option<Diagram>>;

    /// Patch the diagram. A new `id` re-points all six child collections
    /// (not atomic).
    async fn update_diagram(&self, id: &str, patch: DiagramPatch) -> Result<()>;

    /// Delete the diagram and everything it owns.
    async fn delete_diagram(&self, id: &str) -> Result<()>;

    // ========== Tables ==========

    async fn add_table(&self, diagram_id: &str, table: DBTable) -> Result<()>;
    async fn get_table(&self, diagram_id: &str, id: &str) -> Result<Option<DBTable>>;
    async fn update_table(&self, id: &str, patch: TablePatch) -> Result<()>;
    /// Insert or replace, keyed by id.
    async fn put_table(&self, diagram_id: &str, table: DBTable) -> Result<()>;
    async fn delete_table(&self, diagram_id: &str, id: &str) -> Result<()>;
    async fn list_tables(&self, diagram_id: &str) -> Result<Vec<DBTable>>;
    async fn delete_diagram_tables(&self, diagram_id: &str) -> Result<()>;

    // ========== Relationships ==========

    async fn add_relationship(&self, diagram_id: &str, relationship: DBRelationship) -> Result<()>;
    async fn get_relationship(&self, diagram_id: &str, id: &str) -> Result<Option<DBRelationship>>;
    async fn update_relationship(&self, id: &str, patch: RelationshipPatch) -> Result<()>;
    async fn delete_relationship(&self, diagram_id: &str, id: &str) -> Result<()>;
    async fn list_relationships(&self, diagram_id: &str) -> Result<Vec<DBRelationship>>;
    async fn delete_diagram_relationships(&self, diagram_id: &str) -> Result<()>;

    // ========== Dependencies ==========

    async fn add_dependency(&self, diagram_id: &str, dependency: DBDependency) -> Result<()>;
    async fn get_dependency(&self, diagram_id: &str, id: &str) -> Result<Option<DBDependency>>;
    async fn update_dependency(&self, id: &str, patch: DependencyPatch) -> Result<()>;
    async fn delete_dependency(&self, diagram_id: &str, id: &str) -> Result<()>;
    async fn list_dependencies(&self, diagram_id: &str) -> Result<Vec<DBDependency>>;
    async fn delete_diagram_dependencies(&self, diagram_id: &str) -> Result<()>;

    // ========== Areas ==========

    async fn add_area(&self, diagram_id: &str, area: Area) -> Result<()>;
    async fn get_area(&self, diagram_id: &str, id: &str) -> Result<Option<Area>>;
    async fn update_area(&self, id: &str, patch: AreaPatch) -> Result<()>;
    async fn delete_area(&self, diagram_id: &str, id: &str) -> Result<()>;
    async fn list_areas(&self, diagram_id: &str) -> Result<Vec<Area>>;
    async fn delete_diagram_areas(&self, diagram_id: &str) -> Result<()>;

    // ========== Custom types ==========

    async fn add_custom_type(&self, diagram_id: &str, custom_type: DBCustomType) -> Result<()>;
    async fn get_custom_type(&self, diagram_id: &str, id: &str) -> Result<Option<DBCustomType>>;
    async fn update_custom_type(&self, id: &str, patch: CustomTypePatch) -> Result<()>;
    async fn delete_custom_type(&self, diagram_id: &str, id: &str) -> Result<()>;
    async fn list_custom_types(&self, diagram_id: &str) -> Result<Vec<DBCustomType>>;
    async fn delete_diagram_custom_types(&self, diagram_id: &str) -> Result<()>;
}
