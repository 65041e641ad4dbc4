//! SQLite storage implementation

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::cascade::ChildCollection;
use super::migrations::{self, MigrationReport};
use super::records::{self, column_list, Patch, Record};
use super::schema;
use crate::model::{
    Config, ConfigPatch, Diagram, DiagramFilter, DiagramIncludes, DiagramPatch, CONFIG_ID,
};
use crate::{Error, Result};

/// SQLite-backed storage for diagrams and their child collections
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open an embedded store file (creates if doesn't exist) and migrate
    /// it to the latest version.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_report(path).map(|(store, _)| store)
    }

    /// Same as [`SqliteStore::open`], also returning what the migration run
    /// did.
    pub fn open_with_report(path: &Path) -> Result<(Self, MigrationReport)> {
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let report = migrations::run_migrations(&mut conn)?;
        if !report.is_noop() {
            info!(
                "Store {} migrated from version {} to {}",
                path.display(),
                report.from,
                report.to
            );
        }
        Ok((Self { conn }, report))
    }

    /// Open an in-memory embedded store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migrations::run_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    /// Open the record service database, creating the current shape
    /// directly.
    pub fn open_service(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// In-memory record service database (for testing)
    pub fn open_service_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn version(&self) -> Result<usize> {
        migrations::current_version(&self.conn)
    }

    pub fn ping(&self) -> Result<()> {
        self.conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    // ========== Config Operations ==========

    pub fn get_config(&self) -> Result<Option<Config>> {
        self.conn
            .query_row(
                "SELECT id, default_diagram_id FROM config WHERE id = ?1",
                [CONFIG_ID],
                |row| {
                    Ok(Config {
                        id: row.get(0)?,
                        default_diagram_id: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Create the singleton. Fails if it already exists.
    pub fn insert_config(&self, config: &Config) -> Result<()> {
        self.conn.execute(
            "INSERT INTO config (id, default_diagram_id) VALUES (?1, ?2)",
            params![config.id, config.default_diagram_id],
        )?;
        Ok(())
    }

    /// Update the singleton in place; returns rows changed (0 when absent).
    pub fn update_config(&self, patch: &ConfigPatch) -> Result<usize> {
        update_row(&self.conn, "id", Value::Integer(CONFIG_ID), patch)
    }

    pub fn upsert_config(&self, default_diagram_id: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO config (id, default_diagram_id) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET default_diagram_id = excluded.default_diagram_id
            "#,
            params![CONFIG_ID, default_diagram_id],
        )?;
        Ok(())
    }

    // ========== Diagram Filter Operations ==========

    pub fn get_filter(&self, diagram_id: &str) -> Result<Option<DiagramFilter>> {
        self.conn
            .query_row(
                "SELECT diagram_id, table_ids, schemas_ids FROM diagram_filters WHERE diagram_id = ?1",
                [diagram_id],
                |row| {
                    Ok(DiagramFilter {
                        diagram_id: row.get(0)?,
                        table_ids: records::opt_json_column(row, 1)?,
                        schemas_ids: records::opt_json_column(row, 2)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Insert or replace the filter. `None` is stored as SQL NULL and an
    /// empty list as `[]`.
    pub fn put_filter(&self, diagram_id: &str, filter: &DiagramFilter) -> Result<()> {
        let table_ids = filter.table_ids.as_ref().map(serde_json::to_string).transpose()?;
        let schemas_ids = filter.schemas_ids.as_ref().map(serde_json::to_string).transpose()?;
        self.conn.execute(
            r#"
            INSERT INTO diagram_filters (diagram_id, table_ids, schemas_ids) VALUES (?1, ?2, ?3)
            ON CONFLICT(diagram_id) DO UPDATE SET
                table_ids = excluded.table_ids,
                schemas_ids = excluded.schemas_ids
            "#,
            params![diagram_id, table_ids, schemas_ids],
        )?;
        Ok(())
    }

    pub fn delete_filter(&self, diagram_id: &str) -> Result<usize> {
        delete_collection(&self.conn, ChildCollection::DiagramFilter, diagram_id)
    }

    // ========== Diagram Operations ==========

    /// Insert the diagram row only; attached children are ignored.
    pub fn insert_diagram(&self, diagram: &Diagram) -> Result<()> {
        insert_diagram_row(&self.conn, diagram)
    }

    /// Insert the diagram and every attached child in one transaction.
    pub fn add_diagram(&mut self, diagram: &Diagram) -> Result<()> {
        let tx = self.conn.transaction()?;
        insert_diagram_row(&tx, diagram)?;
        for table in diagram.tables.iter().flatten() {
            insert_record(&tx, &diagram.id, table, false)?;
        }
        for relationship in diagram.relationships.iter().flatten() {
            insert_record(&tx, &diagram.id, relationship, false)?;
        }
        for dependency in diagram.dependencies.iter().flatten() {
            insert_record(&tx, &diagram.id, dependency, false)?;
        }
        for area in diagram.areas.iter().flatten() {
            insert_record(&tx, &diagram.id, area, false)?;
        }
        for custom_type in diagram.custom_types.iter().flatten() {
            insert_record(&tx, &diagram.id, custom_type, false)?;
        }
        tx.commit()?;
        debug!("Added diagram {}", diagram.id);
        Ok(())
    }

    /// All diagrams in insertion order.
    pub fn list_diagrams(&self, includes: DiagramIncludes) -> Result<Vec<Diagram>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM diagrams ORDER BY rowid",
            column_list(records::DIAGRAM_COLUMNS)
        ))?;
        let mut diagrams = stmt
            .query_map([], records::diagram_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if includes.any() {
            for diagram in &mut diagrams {
                self.attach_children(diagram, includes)?;
            }
        }
        Ok(diagrams)
    }

    pub fn get_diagram(&self, id: &str, includes: DiagramIncludes) -> Result<Option<Diagram>> {
        let diagram = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM diagrams WHERE id = ?1",
                    column_list(records::DIAGRAM_COLUMNS)
                ),
                [id],
                records::diagram_from_row,
            )
            .optional()?;

        match diagram {
            Some(mut diagram) => {
                self.attach_children(&mut diagram, includes)?;
                Ok(Some(diagram))
            }
            None => Ok(None),
        }
    }

    fn attach_children(&self, diagram: &mut Diagram, includes: DiagramIncludes) -> Result<()> {
        if includes.include_tables {
            diagram.tables = Some(self.list_records(&diagram.id)?);
        }
        if includes.include_relationships {
            diagram.relationships = Some(self.list_records(&diagram.id)?);
        }
        if includes.include_dependencies {
            diagram.dependencies = Some(self.list_records(&diagram.id)?);
        }
        if includes.include_areas {
            diagram.areas = Some(self.list_records(&diagram.id)?);
        }
        if includes.include_custom_types {
            diagram.custom_types = Some(self.list_records(&diagram.id)?);
        }
        Ok(())
    }

    /// Patch the diagram row only. Re-pointing children on an id change is
    /// the caller's cascade.
    pub fn update_diagram(&self, id: &str, patch: &DiagramPatch) -> Result<usize> {
        update_row(&self.conn, "id", records::text(id), patch)
    }

    /// Delete the diagram row only.
    pub fn delete_diagram(&self, id: &str) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM diagrams WHERE id = ?1", [id])?)
    }

    /// Delete the diagram and all six child collections atomically.
    pub fn delete_diagram_cascade(&mut self, id: &str) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut deleted = tx.execute("DELETE FROM diagrams WHERE id = ?1", [id])?;
        for collection in ChildCollection::ALL {
            deleted += delete_collection(&tx, collection, id)?;
        }
        tx.commit()?;
        debug!("Deleted diagram {} with {} rows", id, deleted);
        Ok(deleted)
    }

    pub fn delete_collection(&self, collection: ChildCollection, diagram_id: &str) -> Result<usize> {
        delete_collection(&self.conn, collection, diagram_id)
    }

    /// Move every row of `collection` from one diagram id to another.
    pub fn reassign(&self, collection: ChildCollection, from: &str, to: &str) -> Result<usize> {
        Ok(self.conn.execute(
            &format!("UPDATE {} SET diagram_id = ?1 WHERE diagram_id = ?2", collection.table()),
            [to, from],
        )?)
    }

    // ========== Child Operations ==========

    pub fn add_record<R: Record>(&self, diagram_id: &str, record: &R) -> Result<()> {
        insert_record(&self.conn, diagram_id, record, false)
    }

    /// Insert or replace, keyed by id.
    pub fn put_record<R: Record>(&self, diagram_id: &str, record: &R) -> Result<()> {
        insert_record(&self.conn, diagram_id, record, true)
    }

    pub fn get_record<R: Record>(&self, diagram_id: &str, id: &str) -> Result<Option<R>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE diagram_id = ?1 AND id = ?2",
                    column_list(R::COLUMNS),
                    R::TABLE
                ),
                [diagram_id, id],
                R::from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn list_records<R: Record>(&self, diagram_id: &str) -> Result<Vec<R>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} WHERE diagram_id = ?1 ORDER BY {}",
            column_list(R::COLUMNS),
            R::TABLE,
            R::ORDER_BY
        ))?;
        let records = stmt
            .query_map([diagram_id], R::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Apply a partial update by id; returns rows changed.
    pub fn update_record<P: Patch>(&self, id: &str, patch: &P) -> Result<usize> {
        update_row(&self.conn, "id", records::text(id), patch)
    }

    pub fn delete_record<R: Record>(&self, diagram_id: &str, id: &str) -> Result<usize> {
        Ok(self.conn.execute(
            &format!("DELETE FROM {} WHERE diagram_id = ?1 AND id = ?2", R::TABLE),
            [diagram_id, id],
        )?)
    }

    pub fn delete_records<R: Record>(&self, diagram_id: &str) -> Result<usize> {
        Ok(self
            .conn
            .execute(&format!("DELETE FROM {} WHERE diagram_id = ?1", R::TABLE), [diagram_id])?)
    }

    pub fn count_diagrams(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM diagrams", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

// ========== Statement helpers ==========
// Free functions so they run the same on a connection or a transaction.

fn insert_diagram_row(conn: &Connection, diagram: &Diagram) -> Result<()> {
    let columns = records::DIAGRAM_COLUMNS;
    conn.execute(
        &format!(
            "INSERT INTO diagrams ({}) VALUES ({})",
            column_list(columns),
            placeholders(columns.len())
        ),
        params_from_iter(records::diagram_values(diagram)),
    )?;
    Ok(())
}

fn insert_record<R: Record>(conn: &Connection, diagram_id: &str, record: &R, replace: bool) -> Result<()> {
    let verb = if replace { "INSERT OR REPLACE" } else { "INSERT" };
    conn.execute(
        &format!(
            "{} INTO {} ({}) VALUES ({})",
            verb,
            R::TABLE,
            column_list(R::COLUMNS),
            placeholders(R::COLUMNS.len())
        ),
        params_from_iter(record.values(diagram_id)?),
    )?;
    debug!("Stored {} {} under diagram {}", R::NOUN, record.id(), diagram_id);
    Ok(())
}

fn update_row<P: Patch>(conn: &Connection, key_column: &str, key: Value, patch: &P) -> Result<usize> {
    let assignments = patch.assignments()?;
    if assignments.is_empty() {
        return Ok(0);
    }

    let set_clause = assignments
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("\"{}\" = ?{}", column, i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {} WHERE \"{}\" = ?{}",
        P::TABLE,
        set_clause,
        key_column,
        assignments.len() + 1
    );

    let mut values: Vec<Value> = assignments.into_iter().map(|(_, value)| value).collect();
    values.push(key);
    Ok(conn.execute(&sql, params_from_iter(values))?)
}

fn delete_collection(conn: &Connection, collection: ChildCollection, diagram_id: &str) -> Result<usize> {
    Ok(conn.execute(
        &format!("DELETE FROM {} WHERE diagram_id = ?1", collection.table()),
        [diagram_id],
    )?)
}

fn placeholders(count: usize) -> String {
    (1..=count).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

// ========== Shared handle ==========

/// A store shared across async tasks. Each operation runs on the blocking
/// pool while holding the lock.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<SqliteStore>>,
}

impl SharedStore {
    pub fn new(store: SqliteStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut store = inner
                .lock()
                .map_err(|_| Error::Task(format!("{}: store lock poisoned", operation)))?;
            debug!("storage: {}", operation);
            f(&mut store)
        })
        .await
        .map_err(|e| Error::Task(format!("{}: {}", operation, e)))?
    }
}
