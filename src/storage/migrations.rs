//! Embedded store migrations
//!
//! An ordered registry of steps. The store version lives in SQLite's
//! `user_version` pragma and equals the number of steps applied. Each step
//! runs in its own transaction and the new version is written inside that
//! same transaction, so a failed step leaves the store at the previous
//! version with none of its changes.

use rusqlite::{Connection, Transaction};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::schema;
use crate::model::{Cardinality, RelationshipType};
use crate::{Error, Result};

/// One step from version `v` to `v + 1`.
pub struct Migration {
    pub description: &'static str,
    pub apply: fn(&Transaction<'_>) -> Result<()>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        description: "create diagrams, tables, relationships and config",
        apply: create_initial_collections,
    },
    Migration {
        description: "structure field types as {id, name}",
        apply: structure_field_types,
    },
    Migration {
        description: "add diagram database edition",
        apply: add_database_edition,
    },
    Migration {
        description: "add table comment",
        apply: add_table_comment,
    },
    Migration {
        description: "add table and relationship schemas",
        apply: add_schemas,
    },
    Migration {
        description: "derive relationship cardinalities from legacy type",
        apply: derive_cardinalities,
    },
    Migration {
        description: "create dependencies",
        apply: create_dependencies,
    },
    Migration {
        description: "add view flags and table order",
        apply: add_view_flags,
    },
    Migration {
        description: "coerce field nullable flags to booleans",
        apply: coerce_nullable_flags,
    },
    Migration {
        description: "create areas",
        apply: create_areas,
    },
    Migration {
        description: "create custom types",
        apply: create_custom_types,
    },
    Migration {
        description: "create diagram filters and reset config",
        apply: create_diagram_filters,
    },
];

/// What a migration run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from: usize,
    pub to: usize,
    pub applied: Vec<&'static str>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

pub fn latest_version() -> usize {
    MIGRATIONS.len()
}

pub fn current_version(conn: &Connection) -> Result<usize> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version.max(0) as usize)
}

/// Bring the store up to the latest version.
pub fn run_migrations(conn: &mut Connection) -> Result<MigrationReport> {
    apply_steps(conn, MIGRATIONS, MIGRATIONS.len())
}

/// Bring the store up to `target` (clamped to the latest version).
pub fn run_migrations_to(conn: &mut Connection, target: usize) -> Result<MigrationReport> {
    apply_steps(conn, MIGRATIONS, target.min(MIGRATIONS.len()))
}

fn apply_steps(conn: &mut Connection, steps: &[Migration], target: usize) -> Result<MigrationReport> {
    let from = current_version(conn)?;
    if from > steps.len() {
        return Err(Error::Migration {
            step: from,
            description: "unknown store version".to_string(),
            message: format!(
                "store is at version {} but only {} migrations are known",
                from,
                steps.len()
            ),
        });
    }

    let mut applied = Vec::new();
    for (index, migration) in steps.iter().enumerate().take(target).skip(from) {
        let version = index + 1;
        debug!("Applying migration {}: {}", version, migration.description);

        let tx = conn.transaction()?;
        let outcome = (migration.apply)(&tx).and_then(|()| {
            tx.pragma_update(None, "user_version", version as i64)?;
            Ok(())
        });
        if let Err(e) = outcome {
            // Dropping the transaction rolls the step back.
            return Err(Error::Migration {
                step: version,
                description: migration.description.to_string(),
                message: e.to_string(),
            });
        }
        tx.commit()?;

        info!("Migrated store to version {} ({})", version, migration.description);
        applied.push(migration.description);
    }

    Ok(MigrationReport {
        from,
        to: from + applied.len(),
        applied,
    })
}

/// Column names of `table`, in declaration order.
pub(crate) fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

fn add_column(tx: &Transaction<'_>, table: &str, column: &str, definition: &str) -> Result<()> {
    if table_columns(tx, table)?.iter().any(|c| c == column) {
        return Ok(());
    }
    tx.execute_batch(&format!(
        "ALTER TABLE {} ADD COLUMN \"{}\" {}",
        table, column, definition
    ))?;
    Ok(())
}

/// Rewrite each table's `fields` JSON, one field object at a time.
/// `rewrite` returns true when it changed the field; untouched rows are
/// not written back.
fn rewrite_table_fields(
    tx: &Transaction<'_>,
    rewrite: impl Fn(&mut Map<String, Value>) -> bool,
) -> Result<usize> {
    let rows: Vec<(String, String)> = {
        let mut stmt = tx.prepare("SELECT id, fields FROM db_tables")?;
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?
    };

    let mut rewritten = 0;
    for (id, raw) in rows {
        let mut fields: Vec<Value> = serde_json::from_str(&raw)?;
        let mut changed = false;
        for field in fields.iter_mut().filter_map(Value::as_object_mut) {
            changed |= rewrite(field);
        }
        if changed {
            tx.execute(
                "UPDATE db_tables SET fields = ?1 WHERE id = ?2",
                rusqlite::params![serde_json::to_string(&fields)?, id],
            )?;
            rewritten += 1;
        }
    }
    Ok(rewritten)
}

// ========== Steps ==========

fn create_initial_collections(tx: &Transaction<'_>) -> Result<()> {
    tx.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS diagrams (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            database_type TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS db_tables (
            id TEXT PRIMARY KEY,
            diagram_id TEXT NOT NULL,
            name TEXT NOT NULL,
            x REAL NOT NULL DEFAULT 0,
            y REAL NOT NULL DEFAULT 0,
            fields TEXT NOT NULL DEFAULT '[]',
            indexes TEXT NOT NULL DEFAULT '[]',
            color TEXT,
            created_at TEXT NOT NULL,
            width REAL
        );

        CREATE TABLE IF NOT EXISTS db_relationships (
            id TEXT PRIMARY KEY,
            diagram_id TEXT NOT NULL,
            name TEXT,
            source_table_id TEXT NOT NULL,
            target_table_id TEXT NOT NULL,
            source_field_id TEXT,
            target_field_id TEXT,
            type TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tables_diagram ON db_tables(diagram_id);
        CREATE INDEX IF NOT EXISTS idx_relationships_diagram ON db_relationships(diagram_id);
        "#,
    )?;
    tx.execute_batch(schema::CREATE_CONFIG_TABLE)?;
    Ok(())
}

fn structure_field_types(tx: &Transaction<'_>) -> Result<()> {
    let rewritten = rewrite_table_fields(tx, |field| {
        let Some(Value::String(name)) = field.get("type") else {
            return false;
        };
        let structured = serde_json::json!({
            "id": name.split(' ').collect::<Vec<_>>().join("_"),
            "name": name,
        });
        field.insert("type".to_string(), structured);
        true
    })?;
    debug!("Structured field types in {} tables", rewritten);
    Ok(())
}

fn add_database_edition(tx: &Transaction<'_>) -> Result<()> {
    add_column(tx, "diagrams", "database_edition", "TEXT")
}

fn add_table_comment(tx: &Transaction<'_>) -> Result<()> {
    add_column(tx, "db_tables", "comment", "TEXT")
}

fn add_schemas(tx: &Transaction<'_>) -> Result<()> {
    add_column(tx, "db_tables", "schema", "TEXT")?;
    add_column(tx, "db_relationships", "source_schema", "TEXT")?;
    add_column(tx, "db_relationships", "target_schema", "TEXT")
}

fn derive_cardinalities(tx: &Transaction<'_>) -> Result<()> {
    add_column(tx, "db_relationships", "source_cardinality", "TEXT NOT NULL DEFAULT 'one'")?;
    add_column(tx, "db_relationships", "target_cardinality", "TEXT NOT NULL DEFAULT 'one'")?;

    // Rows still carrying the legacy type are the only ones to rewrite.
    let legacy: Vec<(String, String)> = {
        let mut stmt = tx.prepare("SELECT id, type FROM db_relationships WHERE type IS NOT NULL")?;
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?
    };

    for (id, raw_type) in &legacy {
        let (source, target) = match raw_type.parse::<RelationshipType>() {
            Ok(kind) => kind.cardinalities(),
            Err(_) => {
                warn!("Relationship {} has unknown type '{}', assuming one_to_one", id, raw_type);
                (Cardinality::One, Cardinality::One)
            }
        };
        tx.execute(
            "UPDATE db_relationships SET source_cardinality = ?1, target_cardinality = ?2, type = NULL WHERE id = ?3",
            rusqlite::params![source.as_str(), target.as_str(), id],
        )?;
    }
    debug!("Derived cardinalities for {} relationships", legacy.len());
    Ok(())
}

fn create_dependencies(tx: &Transaction<'_>) -> Result<()> {
    tx.execute_batch(schema::CREATE_DEPENDENCIES_TABLE)?;
    tx.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_dependencies_diagram ON db_dependencies(diagram_id)",
    )?;
    Ok(())
}

fn add_view_flags(tx: &Transaction<'_>) -> Result<()> {
    add_column(tx, "db_tables", "is_view", "INTEGER NOT NULL DEFAULT 0")?;
    add_column(tx, "db_tables", "is_materialized_view", "INTEGER NOT NULL DEFAULT 0")?;
    add_column(tx, "db_tables", "order", "INTEGER")
}

fn coerce_nullable_flags(tx: &Transaction<'_>) -> Result<()> {
    let rewritten = rewrite_table_fields(tx, |field| {
        let Some(Value::String(raw)) = field.get("nullable") else {
            return false;
        };
        let nullable = raw.eq_ignore_ascii_case("true");
        field.insert("nullable".to_string(), Value::Bool(nullable));
        true
    })?;
    debug!("Coerced nullable flags in {} tables", rewritten);
    Ok(())
}

fn create_areas(tx: &Transaction<'_>) -> Result<()> {
    tx.execute_batch(schema::CREATE_AREAS_TABLE)?;
    tx.execute_batch("CREATE INDEX IF NOT EXISTS idx_areas_diagram ON areas(diagram_id)")?;
    Ok(())
}

fn create_custom_types(tx: &Transaction<'_>) -> Result<()> {
    tx.execute_batch(schema::CREATE_CUSTOM_TYPES_TABLE)?;
    tx.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_custom_types_diagram ON db_custom_types(diagram_id)",
    )?;
    Ok(())
}

/// The config row is dropped here; bootstrap recreates it on the next open.
fn create_diagram_filters(tx: &Transaction<'_>) -> Result<()> {
    tx.execute_batch(schema::CREATE_DIAGRAM_FILTERS_TABLE)?;
    tx.execute("DELETE FROM config", [])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn column_set(conn: &Connection, table: &str) -> BTreeSet<String> {
        table_columns(conn, table).unwrap().into_iter().collect()
    }

    #[test]
    fn test_fresh_store_reaches_latest_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        let report = run_migrations(&mut conn).unwrap();

        assert_eq!(report.from, 0);
        assert_eq!(report.to, latest_version());
        assert_eq!(report.applied.len(), 12);
        assert_eq!(current_version(&conn).unwrap(), 12);
    }

    #[test]
    fn test_rerun_is_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO db_tables (id, diagram_id, name, created_at, fields) VALUES ('t1', 'd1', 'users', '2024-01-01T00:00:00.000Z', '[]')",
            [],
        )
        .unwrap();

        let report = run_migrations(&mut conn).unwrap();
        assert!(report.is_noop());
        assert_eq!(report.from, report.to);
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM db_tables", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_migrated_shape_matches_current_schema() {
        let mut migrated = Connection::open_in_memory().unwrap();
        run_migrations(&mut migrated).unwrap();

        let direct = Connection::open_in_memory().unwrap();
        for stmt in schema::all_schema_statements() {
            direct.execute(stmt, []).unwrap();
        }

        for table in schema::TABLES {
            assert_eq!(
                column_set(&migrated, table),
                column_set(&direct, table),
                "column mismatch in {}",
                table
            );
        }
    }

    #[test]
    fn test_legacy_rows_are_rewritten() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations_to(&mut conn, 1).unwrap();

        conn.execute(
            "INSERT INTO db_tables (id, diagram_id, name, created_at, fields) VALUES ('t1', 'd1', 'users', '2024-01-01', ?1)",
            [r#"[{"id":"f1","name":"seen_at","type":"timestamp with time zone","nullable":"TRUE"},
                 {"id":"f2","name":"id","type":{"id":"int","name":"int"},"nullable":false}]"#],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO db_relationships (id, diagram_id, source_table_id, target_table_id, type, created_at) VALUES ('r1', 'd1', 't1', 't2', 'many_to_one', '2024-01-01')",
            [],
        )
        .unwrap();

        run_migrations(&mut conn).unwrap();

        let raw: String = conn
            .query_row("SELECT fields FROM db_tables WHERE id = 't1'", [], |r| r.get(0))
            .unwrap();
        let fields: Vec<Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(fields[0]["type"]["id"], "timestamp_with_time_zone");
        assert_eq!(fields[0]["type"]["name"], "timestamp with time zone");
        assert_eq!(fields[0]["nullable"], true);
        assert_eq!(fields[1]["type"]["id"], "int");
        assert_eq!(fields[1]["nullable"], false);

        let (source, target, kind): (String, String, Option<String>) = conn
            .query_row(
                "SELECT source_cardinality, target_cardinality, type FROM db_relationships WHERE id = 'r1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!((source.as_str(), target.as_str()), ("many", "one"));
        assert_eq!(kind, None);
    }

    #[test]
    fn test_config_is_reset_when_filters_arrive() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations_to(&mut conn, 11).unwrap();
        conn.execute("INSERT INTO config (id, default_diagram_id) VALUES (1, 'd1')", [])
            .unwrap();

        run_migrations(&mut conn).unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM config", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    fn create_scratch(tx: &Transaction<'_>) -> Result<()> {
        tx.execute_batch("CREATE TABLE scratch (id TEXT)")?;
        Ok(())
    }

    fn create_then_fail(tx: &Transaction<'_>) -> Result<()> {
        tx.execute_batch("CREATE TABLE half_done (id TEXT)")?;
        Err(Error::Validation("boom".to_string()))
    }

    #[test]
    fn test_failed_step_keeps_previous_version() {
        let steps = [
            Migration { description: "scratch", apply: create_scratch },
            Migration { description: "fails", apply: create_then_fail },
        ];
        let mut conn = Connection::open_in_memory().unwrap();

        let err = apply_steps(&mut conn, &steps, steps.len()).unwrap_err();
        match err {
            Error::Migration { step, description, .. } => {
                assert_eq!(step, 2);
                assert_eq!(description, "fails");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(current_version(&conn).unwrap(), 1);
        assert!(table_columns(&conn, "scratch").unwrap().len() == 1);
        assert!(table_columns(&conn, "half_done").unwrap().is_empty());
    }

    #[test]
    fn test_newer_store_is_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", 99).unwrap();
        assert!(matches!(run_migrations(&mut conn), Err(Error::Migration { step: 99, .. })));
    }
}
