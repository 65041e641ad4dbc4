//! Current relational shape
//!
//! The record service creates this shape directly. Embedded stores reach
//! the same column sets by walking the migration chain.

pub const CREATE_DIAGRAMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS diagrams (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    database_type TEXT NOT NULL,
    database_edition TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// `fields` and `indexes` hold JSON arrays.
pub const CREATE_TABLES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS db_tables (
    id TEXT PRIMARY KEY,
    diagram_id TEXT NOT NULL,
    name TEXT NOT NULL,
    "schema" TEXT,
    x REAL NOT NULL DEFAULT 0,
    y REAL NOT NULL DEFAULT 0,
    fields TEXT NOT NULL DEFAULT '[]',
    indexes TEXT NOT NULL DEFAULT '[]',
    color TEXT,
    created_at TEXT NOT NULL,
    width REAL,
    comment TEXT,
    is_view INTEGER NOT NULL DEFAULT 0,
    is_materialized_view INTEGER NOT NULL DEFAULT 0,
    "order" INTEGER
)
"#;

pub const CREATE_RELATIONSHIPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS db_relationships (
    id TEXT PRIMARY KEY,
    diagram_id TEXT NOT NULL,
    name TEXT,
    source_schema TEXT,
    source_table_id TEXT NOT NULL,
    target_schema TEXT,
    target_table_id TEXT NOT NULL,
    source_field_id TEXT,
    target_field_id TEXT,
    type TEXT,
    source_cardinality TEXT NOT NULL DEFAULT 'one',
    target_cardinality TEXT NOT NULL DEFAULT 'one',
    created_at TEXT NOT NULL
)
"#;

pub const CREATE_DEPENDENCIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS db_dependencies (
    id TEXT PRIMARY KEY,
    diagram_id TEXT NOT NULL,
    "schema" TEXT,
    table_id TEXT NOT NULL,
    dependent_schema TEXT,
    dependent_table_id TEXT NOT NULL,
    created_at TEXT NOT NULL
)
"#;

pub const CREATE_AREAS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS areas (
    id TEXT PRIMARY KEY,
    diagram_id TEXT NOT NULL,
    name TEXT NOT NULL,
    x REAL NOT NULL DEFAULT 0,
    y REAL NOT NULL DEFAULT 0,
    width REAL NOT NULL DEFAULT 0,
    height REAL NOT NULL DEFAULT 0,
    color TEXT
)
"#;

/// `values` and `fields` hold JSON arrays.
pub const CREATE_CUSTOM_TYPES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS db_custom_types (
    id TEXT PRIMARY KEY,
    diagram_id TEXT NOT NULL,
    "schema" TEXT,
    type TEXT NOT NULL,
    kind TEXT,
    "values" TEXT NOT NULL DEFAULT '[]',
    fields TEXT NOT NULL DEFAULT '[]'
)
"#;

/// SQL NULL in `table_ids`/`schemas_ids` means "no filter"; a JSON array
/// (possibly empty) lists what is visible.
pub const CREATE_DIAGRAM_FILTERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS diagram_filters (
    diagram_id TEXT PRIMARY KEY,
    table_ids TEXT,
    schemas_ids TEXT
)
"#;

pub const CREATE_CONFIG_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS config (
    id INTEGER PRIMARY KEY,
    default_diagram_id TEXT NOT NULL DEFAULT ''
)
"#;

pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_tables_diagram ON db_tables(diagram_id)",
    "CREATE INDEX IF NOT EXISTS idx_relationships_diagram ON db_relationships(diagram_id)",
    "CREATE INDEX IF NOT EXISTS idx_dependencies_diagram ON db_dependencies(diagram_id)",
    "CREATE INDEX IF NOT EXISTS idx_areas_diagram ON areas(diagram_id)",
    "CREATE INDEX IF NOT EXISTS idx_custom_types_diagram ON db_custom_types(diagram_id)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_DIAGRAMS_TABLE,
        CREATE_TABLES_TABLE,
        CREATE_RELATIONSHIPS_TABLE,
        CREATE_DEPENDENCIES_TABLE,
        CREATE_AREAS_TABLE,
        CREATE_CUSTOM_TYPES_TABLE,
        CREATE_DIAGRAM_FILTERS_TABLE,
        CREATE_CONFIG_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}

/// Every table of the current shape.
pub const TABLES: &[&str] = &[
    "diagrams",
    "db_tables",
    "db_relationships",
    "db_dependencies",
    "areas",
    "db_custom_types",
    "diagram_filters",
    "config",
];
