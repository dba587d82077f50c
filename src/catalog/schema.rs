//! Catalog schema and migrations
//!
//! The schema version lives in the `metadata` table. `init_schema` is safe to
//! run against an existing store: every statement is `IF NOT EXISTS` and
//! migrations only run when the stored version is behind.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Per-connection settings, applied whenever the pool opens a connection
pub const CONNECTION_PRAGMAS: &str = r#"
    PRAGMA foreign_keys=ON;
    PRAGMA busy_timeout=5000;
    PRAGMA synchronous=NORMAL;
"#;

/// Create or migrate the catalog schema
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    // WAL lets `find` read while a scan pass holds the write transaction
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    let current_version = schema_version(conn);

    if current_version < 1 {
        apply_schema_v1(conn)?;
    }

    Ok(())
}

/// Stored schema version, 0 for a fresh store
pub fn schema_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT CAST(value AS INTEGER) FROM metadata WHERE key = 'schema_version'",
        [],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

/// Initial schema (v1)
fn apply_schema_v1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        BEGIN;

        -- Metadata table (created first for version tracking)
        CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT
        );

        -- One row per catalogued identifier
        CREATE TABLE IF NOT EXISTS identifiers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identifier TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,        -- display name, searched by find()
            first_seen TEXT NOT NULL,
            last_seen TEXT NOT NULL,
            scan_id TEXT               -- last scan pass that touched the entry
        );
        CREATE INDEX IF NOT EXISTS idx_identifiers_name ON identifiers(name);

        -- Distinct tag values (lowercase)
        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tag TEXT NOT NULL UNIQUE
        );

        -- Identifier x tag links
        CREATE TABLE IF NOT EXISTS identifier_tags (
            identifier_id INTEGER NOT NULL REFERENCES identifiers(id) ON DELETE CASCADE,
            tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (identifier_id, tag_id)
        );
        CREATE INDEX IF NOT EXISTS idx_identifier_tags_tag ON identifier_tags(tag_id);

        -- Opaque JSON settings blob (single row)
        CREATE TABLE IF NOT EXISTS settings (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            blob TEXT NOT NULL
        );

        INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', '1');

        COMMIT;
        "#,
    )
}
