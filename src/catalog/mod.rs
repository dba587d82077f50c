//! Catalog: persisted identifier → tag-set store plus a settings blob
//!
//! SQLite behind an r2d2 pool. Reads (`find`, `tags`, `entry`) take any
//! pooled connection; WAL lets them run while a scan pass holds the write
//! transaction.
//!
//! # Error handling
//!
//! Only [`Catalog::open`], [`Catalog::create`] and [`Catalog::batch`]
//! return errors. Every other operation logs a failed statement and yields
//! an empty or no-op result, so one bad statement cannot abort a scan.

use crate::error::{LatticeError, Result};
use crate::logging::LogContext;
use crate::util::{conform, display_name, normalize_tags};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod batch;
pub mod query;
pub mod schema;
pub mod settings;

pub use batch::CatalogBatch;
pub use query::{TagQuery, DEFAULT_LIMIT, WILDCARD};
pub use settings::{LocationList, ProjectSettings};

/// JSON object stored as the catalog's settings blob
pub type SettingsMap = serde_json::Map<String, serde_json::Value>;

/// One catalogued identifier with its tags and last-seen metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub identifier: String,
    /// Display name (last path segment)
    pub name: String,
    /// Assigned tags, sorted
    pub tags: Vec<String>,
    pub first_seen: String,
    pub last_seen: String,
    /// Scan pass that last touched this entry, if any
    pub scan_id: Option<String>,
}

/// One tag or a list of tags
pub trait IntoTags {
    fn into_tags(self) -> Vec<String>;
}

impl IntoTags for &str {
    fn into_tags(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoTags for String {
    fn into_tags(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoTags for &String {
    fn into_tags(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl IntoTags for Vec<String> {
    fn into_tags(self) -> Vec<String> {
        self
    }
}

impl IntoTags for Vec<&str> {
    fn into_tags(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoTags for &[String] {
    fn into_tags(self) -> Vec<String> {
        self.to_vec()
    }
}

impl IntoTags for &[&str] {
    fn into_tags(self) -> Vec<String> {
        self.iter().map(|t| t.to_string()).collect()
    }
}

impl<const N: usize> IntoTags for [&str; N] {
    fn into_tags(self) -> Vec<String> {
        self.iter().map(|t| t.to_string()).collect()
    }
}

/// Handle to one catalog store. Cheap to clone.
#[derive(Clone)]
pub struct Catalog {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
    ctx: Arc<LogContext>,
}

impl Catalog {
    /// Open a connection pool on the store at `path`.
    ///
    /// The file is created by SQLite when missing; call [`Catalog::create`]
    /// to lay down the schema.
    pub fn open(path: impl AsRef<Path>, ctx: Arc<LogContext>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let manager = SqliteConnectionManager::file(&path)
            .with_init(|conn| conn.execute_batch(schema::CONNECTION_PRAGMAS));
        let pool = Pool::builder().max_size(4).build(manager)?;

        // Verify connection works
        let conn = pool.get()?;
        conn.execute_batch("SELECT 1")?;

        Ok(Self { pool, path, ctx })
    }

    /// Idempotent schema initialization
    pub fn create(&self) -> Result<()> {
        self.ctx.in_scope(|| -> Result<()> {
            let conn = self.pool.get()?;
            schema::init_schema(&conn)?;
            tracing::debug!(
                "Catalog schema ready (v{})",
                schema::schema_version(&conn)
            );
            Ok(())
        })
    }

    /// Whether the store already carries a catalog schema
    pub fn is_initialized(&self) -> bool {
        self.with_conn("read schema version", |conn| {
            Ok(schema::schema_version(conn) > 0)
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn context(&self) -> &Arc<LogContext> {
        &self.ctx
    }

    /// Insert `identifier`, or refresh its last-seen time when present
    pub fn add(&self, identifier: &str) {
        let identifier = conform(identifier);
        let now = now();
        self.with_conn("add identifier", |conn| {
            upsert_identifier(conn, &identifier, None, &now)?;
            Ok(())
        });
    }

    /// Delete `identifier` and its tag links. Unknown identifiers are ignored.
    pub fn remove(&self, identifier: &str) {
        let identifier = conform(identifier);
        self.with_conn("remove identifier", |conn| {
            delete_identifier(conn, &identifier)?;
            Ok(())
        });
    }

    pub fn contains(&self, identifier: &str) -> bool {
        let identifier = conform(identifier);
        self.with_conn("look up identifier", |conn| {
            Ok(identifier_id(conn, &identifier)?.is_some())
        })
    }

    /// Number of catalogued identifiers
    pub fn len(&self) -> usize {
        self.with_conn("count identifiers", |conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM identifiers", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add tags (lowercased). Tagging an unknown identifier does nothing.
    pub fn tag(&self, identifier: &str, tags: impl IntoTags) {
        let identifier = conform(identifier);
        let tags = normalize_tags(tags.into_tags());
        if tags.is_empty() {
            return;
        }
        self.with_conn("tag identifier", |conn| {
            let tx = conn.transaction()?;
            if identifier_id(&tx, &identifier)?.is_none() {
                tracing::debug!("Not tagging unknown identifier {}", identifier);
                return Ok(());
            }
            for tag in &tags {
                insert_tag(&tx, tag)?;
            }
            link_tags(&tx, &identifier, &tags)?;
            tx.commit()?;
            Ok(())
        });
    }

    /// Remove tags (lowercased). Missing links are ignored.
    pub fn untag(&self, identifier: &str, tags: impl IntoTags) {
        let identifier = conform(identifier);
        let tags = normalize_tags(tags.into_tags());
        if tags.is_empty() {
            return;
        }
        self.with_conn("untag identifier", |conn| {
            let tx = conn.transaction()?;
            for tag in &tags {
                tx.execute(
                    "DELETE FROM identifier_tags \
                     WHERE identifier_id = (SELECT id FROM identifiers WHERE identifier = ?1) \
                       AND tag_id = (SELECT id FROM tags WHERE tag = ?2)",
                    params![identifier, tag],
                )?;
            }
            tx.commit()?;
            Ok(())
        });
    }

    /// Tags assigned to `identifier`, sorted
    pub fn tags(&self, identifier: &str) -> Vec<String> {
        let identifier = conform(identifier);
        self.with_conn("read tags", |conn| tags_of(conn, &identifier))
    }

    /// Full entry for `identifier`, if catalogued
    pub fn entry(&self, identifier: &str) -> Option<CatalogEntry> {
        let identifier = conform(identifier);
        self.with_conn("read entry", |conn| {
            let row = conn
                .query_row(
                    "SELECT identifier, name, first_seen, last_seen, scan_id \
                     FROM identifiers WHERE identifier = ?1",
                    params![identifier],
                    |row| {
                        Ok(CatalogEntry {
                            identifier: row.get(0)?,
                            name: row.get(1)?,
                            tags: Vec::new(),
                            first_seen: row.get(2)?,
                            last_seen: row.get(3)?,
                            scan_id: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            match row {
                Some(mut entry) => {
                    entry.tags = tags_of(conn, &entry.identifier)?;
                    Ok(Some(entry))
                }
                None => Ok(None),
            }
        })
    }

    /// Identifiers matching `query`, ordered by identifier.
    ///
    /// See [`query`] for the matching rules. `limit` defaults to
    /// [`DEFAULT_LIMIT`] when absent or zero.
    pub fn find(&self, query: impl Into<TagQuery>, limit: Option<usize>) -> Vec<String> {
        let query = query.into();
        let limit = limit.filter(|&n| n > 0).unwrap_or(DEFAULT_LIMIT);
        let (sql, values) = query::build_find(&query, limit);
        self.with_conn("find identifiers", |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
                row.get::<_, String>(0)
            })?;
            let mut results = Vec::new();
            for row in rows {
                results.push(row?);
            }
            tracing::trace!("find {:?} -> {} identifier(s)", query, results.len());
            Ok(results)
        })
    }

    /// Settings blob; empty when nothing is stored or the blob is malformed
    pub fn settings(&self) -> SettingsMap {
        let blob: Option<String> = self.with_conn("read settings", |conn| {
            conn.query_row("SELECT blob FROM settings WHERE id = 1", [], |row| row.get(0))
                .optional()
                .map_err(Into::into)
        });

        let Some(blob) = blob else {
            return SettingsMap::new();
        };

        match serde_json::from_str::<serde_json::Value>(&blob) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(other) => {
                let err = LatticeError::Configuration(format!(
                    "settings blob is not an object: {}",
                    other
                ));
                self.ctx.in_scope(|| tracing::warn!("{}; using empty settings", err));
                SettingsMap::new()
            }
            Err(e) => {
                let err = LatticeError::Configuration(format!("malformed settings blob: {}", e));
                self.ctx.in_scope(|| tracing::warn!("{}; using empty settings", err));
                SettingsMap::new()
            }
        }
    }

    /// Replace the settings blob
    pub fn save_settings(&self, settings: &SettingsMap) {
        let blob = match serde_json::to_string(settings) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!("Failed to serialize settings: {}", e);
                return;
            }
        };
        self.with_conn("save settings", |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO settings (id, blob) VALUES (1, ?1)",
                params![blob],
            )?;
            Ok(())
        });
    }

    /// Typed view over the settings blob
    pub fn project_settings(&self) -> ProjectSettings {
        ProjectSettings::from_map(self.settings())
    }

    pub fn save_project_settings(&self, settings: &ProjectSettings) {
        self.save_settings(&settings.to_map());
    }

    /// Run `f` inside one explicit transaction, committed when `f` returns.
    ///
    /// Statement failures inside the batch are logged and counted by the
    /// [`CatalogBatch`]; only failing to begin or commit is an error.
    pub fn batch<R>(
        &self,
        scan_id: Option<&str>,
        f: impl FnOnce(&mut CatalogBatch<'_>) -> R,
    ) -> Result<R> {
        self.ctx.in_scope(|| -> Result<R> {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let mut batch = CatalogBatch::new(tx, scan_id);
            let out = f(&mut batch);
            batch.commit()?;
            Ok(out)
        })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Run `f` on a pooled connection inside the catalog span; on failure
    /// log a persistence error and return `T::default()`.
    fn with_conn<T, F>(&self, what: &str, f: F) -> T
    where
        T: Default,
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        self.ctx.in_scope(|| {
            let result = self.conn().and_then(|mut conn| f(&mut *conn));
            match result {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Failed to {}: {}", what, e);
                    T::default()
                }
            }
        })
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog").field("path", &self.path).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Statements shared by the catalog and its batches
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn identifier_id(conn: &Connection, identifier: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM identifiers WHERE identifier = ?1",
        params![identifier],
        |row| row.get(0),
    )
    .optional()
}

/// Insert or refresh one identifier; returns rows changed
fn upsert_identifier(
    conn: &Connection,
    identifier: &str,
    scan_id: Option<&str>,
    now: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO identifiers (identifier, name, first_seen, last_seen, scan_id) \
         VALUES (?1, ?2, ?3, ?3, ?4) \
         ON CONFLICT(identifier) DO UPDATE SET \
             last_seen = excluded.last_seen, \
             scan_id = COALESCE(excluded.scan_id, identifiers.scan_id)",
        params![identifier, display_name(identifier), now, scan_id],
    )
}

fn delete_identifier(conn: &Connection, identifier: &str) -> rusqlite::Result<usize> {
    // identifier_tags rows go with it (ON DELETE CASCADE)
    conn.execute(
        "DELETE FROM identifiers WHERE identifier = ?1",
        params![identifier],
    )
}

/// Insert one tag row; returns 1 when the tag is new
fn insert_tag(conn: &Connection, tag: &str) -> rusqlite::Result<usize> {
    conn.execute("INSERT OR IGNORE INTO tags (tag) VALUES (?1)", params![tag])
}

/// Link existing tag rows to an identifier; returns the number of new links.
/// Links that already exist are ignored.
fn link_tags(conn: &Connection, identifier: &str, tags: &[String]) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO identifier_tags (identifier_id, tag_id) \
         SELECT i.id, t.id FROM identifiers i, tags t \
         WHERE i.identifier = ?1 AND t.tag = ?2",
    )?;
    let mut linked = 0;
    for tag in tags {
        linked += stmt.execute(params![identifier, tag])?;
    }
    Ok(linked)
}

fn tags_of(conn: &Connection, identifier: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.tag FROM tags t \
         JOIN identifier_tags it ON it.tag_id = t.id \
         JOIN identifiers i ON i.id = it.identifier_id \
         WHERE i.identifier = ?1 \
         ORDER BY t.tag",
    )?;
    let rows = stmt.query_map(params![identifier], |row| row.get::<_, String>(0))?;
    let mut tags = Vec::new();
    for row in rows {
        tags.push(row?);
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{CaptureLayer, LogBuffer, LogLevel};
    use tracing_subscriber::layer::SubscriberExt;

    fn catalog() -> (tempfile::TempDir, Catalog) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.lattice");
        let catalog = Catalog::open(&path, Arc::new(LogContext::detached())).unwrap();
        catalog.create().unwrap();
        (dir, catalog)
    }

    #[test]
    fn test_create_is_idempotent() {
        let (_dir, catalog) = catalog();
        catalog.add("/dinos/trex.png");
        catalog.create().unwrap();
        assert!(catalog.is_initialized());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_add_twice_keeps_one_entry() {
        let (_dir, catalog) = catalog();
        catalog.add("/dinos/trex.png");
        let first = catalog.entry("/dinos/trex.png").unwrap();
        catalog.add("/dinos/trex.png");
        let second = catalog.entry("/dinos/trex.png").unwrap();

        assert_eq!(catalog.len(), 1);
        assert_eq!(first.first_seen, second.first_seen);
        assert_eq!(second.name, "trex.png");
    }

    #[test]
    fn test_add_conforms_backslashes() {
        let (_dir, catalog) = catalog();
        catalog.add(r"C:\dinos\trex.png");
        assert!(catalog.contains("C:/dinos/trex.png"));
    }

    #[test]
    fn test_tag_is_lowercased_set_union() {
        let (_dir, catalog) = catalog();
        catalog.add("/d/rex.png");
        catalog.tag("/d/rex.png", "Carnivore");
        catalog.tag("/d/rex.png", ["carnivore", "meat"]);
        catalog.tag("/d/rex.png", vec!["MEAT".to_string()]);
        assert_eq!(catalog.tags("/d/rex.png"), vec!["carnivore", "meat"]);
    }

    #[test]
    fn test_untag_is_set_difference_and_lowercases() {
        let (_dir, catalog) = catalog();
        catalog.add("/d/rex.png");
        catalog.tag("/d/rex.png", ["carnivore", "meat"]);
        catalog.untag("/d/rex.png", "MEAT");
        catalog.untag("/d/rex.png", "never-assigned");
        assert_eq!(catalog.tags("/d/rex.png"), vec!["carnivore"]);
    }

    #[test]
    fn test_mutating_unknown_identifier_is_noop() {
        let (_dir, catalog) = catalog();
        catalog.tag("/nope", "x");
        catalog.untag("/nope", "x");
        catalog.remove("/nope");
        assert!(catalog.is_empty());
        assert!(catalog.tags("/nope").is_empty());
        assert!(catalog.entry("/nope").is_none());
    }

    #[test]
    fn test_remove_drops_links() {
        let (_dir, catalog) = catalog();
        catalog.add("/d/rex.png");
        catalog.tag("/d/rex.png", "carnivore");
        catalog.remove("/d/rex.png");
        catalog.add("/d/rex.png");
        assert!(catalog.tags("/d/rex.png").is_empty());
    }

    #[test]
    fn test_find_all_and_limit() {
        let (_dir, catalog) = catalog();
        for id in ["/d/c.txt", "/d/a.txt", "/d/b.txt"] {
            catalog.add(id);
        }
        assert_eq!(catalog.find(None::<&str>, None), vec!["/d/a.txt", "/d/b.txt", "/d/c.txt"]);
        assert_eq!(catalog.find("*", Some(2)), vec!["/d/a.txt", "/d/b.txt"]);
    }

    #[test]
    fn test_find_zero_limit_means_default() {
        let (_dir, catalog) = catalog();
        for id in ["/d/a.txt", "/d/b.txt", "/d/c.txt"] {
            catalog.add(id);
        }
        assert_eq!(catalog.find(TagQuery::All, Some(0)).len(), 3);
        assert_eq!(catalog.find("txt", Some(0)).len(), 3);
    }

    #[test]
    fn test_find_mixed_wildcard_is_plain_tag() {
        let (_dir, catalog) = catalog();
        catalog.add("/d/rex.png");
        catalog.add("/d/stego.png");
        catalog.tag("/d/rex.png", "carnivore");

        assert_eq!(catalog.find(["carnivore", "*"], None), vec!["/d/rex.png"]);
        assert_eq!(catalog.find(["*"], None).len(), 2);
    }

    #[test]
    fn test_find_exact_tag_or_substring() {
        let (_dir, catalog) = catalog();
        catalog.add("/d/rex.png");
        catalog.add("/d/raptor.carnivore.png");
        catalog.add("/carnivore/stego.png");
        catalog.add("/d/b.txt");
        catalog.tag("/d/rex.png", "carnivore");

        // exact tag on rex; substring in both identifier and name on raptor;
        // stego has it in the identifier only, so it does not match
        assert_eq!(
            catalog.find(["carnivore"], None),
            vec!["/d/raptor.carnivore.png", "/d/rex.png"]
        );
    }

    #[test]
    fn test_find_substring_branch_requires_all_tags() {
        let (_dir, catalog) = catalog();
        catalog.add("/d/a_b.txt");
        catalog.add("/d/a.txt");
        catalog.tag("/d/a.txt", "b");

        assert_eq!(catalog.find(["a", "b"], None), vec!["/d/a.txt", "/d/a_b.txt"]);
        assert_eq!(catalog.find(["a", "zzz"], None), Vec::<String>::new());
    }

    #[test]
    fn test_find_escapes_like_wildcards() {
        let (_dir, catalog) = catalog();
        catalog.add("/d/abc.txt");
        assert!(catalog.find(["a_c"], None).is_empty());
        assert!(catalog.find(["%"], None).is_empty());
    }

    #[test]
    fn test_settings_round_trip() {
        let (_dir, catalog) = catalog();
        assert!(catalog.settings().is_empty());

        let mut map = SettingsMap::new();
        map.insert("scan_locations".into(), serde_json::json!(["/d"]));
        map.insert("theme".into(), serde_json::json!("dark"));
        catalog.save_settings(&map);

        assert_eq!(catalog.settings(), map);
    }

    #[test]
    fn test_malformed_settings_blob_yields_empty_map() {
        let (_dir, catalog) = catalog();
        {
            let conn = catalog.conn().unwrap();
            conn.execute("INSERT INTO settings (id, blob) VALUES (1, '{not json')", [])
                .unwrap();
        }

        let buffer = LogBuffer::new();
        let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(buffer.clone()));
        let settings = tracing::subscriber::with_default(subscriber, || catalog.settings());

        assert!(settings.is_empty());
        assert!(buffer.contains(LogLevel::Warn, "malformed settings blob"));
    }

    #[test]
    fn test_uninitialized_store_degrades_to_empty_results() {
        let dir = tempfile::tempdir().unwrap();
        let catalog =
            Catalog::open(dir.path().join("raw.db"), Arc::new(LogContext::detached())).unwrap();

        assert!(!catalog.is_initialized());
        assert!(catalog.find(None::<&str>, None).is_empty());
        catalog.add("/d/rex.png");
        assert_eq!(catalog.len(), 0);
    }

    #[test]
    fn test_batch_commits_on_return() {
        let (_dir, catalog) = catalog();
        let added = catalog
            .batch(Some("scan-1"), |batch| {
                batch.add("/d/rex.png");
                batch.add("/d/stego.png");
                batch.insert_tags(&["carnivore".to_string()]);
                batch.link("/d/rex.png", &["carnivore".to_string()])
            })
            .unwrap();

        assert_eq!(added, 1);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.tags("/d/rex.png"), vec!["carnivore"]);
        assert_eq!(catalog.entry("/d/rex.png").unwrap().scan_id.as_deref(), Some("scan-1"));
    }
}
