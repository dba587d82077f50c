//! Explicit write transactions for scan passes
//!
//! A [`CatalogBatch`] wraps one SQLite transaction. Each statement failure is
//! logged and counted; the batch itself keeps going. Tag links for one
//! identifier are written inside a savepoint so they land all together or
//! not at all.

use super::{delete_identifier, insert_tag, link_tags, now, upsert_identifier};
use rusqlite::Transaction;

/// Open write transaction handed to [`Catalog::batch`](super::Catalog::batch)
pub struct CatalogBatch<'c> {
    tx: Transaction<'c>,
    scan_id: Option<String>,
    now: String,
    failures: u64,
}

impl<'c> CatalogBatch<'c> {
    pub(super) fn new(tx: Transaction<'c>, scan_id: Option<&str>) -> Self {
        Self {
            tx,
            scan_id: scan_id.map(str::to_string),
            now: now(),
            failures: 0,
        }
    }

    /// Insert or refresh one identifier (already conformed)
    pub fn add(&mut self, identifier: &str) -> bool {
        let result = upsert_identifier(&self.tx, identifier, self.scan_id.as_deref(), &self.now);
        self.record(result, "add", identifier).is_some()
    }

    /// Insert tag rows; returns how many were new
    pub fn insert_tags(&mut self, tags: &[String]) -> usize {
        let mut inserted = 0;
        for tag in tags {
            let result = insert_tag(&self.tx, tag);
            inserted += self.record(result, "insert tag", tag).unwrap_or(0);
        }
        inserted
    }

    /// Link `identifier` to already inserted tags; returns the number of new
    /// links. Existing links are left alone.
    pub fn link(&mut self, identifier: &str, tags: &[String]) -> usize {
        let result = (|| -> rusqlite::Result<usize> {
            let sp = self.tx.savepoint()?;
            let linked = link_tags(&sp, identifier, tags)?;
            sp.commit()?;
            Ok(linked)
        })();
        self.record(result, "link tags to", identifier).unwrap_or(0)
    }

    /// Delete one identifier and its links
    pub fn remove(&mut self, identifier: &str) -> bool {
        let result = delete_identifier(&self.tx, identifier);
        matches!(self.record(result, "remove", identifier), Some(n) if n > 0)
    }

    /// Statements that failed so far
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub(super) fn commit(self) -> rusqlite::Result<()> {
        if self.failures > 0 {
            tracing::debug!("Committing batch with {} failed statement(s)", self.failures);
        }
        self.tx.commit()
    }

    fn record<T>(&mut self, result: rusqlite::Result<T>, what: &str, item: &str) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.failures += 1;
                tracing::warn!("Failed to {} {}: {}", what, item, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::Catalog;
    use crate::logging::LogContext;
    use std::sync::Arc;

    fn catalog() -> (tempfile::TempDir, Catalog) {
        let dir = tempfile::tempdir().unwrap();
        let catalog =
            Catalog::open(dir.path().join("batch.lattice"), Arc::new(LogContext::detached()))
                .unwrap();
        catalog.create().unwrap();
        (dir, catalog)
    }

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_relinking_is_swallowed() {
        let (_dir, catalog) = catalog();
        let (first, second, failures) = catalog
            .batch(None, |batch| {
                batch.add("/d/rex.png");
                batch.insert_tags(&tags(&["carnivore", "png"]));
                let first = batch.link("/d/rex.png", &tags(&["carnivore", "png"]));
                let second = batch.link("/d/rex.png", &tags(&["carnivore", "png"]));
                (first, second, batch.failures())
            })
            .unwrap();

        assert_eq!((first, second, failures), (2, 0, 0));
        assert_eq!(catalog.tags("/d/rex.png"), vec!["carnivore", "png"]);
    }

    #[test]
    fn test_insert_tags_counts_new_rows_only() {
        let (_dir, catalog) = catalog();
        let counts = catalog
            .batch(None, |batch| {
                let a = batch.insert_tags(&tags(&["meat", "hunter"]));
                let b = batch.insert_tags(&tags(&["meat", "plants"]));
                (a, b)
            })
            .unwrap();
        assert_eq!(counts, (2, 1));
    }

    #[test]
    fn test_link_to_unknown_identifier_adds_nothing() {
        let (_dir, catalog) = catalog();
        let linked = catalog
            .batch(None, |batch| {
                batch.insert_tags(&tags(&["meat"]));
                batch.link("/d/ghost.png", &tags(&["meat"]))
            })
            .unwrap();
        assert_eq!(linked, 0);
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_remove_reports_whether_row_existed() {
        let (_dir, catalog) = catalog();
        let removed = catalog
            .batch(None, |batch| {
                batch.add("/d/rex.png");
                (batch.remove("/d/rex.png"), batch.remove("/d/rex.png"))
            })
            .unwrap();
        assert_eq!(removed, (true, false));
    }
}
