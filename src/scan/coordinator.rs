//! Drives one scan pass through its states

use super::{next_scan_id, CancelToken, ScanOptions, ScanReport, ScanState};
use crate::catalog::{Catalog, TagQuery};
use crate::composition::CompositionEngine;
use crate::discovery::{DiscoverySource, SkipPattern, Validity};
use crate::error::LatticeError;
use crate::events::{CatalogEvent, EventBus};
use crate::util::conform;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Runs scan passes against one catalog
pub struct ScanCoordinator {
    catalog: Catalog,
    engine: CompositionEngine,
    sources: Vec<Arc<dyn DiscoverySource>>,
    events: EventBus,
    state: ScanState,
}

impl ScanCoordinator {
    pub fn new(
        catalog: Catalog,
        engine: CompositionEngine,
        sources: Vec<Arc<dyn DiscoverySource>>,
        events: EventBus,
    ) -> Self {
        Self {
            catalog,
            engine,
            sources,
            events,
            state: ScanState::Idle,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Run one pass over `locations`. Never fails: problems are logged and
    /// counted in [`ScanReport::failures`].
    pub fn run(
        &mut self,
        locations: &[String],
        skip: &SkipPattern,
        options: &ScanOptions,
        cancel: &CancelToken,
    ) -> ScanReport {
        let ctx = self.catalog.context().clone();
        ctx.in_scope(|| self.run_pass(locations, skip, options, cancel))
    }

    fn run_pass(
        &mut self,
        locations: &[String],
        skip: &SkipPattern,
        options: &ScanOptions,
        cancel: &CancelToken,
    ) -> ScanReport {
        let start = Instant::now();
        let mut report = ScanReport::new(next_scan_id());
        self.state = ScanState::Idle;

        tracing::info!(
            scan_id = %report.scan_id,
            full = options.full,
            recursive = options.recursive,
            "Starting scan: {:?}",
            locations
        );

        self.transition(ScanState::Discovering);
        self.discover(locations, skip, options, cancel, &mut report);

        let batch_size = options.batch_size.max(1);

        if options.full && !report.cancelled {
            self.transition(ScanState::Tagging);
            self.tag(batch_size, cancel, &mut report);
        }

        if options.full && !report.cancelled {
            self.transition(ScanState::Pruning);
            self.prune(batch_size, cancel, &mut report);
        }

        self.transition(ScanState::Complete);
        report.final_state = self.state;
        report.failures += self.events.emit(&CatalogEvent::ScanComplete {
            scan_id: report.scan_id.clone(),
            cancelled: report.cancelled,
        });

        tracing::info!(
            scan_id = %report.scan_id,
            "Scan complete: {} touched, {} tag(s), {} link(s), {} pruned, {} failure(s){} in {}ms",
            report.touched.len(),
            report.tags_written,
            report.links_written,
            report.pruned.len(),
            report.failures,
            if report.cancelled { ", cancelled" } else { "" },
            start.elapsed().as_millis()
        );

        report
    }

    fn transition(&mut self, next: ScanState) {
        tracing::debug!("Scan state {} -> {}", self.state.as_str(), next.as_str());
        self.state = next;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Discovering
    // ─────────────────────────────────────────────────────────────────────────

    fn discover(
        &self,
        locations: &[String],
        skip: &SkipPattern,
        options: &ScanOptions,
        cancel: &CancelToken,
        report: &mut ScanReport,
    ) {
        let batch_size = options.batch_size.max(1);
        let mut seen: HashSet<String> = HashSet::new();
        let mut pending: Vec<String> = Vec::with_capacity(batch_size);

        'roots: for root in locations {
            let root = conform(root);

            for source in &self.sources {
                if !source.can_represent(&root) {
                    continue;
                }

                let identifiers = match source.identifiers(&root, skip, options.recursive) {
                    Ok(identifiers) => identifiers,
                    Err(e) => {
                        let err = LatticeError::Discovery {
                            source_name: source.name().to_string(),
                            root: root.clone(),
                            message: format!("{:#}", e),
                        };
                        tracing::warn!("{}; skipping", err);
                        report.failures += 1;
                        continue;
                    }
                };

                for identifier in identifiers {
                    if cancel.is_cancelled() {
                        report.cancelled = true;
                        break 'roots;
                    }

                    let identifier = conform(&identifier);
                    if skip.is_match(&identifier) || !seen.insert(identifier.clone()) {
                        continue;
                    }

                    pending.push(identifier);
                    if pending.len() >= batch_size {
                        self.flush_discovered(&mut pending, report);
                    }
                }
            }
        }

        self.flush_discovered(&mut pending, report);
    }

    /// Insert one chunk of discovered identifiers, then announce them
    fn flush_discovered(&self, pending: &mut Vec<String>, report: &mut ScanReport) {
        if pending.is_empty() {
            return;
        }

        let chunk = std::mem::take(pending);
        let result = self.catalog.batch(Some(report.scan_id.as_str()), |batch| {
            let added: Vec<String> = chunk.iter().filter(|id| batch.add(id)).cloned().collect();
            (added, batch.failures())
        });

        match result {
            Ok((added, failures)) => {
                report.failures += failures;
                for identifier in added {
                    report.failures += self.events.emit(&CatalogEvent::ItemDiscovered {
                        identifier: identifier.clone(),
                    });
                    report.touched.push(identifier);
                }
            }
            Err(e) => {
                tracing::error!("Failed to insert {} discovered identifier(s): {}", chunk.len(), e);
                report.failures += chunk.len() as u64;
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tagging
    // ─────────────────────────────────────────────────────────────────────────

    fn tag(&self, batch_size: usize, cancel: &CancelToken, report: &mut ScanReport) {
        let mut all_tags: Vec<String> = Vec::new();
        let mut distinct: HashSet<String> = HashSet::new();
        let mut mapped: Vec<(String, Vec<String>)> = Vec::new();

        for identifier in &report.touched {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let Some(view) = self.engine.bind(identifier) else {
                continue;
            };
            let tags = view.mandatory_tags();
            report.failures += view.failures();

            for tag in &tags {
                if distinct.insert(tag.clone()) {
                    all_tags.push(tag.clone());
                }
            }
            if !tags.is_empty() {
                mapped.push((identifier.clone(), tags));
            }
        }

        // Phase one: every distinct tag of the pass
        match self.catalog.batch(Some(report.scan_id.as_str()), |batch| {
            (batch.insert_tags(&all_tags), batch.failures())
        }) {
            Ok((inserted, failures)) => {
                report.tags_written += inserted;
                report.failures += failures;
            }
            Err(e) => {
                tracing::error!("Failed to insert {} tag(s): {}", all_tags.len(), e);
                report.failures += 1;
                return;
            }
        }

        // Phase two: links, one savepoint per identifier, committed in chunks
        let mut pending: Vec<(String, Vec<String>)> = Vec::with_capacity(batch_size);
        for entry in mapped {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            pending.push(entry);
            if pending.len() >= batch_size {
                self.flush_links(&mut pending, report);
            }
        }
        self.flush_links(&mut pending, report);
    }

    fn flush_links(&self, pending: &mut Vec<(String, Vec<String>)>, report: &mut ScanReport) {
        if pending.is_empty() {
            return;
        }

        let chunk = std::mem::take(pending);
        let result = self.catalog.batch(Some(report.scan_id.as_str()), |batch| {
            let linked: usize = chunk
                .iter()
                .map(|(identifier, tags)| batch.link(identifier, tags))
                .sum();
            (linked, batch.failures())
        });

        match result {
            Ok((linked, failures)) => {
                report.links_written += linked;
                report.failures += failures;
            }
            Err(e) => {
                tracing::error!("Failed to link tags for {} identifier(s): {}", chunk.len(), e);
                report.failures += chunk.len() as u64;
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pruning
    // ─────────────────────────────────────────────────────────────────────────

    /// Remove catalogued identifiers that any source judges invalid.
    /// Covers the whole catalog, not just this pass. Sources are consulted
    /// with no transaction open.
    fn prune(&self, batch_size: usize, cancel: &CancelToken, report: &mut ScanReport) {
        let members = self.catalog.find(TagQuery::All, None);
        let mut pending: Vec<String> = Vec::with_capacity(batch_size);

        for identifier in members {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let invalid = self
                .sources
                .iter()
                .find(|source| source.check(&identifier) == Validity::NotValid);
            if let Some(source) = invalid {
                tracing::debug!("Pruning {} (rejected by {})", identifier, source.name());
                pending.push(identifier);
                if pending.len() >= batch_size {
                    self.flush_pruned(&mut pending, report);
                }
            }
        }
        self.flush_pruned(&mut pending, report);
    }

    fn flush_pruned(&self, pending: &mut Vec<String>, report: &mut ScanReport) {
        if pending.is_empty() {
            return;
        }

        let chunk = std::mem::take(pending);
        let result = self.catalog.batch(Some(report.scan_id.as_str()), |batch| {
            let pruned: Vec<String> = chunk.iter().filter(|id| batch.remove(id)).cloned().collect();
            (pruned, batch.failures())
        });

        match result {
            Ok((pruned, failures)) => {
                report.pruned.extend(pruned);
                report.failures += failures;
            }
            Err(e) => {
                tracing::error!("Failed to prune {} identifier(s): {}", chunk.len(), e);
                report.failures += chunk.len() as u64;
            }
        }
    }
}
