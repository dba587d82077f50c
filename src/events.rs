// Events emitted by a project while it scans
//
// Delivery is synchronous and in order, on the scanning thread. Sinks return
// a Result so a subscriber can report trouble, but a failing sink is only
// logged: it never aborts the scan or starves the other sinks.

use serde::{Deserialize, Serialize};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

/// Notification emitted during a scan pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")] // {"type": "item_discovered", ...}
pub enum CatalogEvent {
    /// An identifier was discovered and inserted (once per pass)
    ItemDiscovered { identifier: String },

    /// The scan pass reached its terminal state (once per invocation)
    ScanComplete { scan_id: String, cancelled: bool },
}

impl CatalogEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CatalogEvent::ItemDiscovered { .. } => "item_discovered",
            CatalogEvent::ScanComplete { .. } => "scan_complete",
        }
    }
}

/// Subscriber to [`CatalogEvent`]s
pub trait EventSink: Send + Sync {
    /// Sink name for logging
    fn name(&self) -> &'static str;

    fn deliver(&self, event: &CatalogEvent) -> anyhow::Result<()>;
}

/// Ordered list of sinks; failures are logged and counted
#[derive(Default, Clone)]
pub struct EventBus {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) {
        tracing::debug!("Subscribed event sink: {}", sink.name());
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Deliver to every sink in subscription order; returns failed deliveries
    pub fn emit(&self, event: &CatalogEvent) -> u64 {
        let mut failed = 0;
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(event) {
                failed += 1;
                tracing::warn!(
                    sink = sink.name(),
                    event = event.name(),
                    "Event sink failed: {:#}",
                    e
                );
            }
        }
        failed
    }
}

/// Forwards events over a std channel
pub struct ChannelSink {
    tx: Mutex<mpsc::Sender<CatalogEvent>>,
}

impl ChannelSink {
    /// Sink plus the receiving end
    pub fn new() -> (Self, mpsc::Receiver<CatalogEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Mutex::new(tx) }, rx)
    }
}

impl EventSink for ChannelSink {
    fn name(&self) -> &'static str {
        "channel"
    }

    fn deliver(&self, event: &CatalogEvent) -> anyhow::Result<()> {
        let tx = self
            .tx
            .lock()
            .map_err(|_| anyhow::anyhow!("channel sink lock poisoned"))?;
        tx.send(event.clone())
            .map_err(|_| anyhow::anyhow!("receiver dropped"))
    }
}

/// Keeps every event in memory
#[derive(Default, Clone)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<CatalogEvent>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CatalogEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Identifiers of `ItemDiscovered` events, in delivery order
    pub fn discovered(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                CatalogEvent::ItemDiscovered { identifier } => Some(identifier),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, CatalogEvent::ScanComplete { .. }))
            .count()
    }
}

impl EventSink for CollectingSink {
    fn name(&self) -> &'static str {
        "collecting"
    }

    fn deliver(&self, event: &CatalogEvent) -> anyhow::Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("collecting sink lock poisoned"))?
            .push(event.clone());
        Ok(())
    }
}

/// Closure sink
pub struct FnSink<F>(pub F);

impl<F> EventSink for FnSink<F>
where
    F: Fn(&CatalogEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &'static str {
        "fn"
    }

    fn deliver(&self, event: &CatalogEvent) -> anyhow::Result<()> {
        (self.0)(event)
    }
}
