//! Event sinks for scan lifecycle events.
//!
//! The orchestrator fires `scan_progress`, `scan_completed`, and `scan_error`
//! at fixed points; a sink decides where they go. [`LogSink`] is the default
//! and only writes log lines. [`BroadcastSink`] fans events out over a tokio
//! broadcast channel for in-process subscribers.

use std::sync::Arc;

use tokio::sync::broadcast;

use assetscan_core::{ScanEvent, ScanEventPayload, ScanId};

use crate::orchestrator::ScanState;

/// Receives scan events. Must not block: it is called inline by the scan loop.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &ScanEvent);

    /// Called on every orchestrator state transition. Not part of the event stream.
    fn state_changed(&self, _scan_id: ScanId, _state: &ScanState) {}
}

/// Writes every event as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &ScanEvent) {
        match &event.payload {
            ScanEventPayload::ScanProgress(p) => tracing::info!(
                scan_id = %event.scan_id,
                event = event.name(),
                progress_percent = p.progress_percent,
                scanned_hosts = p.scanned_hosts,
                discovered_hosts = p.discovered_hosts,
                current_ip = p.current_ip.as_deref().unwrap_or("-"),
                completed = p.completed,
                "{}",
                p.message
            ),
            ScanEventPayload::ScanCompleted {
                ip_range,
                total_scanned,
                discovered,
                duration_ms,
            } => tracing::info!(
                scan_id = %event.scan_id,
                event = event.name(),
                ip_range = %ip_range,
                total_scanned,
                discovered,
                duration_ms,
                "Network scan completed"
            ),
            ScanEventPayload::ScanError { message } => tracing::error!(
                scan_id = %event.scan_id,
                event = event.name(),
                error = %message,
                "Network scan failed"
            ),
        }
    }

    fn state_changed(&self, scan_id: ScanId, state: &ScanState) {
        tracing::debug!(scan_id = %scan_id, state = ?state, "Scan state changed");
    }
}

/// Publishes events on a broadcast channel. Lagging subscribers lose events.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<ScanEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: &ScanEvent) {
        // No subscribers is normal.
        let _ = self.tx.send(event.clone());
    }
}

/// Forwards each event to several sinks in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &ScanEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }

    fn state_changed(&self, scan_id: ScanId, state: &ScanState) {
        for sink in &self.sinks {
            sink.state_changed(scan_id, state);
        }
    }
}

/// Collects events in memory. Test helper.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSink {
    pub events: std::sync::Mutex<Vec<ScanEvent>>,
    pub states: std::sync::Mutex<Vec<ScanState>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn snapshot(&self) -> Vec<ScanEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<ScanState> {
        self.states.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl EventSink for RecordingSink {
    fn emit(&self, event: &ScanEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn state_changed(&self, _scan_id: ScanId, state: &ScanState) {
        self.states.lock().unwrap().push(state.clone());
    }
}
