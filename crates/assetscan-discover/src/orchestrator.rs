//! Scan orchestration.
//!
//! One [`Orchestrator::run`] call drives a whole scan: validate and expand
//! the range, walk the candidates one at a time with a fixed pause between
//! them, persist every live host, and report through the event sink.
//! Per-host failures are logged and skipped; only validation, setup, and
//! cancellation end a run early.

use std::any::Any;
use std::net::Ipv4Addr;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use tokio::time::Instant;

use assetscan_core::{ScanEvent, ScanEventPayload, ScanId, ScanProgress, ScanRequest};
use assetscan_store::HostStore;

use crate::config::DiscoverConfig;
use crate::error::{DiscoverError, Result};
use crate::events::EventSink;
use crate::host_info::HostInspector;
use crate::range::{expand_range, validate_range};

/// Where a scan run currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScanState {
    Validating,
    Expanding,
    Scanning { index: usize, total: usize },
    Completed,
    Failed { message: String },
    Cancelled,
}

impl ScanState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed { .. } | Self::Cancelled
        )
    }
}

/// Cooperative cancellation, checked before each candidate host.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Totals of a completed scan run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub scan_id: ScanId,
    pub ip_range: String,
    pub total_scanned: u32,
    /// Hosts actually persisted. A live host whose save failed is not counted.
    pub discovered: u32,
    pub duration_ms: u64,
    pub truncated: bool,
}

/// Runs scans against a host store, reporting to an event sink.
#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<DiscoverConfig>,
    store: Arc<dyn HostStore>,
    sink: Arc<dyn EventSink>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<DiscoverConfig>,
        store: Arc<dyn HostStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            store,
            sink,
        }
    }

    pub fn config(&self) -> &DiscoverConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn HostStore> {
        &self.store
    }

    /// Run one scan to completion, failure, or cancellation.
    ///
    /// Every outcome is also reported through the sink: `scan_completed` on
    /// success, `scan_error` otherwise. Hosts persisted before a failure stay
    /// in the store.
    pub async fn run(
        &self,
        scan_id: ScanId,
        request: &ScanRequest,
        cancel: &CancelFlag,
    ) -> Result<ScanSummary> {
        match self.execute(scan_id, request, cancel).await {
            Ok(summary) => {
                self.sink.state_changed(scan_id, &ScanState::Completed);
                Ok(summary)
            }
            Err(e) => {
                let message = e.to_string();
                let state = match e {
                    DiscoverError::Cancelled => {
                        tracing::info!(scan_id = %scan_id, "Network scan cancelled");
                        ScanState::Cancelled
                    }
                    _ => ScanState::Failed {
                        message: message.clone(),
                    },
                };
                self.emit(scan_id, ScanEventPayload::ScanError { message });
                self.sink.state_changed(scan_id, &state);
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        scan_id: ScanId,
        request: &ScanRequest,
        cancel: &CancelFlag,
    ) -> Result<ScanSummary> {
        let started = Instant::now();

        self.sink.state_changed(scan_id, &ScanState::Validating);
        validate_range(&request.ip_range)?;

        self.sink.state_changed(scan_id, &ScanState::Expanding);
        let expansion = expand_range(&request.ip_range, self.config.max_wide_range_hosts)?;
        let inspector = HostInspector::new(&self.config, request)?;

        let total = expansion.len();
        tracing::info!(
            scan_id = %scan_id,
            ip_range = %request.ip_range,
            candidates = total,
            truncated = expansion.truncated,
            reverse_dns = request.wants_reverse_dns(),
            "Network scan started"
        );

        let delay = self.config.host_delay();
        let mut scanned: u32 = 0;
        let mut discovered: u32 = 0;

        for (index, &ip) in expansion.addresses.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(DiscoverError::Cancelled);
            }
            self.sink
                .state_changed(scan_id, &ScanState::Scanning { index, total });

            if inspector.is_alive(ip).await {
                if self.persist_host(scan_id, &inspector, ip).await {
                    discovered += 1;
                }
            } else {
                tracing::trace!(scan_id = %scan_id, %ip, "No response");
            }

            scanned += 1;
            let total = total as u32;
            if should_report(scanned, total) {
                self.emit(
                    scan_id,
                    ScanEventPayload::ScanProgress(ScanProgress {
                        message: format!("Scanned {ip} ({scanned}/{total})"),
                        progress_percent: progress_percent(scanned, total),
                        scanned_hosts: scanned,
                        discovered_hosts: discovered,
                        current_ip: Some(ip.to_string()),
                        completed: false,
                    }),
                );
            }

            if scanned < total && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;

        self.emit(
            scan_id,
            ScanEventPayload::ScanProgress(ScanProgress {
                message: "Network scan completed".to_string(),
                progress_percent: 100,
                scanned_hosts: scanned,
                discovered_hosts: discovered,
                current_ip: None,
                completed: true,
            }),
        );
        self.emit(
            scan_id,
            ScanEventPayload::ScanCompleted {
                ip_range: request.ip_range.clone(),
                total_scanned: scanned,
                discovered,
                duration_ms,
            },
        );

        Ok(ScanSummary {
            scan_id,
            ip_range: request.ip_range.clone(),
            total_scanned: scanned,
            discovered,
            duration_ms,
            truncated: expansion.truncated,
        })
    }

    /// Gather and save one live host. Returns whether it was persisted.
    ///
    /// A panic while gathering or saving is contained to this host.
    async fn persist_host(&self, scan_id: ScanId, inspector: &HostInspector, ip: Ipv4Addr) -> bool {
        let attempt = AssertUnwindSafe(async {
            let host = inspector.inspect(ip).await.into_discovered(scan_id);
            self.store.create(host)
        })
        .catch_unwind()
        .await;

        let saved = match attempt {
            Ok(saved) => saved,
            Err(panic) => {
                tracing::warn!(
                    scan_id = %scan_id,
                    %ip,
                    panic = panic_message(panic.as_ref()),
                    "Host processing panicked, skipping"
                );
                return false;
            }
        };

        match saved {
            Ok(saved) => {
                tracing::info!(
                    scan_id = %scan_id,
                    %ip,
                    host_id = %saved.id,
                    open_ports = ?saved.open_ports,
                    os = %saved.system_info.os,
                    "Host discovered"
                );
                true
            }
            Err(e) => {
                tracing::warn!(scan_id = %scan_id, %ip, error = %e, "Failed to save discovered host");
                false
            }
        }
    }

    fn emit(&self, scan_id: ScanId, payload: ScanEventPayload) {
        self.sink.emit(&ScanEvent::new(scan_id, payload));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Whole percent of `scanned` over `total`, rounded down.
pub fn progress_percent(scanned: u32, total: u32) -> u8 {
    if total == 0 {
        return 100;
    }
    (u64::from(scanned.min(total)) * 100 / u64::from(total)) as u8
}

/// Every 5th host, every 10 % boundary crossed, and the last host.
pub fn should_report(scanned: u32, total: u32) -> bool {
    if scanned == 0 {
        return false;
    }
    scanned % 5 == 0
        || scanned >= total
        || progress_percent(scanned, total) / 10 > progress_percent(scanned - 1, total) / 10
}
