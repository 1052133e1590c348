//! Background scan jobs.
//!
//! Each accepted scan runs as its own tokio task. The registry keeps the
//! latest state and progress per scan so callers can poll instead of waiting,
//! and holds the cancellation flag for each run.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use assetscan_core::{ScanEvent, ScanEventPayload, ScanId, ScanProgress, ScanRequest};
use assetscan_store::HostStore;

use crate::config::DiscoverConfig;
use crate::events::EventSink;
use crate::orchestrator::{CancelFlag, Orchestrator, ScanState};

/// Point-in-time view of one scan job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatus {
    pub scan_id: ScanId,
    pub ip_range: String,
    #[serde(flatten)]
    pub state: ScanState,
    pub progress: Option<ScanProgress>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

struct JobEntry {
    status: ScanStatus,
    cancel: CancelFlag,
}

type JobMap = Arc<RwLock<HashMap<ScanId, JobEntry>>>;

/// Registry of scan jobs sharing one config, store, and event sink.
#[derive(Clone)]
pub struct ScanJobs {
    config: Arc<DiscoverConfig>,
    store: Arc<dyn HostStore>,
    sink: Arc<dyn EventSink>,
    jobs: JobMap,
}

impl ScanJobs {
    pub fn new(
        config: Arc<DiscoverConfig>,
        store: Arc<dyn HostStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            store,
            sink,
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &Arc<dyn HostStore> {
        &self.store
    }

    /// Start a scan in the background and return its ID immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, request: ScanRequest) -> ScanId {
        let scan_id = ScanId::new();
        let cancel = CancelFlag::new();

        if let Ok(mut jobs) = self.jobs.write() {
            evict_finished(&mut jobs, self.config.max_finished_jobs);
            jobs.insert(
                scan_id,
                JobEntry {
                    status: ScanStatus {
                        scan_id,
                        ip_range: request.ip_range.clone(),
                        state: ScanState::Validating,
                        progress: None,
                        started_at: Utc::now(),
                        finished_at: None,
                    },
                    cancel: cancel.clone(),
                },
            );
        }

        let tracker = Arc::new(TrackingSink {
            jobs: self.jobs.clone(),
            inner: self.sink.clone(),
        });
        let orchestrator =
            Orchestrator::new(self.config.clone(), self.store.clone(), tracker.clone());

        let handle = tokio::spawn(async move { orchestrator.run(scan_id, &request, &cancel).await });

        tokio::spawn(async move {
            match handle.await {
                Ok(Ok(summary)) => tracing::info!(
                    scan_id = %scan_id,
                    total_scanned = summary.total_scanned,
                    discovered = summary.discovered,
                    duration_ms = summary.duration_ms,
                    "Scan job finished"
                ),
                Ok(Err(e)) => tracing::debug!(scan_id = %scan_id, error = %e, "Scan job ended early"),
                Err(e) => {
                    tracing::error!(scan_id = %scan_id, error = %e, "Scan task panicked");
                    let message = "Scan task panicked".to_string();
                    tracker.emit(&ScanEvent::new(
                        scan_id,
                        ScanEventPayload::ScanError {
                            message: message.clone(),
                        },
                    ));
                    tracker.state_changed(scan_id, &ScanState::Failed { message });
                }
            }
        });

        tracing::info!(scan_id = %scan_id, "Scan job accepted");
        scan_id
    }

    /// Current status of a scan, if known.
    pub fn status(&self, scan_id: ScanId) -> Option<ScanStatus> {
        let jobs = self.jobs.read().ok()?;
        jobs.get(&scan_id).map(|job| job.status.clone())
    }

    /// All known jobs, newest first.
    pub fn list(&self) -> Vec<ScanStatus> {
        let mut all: Vec<ScanStatus> = match self.jobs.read() {
            Ok(jobs) => jobs.values().map(|job| job.status.clone()).collect(),
            Err(_) => Vec::new(),
        };
        all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all
    }

    /// Request cancellation. Finished scans are left as they are.
    ///
    /// Returns the status as of the request, or `None` for an unknown scan.
    pub fn cancel(&self, scan_id: ScanId) -> Option<ScanStatus> {
        let jobs = self.jobs.read().ok()?;
        let job = jobs.get(&scan_id)?;
        if !job.status.state.is_terminal() {
            job.cancel.cancel();
            tracing::info!(scan_id = %scan_id, "Scan cancellation requested");
        }
        Some(job.status.clone())
    }
}

/// Drop the oldest finished jobs so at most `keep` remain.
fn evict_finished(jobs: &mut HashMap<ScanId, JobEntry>, keep: usize) {
    let mut finished: Vec<(DateTime<Utc>, ScanId)> = jobs
        .values()
        .filter(|job| job.status.state.is_terminal())
        .map(|job| {
            let at = job.status.finished_at.unwrap_or(job.status.started_at);
            (at, job.status.scan_id)
        })
        .collect();
    if finished.len() <= keep {
        return;
    }

    finished.sort_by_key(|(at, _)| *at);
    let excess = finished.len() - keep;
    for (_, scan_id) in finished.into_iter().take(excess) {
        jobs.remove(&scan_id);
    }
    tracing::debug!(evicted = excess, "Evicted finished scan jobs");
}

fn set_state(jobs: &JobMap, scan_id: ScanId, state: ScanState) {
    if let Ok(mut jobs) = jobs.write() {
        if let Some(job) = jobs.get_mut(&scan_id) {
            if state.is_terminal() {
                job.status.finished_at = Some(Utc::now());
            }
            job.status.state = state;
        }
    }
}

/// Records progress and state into the registry, then forwards.
struct TrackingSink {
    jobs: JobMap,
    inner: Arc<dyn EventSink>,
}

impl EventSink for TrackingSink {
    fn emit(&self, event: &ScanEvent) {
        if let ScanEventPayload::ScanProgress(progress) = &event.payload {
            if let Ok(mut jobs) = self.jobs.write() {
                if let Some(job) = jobs.get_mut(&event.scan_id) {
                    job.status.progress = Some(progress.clone());
                }
            }
        }
        self.inner.emit(event);
    }

    fn state_changed(&self, scan_id: ScanId, state: &ScanState) {
        self.inner.state_changed(scan_id, state);
        set_state(&self.jobs, scan_id, state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use assetscan_core::ScanOptions;
    use assetscan_store::MemoryHostStore;
    use tokio::net::TcpListener;

    use crate::events::{LogSink, RecordingSink};

    /// Records events but panics on progress, taking the scan task down.
    #[derive(Default)]
    struct FragileSink {
        recorded: RecordingSink,
    }

    impl EventSink for FragileSink {
        fn emit(&self, event: &ScanEvent) {
            self.recorded.emit(event);
            if event.name() == "scan_progress" {
                panic!("sink cannot take progress");
            }
        }

        fn state_changed(&self, scan_id: ScanId, state: &ScanState) {
            self.recorded.state_changed(scan_id, state);
        }
    }

    fn config(port: u16, host_delay_ms: u64) -> Arc<DiscoverConfig> {
        Arc::new(DiscoverConfig {
            max_finished_jobs: 10,
            liveness_ports: vec![port],
            scan_ports: vec![port],
            probe_timeout_ms: 300,
            banner_timeout_ms: 300,
            banner_grace_ms: 100,
            http_timeout_ms: 300,
            host_delay_ms,
            ..Default::default()
        })
    }

    async fn wait_terminal(jobs: &ScanJobs, scan_id: ScanId) -> ScanStatus {
        for _ in 0..100 {
            let status = jobs.status(scan_id).unwrap();
            if status.state.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("scan {scan_id} did not finish");
    }

    #[tokio::test]
    async fn background_scan_completes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let store = Arc::new(MemoryHostStore::new());
        let jobs = ScanJobs::new(config(port, 0), store.clone(), Arc::new(LogSink));

        let scan_id = jobs.spawn(ScanRequest::new("127.0.0.1/32", ScanOptions::default()));
        let status = wait_terminal(&jobs, scan_id).await;

        assert_eq!(status.state, ScanState::Completed);
        assert!(status.finished_at.is_some());
        let progress = status.progress.unwrap();
        assert!(progress.completed);
        assert_eq!(progress.discovered_hosts, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(jobs.list().len(), 1);
    }

    #[tokio::test]
    async fn cancel_stops_running_scan() {
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        // 50 candidates with a long pause between them.
        let jobs = ScanJobs::new(
            config(port, 200),
            Arc::new(MemoryHostStore::new()),
            Arc::new(LogSink),
        );

        let scan_id = jobs.spawn(ScanRequest::new("127.0.0.0/16", ScanOptions::default()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(jobs.cancel(scan_id).is_some());

        let status = wait_terminal(&jobs, scan_id).await;
        assert_eq!(status.state, ScanState::Cancelled);
    }

    #[tokio::test]
    async fn panicking_task_reports_scan_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let sink = Arc::new(FragileSink::default());
        let jobs = ScanJobs::new(
            config(port, 0),
            Arc::new(MemoryHostStore::new()),
            sink.clone(),
        );

        let scan_id = jobs.spawn(ScanRequest::new("127.0.0.1", ScanOptions::default()));
        let status = wait_terminal(&jobs, scan_id).await;
        assert_eq!(
            status.state,
            ScanState::Failed {
                message: "Scan task panicked".to_string()
            }
        );

        let events = sink.recorded.snapshot();
        let last = events.last().unwrap();
        assert_eq!(last.scan_id, scan_id);
        match &last.payload {
            ScanEventPayload::ScanError { message } => assert_eq!(message, "Scan task panicked"),
            other => panic!("unexpected payload: {other:?}"),
        }
        assert!(matches!(
            sink.recorded.states().last(),
            Some(ScanState::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn finished_jobs_are_evicted_oldest_first() {
        let jobs = ScanJobs::new(
            Arc::new(DiscoverConfig {
                max_finished_jobs: 2,
                ..Default::default()
            }),
            Arc::new(MemoryHostStore::new()),
            Arc::new(LogSink),
        );

        let mut finished = Vec::new();
        for _ in 0..3 {
            let scan_id = jobs.spawn(ScanRequest::new("not-an-ip", ScanOptions::default()));
            wait_terminal(&jobs, scan_id).await;
            finished.push(scan_id);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(jobs.list().len(), 3);

        let latest = jobs.spawn(ScanRequest::new("not-an-ip", ScanOptions::default()));
        assert!(jobs.status(finished[0]).is_none());
        assert!(jobs.status(finished[1]).is_some());
        assert!(jobs.status(finished[2]).is_some());
        assert!(jobs.status(latest).is_some());
    }

    #[test]
    fn unknown_scan() {
        let jobs = ScanJobs::new(
            Arc::new(DiscoverConfig::default()),
            Arc::new(MemoryHostStore::new()),
            Arc::new(LogSink),
        );
        assert!(jobs.status(ScanId::new()).is_none());
        assert!(jobs.cancel(ScanId::new()).is_none());
    }

    #[test]
    fn status_json_flattens_state() {
        let status = ScanStatus {
            scan_id: ScanId::new(),
            ip_range: "10.0.0.0/24".to_string(),
            state: ScanState::Scanning { index: 4, total: 254 },
            progress: None,
            started_at: Utc::now(),
            finished_at: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "scanning");
        assert_eq!(json["total"], 254);
        assert_eq!(json["ipRange"], "10.0.0.0/24");
    }
}
