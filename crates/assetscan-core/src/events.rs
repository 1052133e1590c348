//! Scan lifecycle events.
//!
//! Events are handed to an event sink by the scan orchestrator. The default
//! sink only logs them; clients re-poll the discovered-hosts list instead of
//! holding a push connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AssetScanError;
use crate::types::ScanId;

/// Unique identifier for an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// An event emitted during a scan run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanEvent {
    pub id: EventId,
    pub scan_id: ScanId,
    pub timestamp: DateTime<Utc>,
    pub payload: ScanEventPayload,
}

impl ScanEvent {
    pub fn new(scan_id: ScanId, payload: ScanEventPayload) -> Self {
        Self {
            id: EventId::new(),
            scan_id,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Wire name of the event (`scan_progress`, `scan_completed`, `scan_error`).
    pub fn name(&self) -> &'static str {
        match self.payload {
            ScanEventPayload::ScanProgress(_) => "scan_progress",
            ScanEventPayload::ScanCompleted { .. } => "scan_completed",
            ScanEventPayload::ScanError { .. } => "scan_error",
        }
    }

    pub fn to_json(&self) -> Result<String, AssetScanError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Incremental progress of a scan run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    pub message: String,
    pub progress_percent: u8,
    pub scanned_hosts: u32,
    pub discovered_hosts: u32,
    pub current_ip: Option<String>,
    pub completed: bool,
}

/// The event payload, tagged by event name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEventPayload {
    /// Emitted on a cadence while hosts are scanned, and once more at 100%.
    ScanProgress(ScanProgress),
    /// Summary emitted after the final progress event.
    #[serde(rename_all = "camelCase")]
    ScanCompleted {
        ip_range: String,
        total_scanned: u32,
        discovered: u32,
        duration_ms: u64,
    },
    /// The run aborted; hosts persisted before the failure remain.
    ScanError { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_event_shape() {
        let event = ScanEvent::new(
            ScanId::new(),
            ScanEventPayload::ScanProgress(ScanProgress {
                message: "Scanned 5 of 10 hosts".to_string(),
                progress_percent: 50,
                scanned_hosts: 5,
                discovered_hosts: 1,
                current_ip: Some("10.0.0.5".to_string()),
                completed: false,
            }),
        );

        assert_eq!(event.name(), "scan_progress");
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["payload"]["event"], "scan_progress");
        assert_eq!(json["payload"]["progressPercent"], 50);
        assert_eq!(json["payload"]["currentIp"], "10.0.0.5");
    }

    #[test]
    fn completed_and_error_tags() {
        let completed = ScanEventPayload::ScanCompleted {
            ip_range: "10.0.0.0/30".to_string(),
            total_scanned: 2,
            discovered: 0,
            duration_ms: 12,
        };
        let json = serde_json::to_string(&completed).unwrap();
        assert!(json.contains("\"event\":\"scan_completed\""));
        assert!(json.contains("\"totalScanned\":2"));

        let error = ScanEvent::new(
            ScanId::new(),
            ScanEventPayload::ScanError {
                message: "boom".to_string(),
            },
        );
        assert_eq!(error.name(), "scan_error");
    }
}
