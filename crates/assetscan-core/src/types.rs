//! Core domain types for network discovery.
//!
//! These types describe what a scan is asked to do and what it leaves behind
//! in the discovered-hosts store. JSON field names follow the camelCase shape
//! the inventory UI consumes.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AssetScanError;

/// Source tag stamped on every host created by a network scan.
pub const DISCOVERY_SOURCE: &str = "network-scan";

// ── Identifiers ───────────────────────────────────────────────────

/// Unique identifier for one scan run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ScanId(pub Uuid);

impl ScanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a persisted discovered host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct HostId(pub Uuid);

impl HostId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HostId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for HostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Scan input ────────────────────────────────────────────────────

/// Independent toggles controlling what a scan gathers per live host.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanOptions {
    #[serde(rename = "useDNS", default)]
    pub use_dns: bool,
    #[serde(rename = "scanForUSB", default)]
    pub scan_for_usb: bool,
    #[serde(rename = "scanForSerialNumbers", default)]
    pub scan_for_serial_numbers: bool,
    #[serde(rename = "scanForHardwareDetails", default)]
    pub scan_for_hardware_details: bool,
    #[serde(rename = "scanForInstalledSoftware", default)]
    pub scan_for_installed_software: bool,
}

/// External monitoring integration settings carried with a scan request.
///
/// Accepted and echoed back; no monitoring API is contacted by the scanner.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringIntegration {
    pub enabled: bool,
    pub url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

/// A fully normalised scan request. Owned by the scan task once started.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub ip_range: String,
    pub options: ScanOptions,
    pub dns_servers: Vec<Ipv4Addr>,
    pub monitoring: Option<MonitoringIntegration>,
}

impl ScanRequest {
    pub fn new(ip_range: &str, options: ScanOptions) -> Self {
        Self {
            ip_range: ip_range.trim().to_string(),
            options,
            dns_servers: Vec::new(),
            monitoring: None,
        }
    }

    /// Attach custom DNS servers. Blank entries are skipped.
    pub fn with_dns_servers<S: AsRef<str>>(
        mut self,
        servers: &[S],
    ) -> Result<Self, AssetScanError> {
        for raw in servers {
            let raw = raw.as_ref().trim();
            if raw.is_empty() {
                continue;
            }
            let addr: Ipv4Addr = raw
                .parse()
                .map_err(|_| AssetScanError::InvalidDnsServer(raw.to_string()))?;
            if !self.dns_servers.contains(&addr) {
                self.dns_servers.push(addr);
            }
        }
        Ok(self)
    }

    pub fn with_monitoring(mut self, monitoring: MonitoringIntegration) -> Self {
        self.monitoring = Some(monitoring);
        self
    }

    /// Reverse DNS runs when asked for explicitly or when custom servers were supplied.
    pub fn wants_reverse_dns(&self) -> bool {
        self.options.use_dns || !self.dns_servers.is_empty()
    }
}

// ── Discovered hosts ──────────────────────────────────────────────

/// Lifecycle status of a discovered host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Online,
    Imported,
}

/// A value that either was collected or could not be without credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Detail<T> {
    Available { data: T },
    Unavailable { reason: String },
}

impl<T> Detail<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Operating system and service facts inferred from the network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub os: String,
    pub version: Option<String>,
    pub architecture: String,
    pub web_server: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub banners: BTreeMap<u16, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_software: Option<Detail<Vec<String>>>,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            os: "Unknown".to_string(),
            version: None,
            architecture: "Unknown".to_string(),
            web_server: None,
            banners: BTreeMap::new(),
            installed_software: None,
        }
    }
}

/// Hardware facts. Each field is present only when the scan asked for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HardwareDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<Detail<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Detail<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usb: Option<Detail<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_numbers: Option<Detail<Vec<String>>>,
}

/// A host found alive by a network scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredHost {
    pub id: HostId,
    pub ip_address: Ipv4Addr,
    pub mac_address: Option<String>,
    pub hostname: Option<String>,
    pub status: HostStatus,
    pub source: String,
    pub open_ports: Vec<u16>,
    pub system_info: SystemInfo,
    pub hardware_details: HardwareDetails,
    pub scan_id: Option<ScanId>,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl DiscoveredHost {
    /// A fresh `online` record for `ip`, stamped now.
    pub fn new(ip_address: Ipv4Addr) -> Self {
        let now = Utc::now();
        Self {
            id: HostId::new(),
            ip_address,
            mac_address: None,
            hostname: None,
            status: HostStatus::Online,
            source: DISCOVERY_SOURCE.to_string(),
            open_ports: Vec::new(),
            system_info: SystemInfo::default(),
            hardware_details: HardwareDetails::default(),
            scan_id: None,
            last_seen: now,
            created_at: now,
        }
    }

    /// Apply a partial update. `last_seen` is left alone.
    pub fn apply(&mut self, patch: HostPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(hostname) = patch.hostname {
            self.hostname = Some(hostname);
        }
        if let Some(mac) = patch.mac_address {
            self.mac_address = Some(mac);
        }
    }
}

/// Partial update accepted by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HostPatch {
    pub status: Option<HostStatus>,
    pub hostname: Option<String>,
    pub mac_address: Option<String>,
}
