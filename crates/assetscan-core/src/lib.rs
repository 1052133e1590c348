//! assetscan-core: Shared types, scan events, and error handling for assetscan.
//!
//! This crate provides the foundational types used across the discovery subsystem:
//! - Discovered host records with fingerprint and hardware details
//! - Scan requests and per-scan option toggles
//! - Event types for scan progress, completion, and failure
//! - Common error types

pub mod error;
pub mod events;
pub mod types;

pub use error::AssetScanError;
pub use events::{EventId, ScanEvent, ScanEventPayload, ScanProgress};
pub use types::{
    Detail, DiscoveredHost, HardwareDetails, HostId, HostPatch, HostStatus, MonitoringIntegration,
    ScanId, ScanOptions, ScanRequest, SystemInfo, DISCOVERY_SOURCE,
};
