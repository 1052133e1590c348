//! assetscan-store: persistence for discovered hosts.
//!
//! The scan orchestrator only ever calls [`HostStore::create`]; the remaining
//! operations back the discovered-hosts API. Two backends ship here: an
//! in-memory map and a directory of JSON files, one per host.

pub mod file;
pub mod memory;

use assetscan_core::{DiscoveredHost, HostId, HostPatch, HostStatus, ScanId};

pub use file::JsonFileHostStore;
pub use memory::MemoryHostStore;

/// Errors that can occur during host storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Discovered host not found: {0}")]
    NotFound(HostId),

    #[error("Discovered host already exists: {0}")]
    Duplicate(HostId),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Filters for listing discovered hosts.
#[derive(Debug, Default, Clone)]
pub struct HostQuery {
    /// Only hosts with this status.
    pub status: Option<HostStatus>,
    /// Only hosts found by this scan run.
    pub scan_id: Option<ScanId>,
}

impl HostQuery {
    pub fn matches(&self, host: &DiscoveredHost) -> bool {
        if let Some(status) = self.status {
            if host.status != status {
                return false;
            }
        }
        if let Some(scan_id) = self.scan_id {
            if host.scan_id != Some(scan_id) {
                return false;
            }
        }
        true
    }
}

/// Trait for discovered-host persistence backends.
///
/// Writes are per host and order-insensitive; implementations provide their
/// own synchronisation.
pub trait HostStore: Send + Sync {
    /// Persist a new host record and return it as stored.
    fn create(&self, host: DiscoveredHost) -> Result<DiscoveredHost, StoreError>;

    /// List hosts matching the query, most recently seen first.
    fn list(&self, query: &HostQuery) -> Result<Vec<DiscoveredHost>, StoreError>;

    /// Fetch one host by ID.
    fn get(&self, id: HostId) -> Result<DiscoveredHost, StoreError>;

    /// Apply a partial update and return the updated record.
    fn update(&self, id: HostId, patch: HostPatch) -> Result<DiscoveredHost, StoreError>;

    /// Remove a host.
    fn delete(&self, id: HostId) -> Result<(), StoreError>;
}

/// Most recently seen first; ties broken by IP for a stable listing.
pub(crate) fn sort_hosts(hosts: &mut [DiscoveredHost]) {
    hosts.sort_by(|a, b| {
        b.last_seen
            .cmp(&a.last_seen)
            .then_with(|| a.ip_address.cmp(&b.ip_address))
    });
}
