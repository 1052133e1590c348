//! In-memory host store.

use std::collections::HashMap;
use std::sync::RwLock;

use assetscan_core::{DiscoveredHost, HostId, HostPatch};

use crate::{sort_hosts, HostQuery, HostStore, StoreError};

/// Host store backed by a `HashMap` behind a `RwLock`.
///
/// Used by the one-shot CLI mode and by tests; contents are lost on exit.
#[derive(Default)]
pub struct MemoryHostStore {
    hosts: RwLock<HashMap<HostId, DiscoveredHost>>,
}

impl MemoryHostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hosts.read().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HostStore for MemoryHostStore {
    fn create(&self, host: DiscoveredHost) -> Result<DiscoveredHost, StoreError> {
        let mut hosts = self.hosts.write().map_err(|_| StoreError::Poisoned)?;
        if hosts.contains_key(&host.id) {
            return Err(StoreError::Duplicate(host.id));
        }
        hosts.insert(host.id, host.clone());
        Ok(host)
    }

    fn list(&self, query: &HostQuery) -> Result<Vec<DiscoveredHost>, StoreError> {
        let hosts = self.hosts.read().map_err(|_| StoreError::Poisoned)?;
        let mut results: Vec<DiscoveredHost> =
            hosts.values().filter(|h| query.matches(h)).cloned().collect();
        sort_hosts(&mut results);
        Ok(results)
    }

    fn get(&self, id: HostId) -> Result<DiscoveredHost, StoreError> {
        let hosts = self.hosts.read().map_err(|_| StoreError::Poisoned)?;
        hosts.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    fn update(&self, id: HostId, patch: HostPatch) -> Result<DiscoveredHost, StoreError> {
        let mut hosts = self.hosts.write().map_err(|_| StoreError::Poisoned)?;
        let host = hosts.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        host.apply(patch);
        Ok(host.clone())
    }

    fn delete(&self, id: HostId) -> Result<(), StoreError> {
        let mut hosts = self.hosts.write().map_err(|_| StoreError::Poisoned)?;
        hosts.remove(&id).map(|_| ()).ok_or(StoreError::NotFound(id))
    }
}
