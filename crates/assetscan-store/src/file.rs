//! File-system backed host store.
//!
//! Hosts are stored as pretty-printed JSON files in a flat directory:
//! ```text
//! {root}/
//!   {host_id}.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use assetscan_core::{DiscoveredHost, HostId, HostPatch};

use crate::{sort_hosts, HostQuery, HostStore, StoreError};

/// Host store keeping one JSON document per discovered host.
pub struct JsonFileHostStore {
    root: PathBuf,
    /// Serialises read-modify-write cycles (`update`) against each other.
    write_lock: Mutex<()>,
}

impl JsonFileHostStore {
    /// Create a new store rooted at the given directory.
    /// Creates the directory if it doesn't exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn host_path(&self, id: HostId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn read_host(path: &Path) -> Result<DiscoveredHost, StoreError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn write_host(&self, host: &DiscoveredHost) -> Result<PathBuf, StoreError> {
        let path = self.host_path(host.id);
        let json = serde_json::to_string_pretty(host)?;
        fs::write(&path, json)?;
        Ok(path)
    }
}

impl HostStore for JsonFileHostStore {
    fn create(&self, host: DiscoveredHost) -> Result<DiscoveredHost, StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        if self.host_path(host.id).exists() {
            return Err(StoreError::Duplicate(host.id));
        }

        let path = self.write_host(&host)?;
        tracing::debug!(
            host_id = %host.id,
            ip = %host.ip_address,
            path = %path.display(),
            "Discovered host saved"
        );
        Ok(host)
    }

    fn list(&self, query: &HostQuery) -> Result<Vec<DiscoveredHost>, StoreError> {
        let mut results = Vec::new();

        for entry in fs::read_dir(&self.root)?.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_host(&path) {
                Ok(host) if query.matches(&host) => results.push(host),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable host file");
                }
            }
        }

        sort_hosts(&mut results);
        Ok(results)
    }

    fn get(&self, id: HostId) -> Result<DiscoveredHost, StoreError> {
        let path = self.host_path(id);
        if !path.is_file() {
            return Err(StoreError::NotFound(id));
        }
        Self::read_host(&path)
    }

    fn update(&self, id: HostId, patch: HostPatch) -> Result<DiscoveredHost, StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut host = self.get(id)?;
        host.apply(patch);
        self.write_host(&host)?;
        Ok(host)
    }

    fn delete(&self, id: HostId) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let path = self.host_path(id);
        if !path.is_file() {
            return Err(StoreError::NotFound(id));
        }
        fs::remove_file(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use assetscan_core::{Detail, HostStatus};

    use super::*;

    fn sample_host() -> DiscoveredHost {
        let mut host = DiscoveredHost::new(Ipv4Addr::new(192, 168, 1, 20));
        host.open_ports = vec![22, 80];
        host.system_info.os = "Linux/Unix".to_string();
        host.hardware_details.serial_numbers =
            Some(Detail::unavailable("Requires authenticated SSH access"));
        host
    }

    #[test]
    fn save_and_retrieve() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileHostStore::new(dir.path()).unwrap();
        let host = sample_host();
        let id = host.id;

        store.create(host.clone()).unwrap();
        let retrieved = store.get(id).unwrap();

        assert_eq!(retrieved, host);
        assert!(dir.path().join(format!("{id}.json")).is_file());
    }

    #[test]
    fn update_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileHostStore::new(dir.path()).unwrap();
        let id = store.create(sample_host()).unwrap().id;

        store
            .update(
                id,
                HostPatch {
                    status: Some(HostStatus::Imported),
                    ..Default::default()
                },
            )
            .unwrap();

        // A second store over the same directory sees the change.
        let reopened = JsonFileHostStore::new(dir.path()).unwrap();
        assert_eq!(reopened.get(id).unwrap().status, HostStatus::Imported);
    }

    #[test]
    fn list_skips_foreign_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileHostStore::new(dir.path()).unwrap();
        store.create(sample_host()).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a host").unwrap();
        fs::write(dir.path().join("broken.json"), "{").unwrap();

        let results = store.list(&HostQuery::default()).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn missing_host_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileHostStore::new(dir.path()).unwrap();
        let id = HostId::new();
        assert!(matches!(store.get(id), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete(id), Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.update(id, HostPatch::default()),
            Err(StoreError::NotFound(_))
        ));
    }
}
