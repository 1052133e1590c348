//! Configuration for the assetscan network scanner.

use std::time::Duration;

use serde::Deserialize;

/// Ports tried one after another to decide whether a host is alive.
pub const LIVENESS_PORTS: [u16; 16] = [
    80, 443, 22, 3389, 21, 23, 25, 53, 135, 139, 445, 993, 995, 1433, 3306, 5432,
];

/// Ports probed together on a live host to build its open-port list.
pub const SCAN_PORTS: [u16; 16] = [
    21, 22, 23, 25, 53, 80, 110, 143, 443, 993, 995, 1433, 3389, 5432, 5985, 5986,
];

/// Top-level discover configuration.
///
/// Loaded from `assetscan.toml` `[discover]` section or
/// `ASSETSCAN_DISCOVER__` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverConfig {
    /// Liveness port list, in priority order.
    #[serde(default = "default_liveness_ports")]
    pub liveness_ports: Vec<u16>,

    /// Full port list for open-port scanning.
    #[serde(default = "default_scan_ports")]
    pub scan_ports: Vec<u16>,

    /// Connect timeout for liveness and port probes.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Overall budget for one raw banner grab.
    #[serde(default = "default_banner_timeout_ms")]
    pub banner_timeout_ms: u64,

    /// After this long, a banner grab returns whatever it has captured.
    #[serde(default = "default_banner_grace_ms")]
    pub banner_grace_ms: u64,

    /// Cap on captured banner bytes.
    #[serde(default = "default_banner_max_bytes")]
    pub banner_max_bytes: usize,

    /// Client timeout for the HTTP HEAD banner request.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Per-server timeout for reverse DNS queries.
    #[serde(default = "default_dns_timeout_ms")]
    pub dns_timeout_ms: u64,

    /// Pause between consecutive candidate hosts.
    #[serde(default = "default_host_delay_ms")]
    pub host_delay_ms: u64,

    /// Candidate cap for ranges wider than a /24.
    #[serde(default = "default_max_wide_range_hosts")]
    pub max_wide_range_hosts: u32,

    /// Directory for the JSON host store.
    #[serde(default = "default_store_dir")]
    pub store_dir: String,

    /// Listen address for the HTTP API.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Finished scan jobs kept for status queries; oldest are evicted first.
    #[serde(default = "default_max_finished_jobs")]
    pub max_finished_jobs: usize,
}

/// Named port lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortList {
    Liveness,
    Full,
}

impl DiscoverConfig {
    pub fn ports(&self, list: PortList) -> &[u16] {
        match list {
            PortList::Liveness => &self.liveness_ports,
            PortList::Full => &self.scan_ports,
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn banner_timeout(&self) -> Duration {
        Duration::from_millis(self.banner_timeout_ms)
    }

    pub fn banner_grace(&self) -> Duration {
        Duration::from_millis(self.banner_grace_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }

    pub fn host_delay(&self) -> Duration {
        Duration::from_millis(self.host_delay_ms)
    }
}

fn default_liveness_ports() -> Vec<u16> {
    LIVENESS_PORTS.to_vec()
}

fn default_scan_ports() -> Vec<u16> {
    SCAN_PORTS.to_vec()
}

fn default_probe_timeout_ms() -> u64 {
    1000
}

fn default_banner_timeout_ms() -> u64 {
    3000
}

fn default_banner_grace_ms() -> u64 {
    2000
}

fn default_banner_max_bytes() -> usize {
    1024
}

fn default_http_timeout_ms() -> u64 {
    3000
}

fn default_dns_timeout_ms() -> u64 {
    2000
}

fn default_host_delay_ms() -> u64 {
    100
}

fn default_max_wide_range_hosts() -> u32 {
    50
}

fn default_store_dir() -> String {
    "./discovered-hosts".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_finished_jobs() -> usize {
    100
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            liveness_ports: default_liveness_ports(),
            scan_ports: default_scan_ports(),
            probe_timeout_ms: default_probe_timeout_ms(),
            banner_timeout_ms: default_banner_timeout_ms(),
            banner_grace_ms: default_banner_grace_ms(),
            banner_max_bytes: default_banner_max_bytes(),
            http_timeout_ms: default_http_timeout_ms(),
            dns_timeout_ms: default_dns_timeout_ms(),
            host_delay_ms: default_host_delay_ms(),
            max_wide_range_hosts: default_max_wide_range_hosts(),
            store_dir: default_store_dir(),
            bind_addr: default_bind_addr(),
            max_finished_jobs: default_max_finished_jobs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiscoverConfig::default();
        assert_eq!(config.probe_timeout(), Duration::from_millis(1000));
        assert_eq!(config.banner_timeout(), Duration::from_millis(3000));
        assert_eq!(config.banner_max_bytes, 1024);
        assert_eq!(config.host_delay(), Duration::from_millis(100));
        assert_eq!(config.max_wide_range_hosts, 50);
        assert_eq!(config.max_finished_jobs, 100);
    }

    #[test]
    fn test_port_lists() {
        let config = DiscoverConfig::default();
        assert_eq!(config.ports(PortList::Liveness)[0], 80);
        assert!(config.ports(PortList::Liveness).contains(&445));
        assert_eq!(config.ports(PortList::Full).len(), 16);
        assert!(config.ports(PortList::Full).contains(&5986));
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: DiscoverConfig =
            serde_json::from_str(r#"{"host_delay_ms": 0, "scan_ports": [22, 80]}"#).unwrap();
        assert_eq!(config.host_delay_ms, 0);
        assert_eq!(config.scan_ports, vec![22, 80]);
        assert_eq!(config.liveness_ports, LIVENESS_PORTS.to_vec());
    }
}
