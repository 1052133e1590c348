//! Per-host information gathering.
//!
//! Combines liveness, open ports, banners, reverse DNS, and the fingerprint
//! heuristic into one record ready for persistence. MAC addresses are never
//! filled in: ARP tables are not reliably readable from containerised or
//! sandboxed network stacks.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use futures::future::join_all;
use reqwest::Client;

use assetscan_core::{DiscoveredHost, HardwareDetails, ScanId, ScanOptions, ScanRequest, SystemInfo};

use crate::banner::{fetch_http_banner, http_banner_url, http_client, BannerGrabber, BANNER_PORTS};
use crate::config::{DiscoverConfig, PortList};
use crate::dns::ReverseResolver;
use crate::error::Result;
use crate::{fingerprint, liveness, ports};

const SSH_PORT: u16 = 22;

/// Everything learned about one live host.
#[derive(Debug, Clone, PartialEq)]
pub struct HostInfo {
    pub ip: Ipv4Addr,
    pub hostname: Option<String>,
    pub mac_address: Option<String>,
    pub open_ports: Vec<u16>,
    pub system_info: SystemInfo,
    pub hardware_details: HardwareDetails,
}

impl HostInfo {
    /// Turn into a fresh `online` host record tagged with the scan that found it.
    pub fn into_discovered(self, scan_id: ScanId) -> DiscoveredHost {
        let mut host = DiscoveredHost::new(self.ip);
        host.hostname = self.hostname;
        host.mac_address = self.mac_address;
        host.open_ports = self.open_ports;
        host.system_info = self.system_info;
        host.hardware_details = self.hardware_details;
        host.scan_id = Some(scan_id);
        host
    }
}

/// Gathers host information for one scan run.
///
/// Built once per scan from the configuration and the request; cheap to share
/// by reference across the host loop.
pub struct HostInspector {
    liveness_ports: Vec<u16>,
    scan_ports: Vec<u16>,
    probe_timeout: Duration,
    grabber: BannerGrabber,
    http: Client,
    resolver: Option<ReverseResolver>,
    options: ScanOptions,
}

impl HostInspector {
    pub fn new(config: &DiscoverConfig, request: &ScanRequest) -> Result<Self> {
        let resolver = request
            .wants_reverse_dns()
            .then(|| ReverseResolver::for_request(request, config.dns_timeout()));

        Ok(Self {
            liveness_ports: config.ports(PortList::Liveness).to_vec(),
            scan_ports: config.ports(PortList::Full).to_vec(),
            probe_timeout: config.probe_timeout(),
            grabber: BannerGrabber::from_config(config),
            http: http_client(config.http_timeout())?,
            resolver,
            options: request.options.clone(),
        })
    }

    /// Sequential liveness check over the liveness port list.
    pub async fn is_alive(&self, ip: Ipv4Addr) -> bool {
        liveness::is_alive(IpAddr::V4(ip), &self.liveness_ports, self.probe_timeout).await
    }

    /// Gather everything for a host already confirmed alive.
    pub async fn inspect(&self, ip: Ipv4Addr) -> HostInfo {
        let addr = IpAddr::V4(ip);

        let (hostname, open_ports) = tokio::join!(
            self.reverse_dns(ip),
            ports::scan_ports(addr, &self.scan_ports, self.probe_timeout),
        );

        let (banners, http_banner) = tokio::join!(
            self.raw_banners(addr, &open_ports),
            self.http_banner(addr, &open_ports),
        );

        let mut system_info = fingerprint::classify(
            &open_ports,
            banners.get(&SSH_PORT).map(String::as_str),
            http_banner.as_deref(),
        );
        system_info.banners = banners;
        system_info.installed_software = fingerprint::software_placeholder(&open_ports, &self.options);
        let hardware_details = fingerprint::hardware_placeholders(&open_ports, &self.options);

        tracing::debug!(
            %ip,
            hostname = hostname.as_deref().unwrap_or("-"),
            open_ports = ?open_ports,
            os = %system_info.os,
            "Host inspected"
        );

        HostInfo {
            ip,
            hostname,
            mac_address: None,
            open_ports,
            system_info,
            hardware_details,
        }
    }

    async fn reverse_dns(&self, ip: Ipv4Addr) -> Option<String> {
        match &self.resolver {
            Some(resolver) => resolver.hostname(ip).await,
            None => None,
        }
    }

    async fn raw_banners(&self, addr: IpAddr, open_ports: &[u16]) -> BTreeMap<u16, String> {
        let grabs = BANNER_PORTS
            .iter()
            .filter(|(port, _)| open_ports.contains(port))
            .map(|&(port, nudge)| async move {
                self.grabber.grab(addr, port, nudge).await.map(|b| (port, b))
            });

        join_all(grabs).await.into_iter().flatten().collect()
    }

    async fn http_banner(&self, addr: IpAddr, open_ports: &[u16]) -> Option<String> {
        let url = http_banner_url(addr, open_ports)?;
        fetch_http_banner(&self.http, &url).await
    }
}
