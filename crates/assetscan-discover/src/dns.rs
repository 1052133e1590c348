//! Reverse DNS (PTR) lookups over UDP.
//!
//! Queries go to the scan's custom DNS servers when it has any, otherwise to
//! the nameservers listed in `/etc/resolv.conf`. Failures never abort a scan;
//! the host just keeps a null hostname.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use dns_parser::{Builder, Packet, QueryClass, QueryType, RData};
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};
use uuid::Uuid;

use assetscan_core::ScanRequest;

use crate::error::{DiscoverError, Result};

const DNS_PORT: u16 = 53;
const RESOLV_CONF: &str = "/etc/resolv.conf";

/// PTR resolver bound to a fixed list of servers.
#[derive(Debug, Clone)]
pub struct ReverseResolver {
    servers: Vec<SocketAddr>,
    per_server: Duration,
}

impl ReverseResolver {
    pub fn new(servers: Vec<SocketAddr>, per_server: Duration) -> Self {
        Self {
            servers,
            per_server,
        }
    }

    /// Resolver using the system nameservers.
    pub fn system(per_server: Duration) -> Self {
        Self::new(system_nameservers(Path::new(RESOLV_CONF)), per_server)
    }

    /// Resolver for one scan: its custom servers if given, else the system ones.
    pub fn for_request(request: &ScanRequest, per_server: Duration) -> Self {
        if request.dns_servers.is_empty() {
            Self::system(per_server)
        } else {
            let servers = request
                .dns_servers
                .iter()
                .map(|ip| SocketAddr::new(IpAddr::V4(*ip), DNS_PORT))
                .collect();
            Self::new(servers, per_server)
        }
    }

    pub fn servers(&self) -> &[SocketAddr] {
        &self.servers
    }

    /// First PTR name for `ip`, trailing dot removed.
    pub async fn lookup(&self, ip: Ipv4Addr) -> Result<String> {
        if self.servers.is_empty() {
            return Err(DiscoverError::Dns("no nameservers configured".to_string()));
        }

        let mut last_error = None;
        for &server in &self.servers {
            match query_ptr(server, ip, self.per_server).await {
                Ok(name) => return Ok(name),
                Err(e) => {
                    tracing::trace!(%ip, %server, error = %e, "PTR query failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| DiscoverError::Dns("no answer".to_string())))
    }

    /// Like [`lookup`](Self::lookup) but downgrades every failure to `None`.
    pub async fn hostname(&self, ip: Ipv4Addr) -> Option<String> {
        match self.lookup(ip).await {
            Ok(name) => Some(name),
            Err(e) => {
                tracing::debug!(%ip, error = %e, "Reverse DNS unavailable");
                None
            }
        }
    }
}

/// `d.c.b.a.in-addr.arpa` for `a.b.c.d`.
pub fn ptr_name(ip: Ipv4Addr) -> String {
    let [a, b, c, d] = ip.octets();
    format!("{d}.{c}.{b}.{a}.in-addr.arpa")
}

/// Build a recursive PTR query packet.
pub fn build_ptr_query(id: u16, ip: Ipv4Addr) -> Result<Vec<u8>> {
    let mut builder = Builder::new_query(id, true);
    builder.add_question(&ptr_name(ip), false, QueryType::PTR, QueryClass::IN);
    builder
        .build()
        .map_err(|_| DiscoverError::Dns("PTR query truncated".to_string()))
}

/// Extract the first PTR answer from a response matching `id`.
///
/// `Ok(None)` means the packet belongs to a different transaction.
pub fn parse_ptr_response(id: u16, payload: &[u8]) -> Result<Option<String>> {
    let packet = Packet::parse(payload).map_err(|e| DiscoverError::Dns(e.to_string()))?;
    if packet.header.id != id {
        return Ok(None);
    }

    for answer in &packet.answers {
        if let RData::PTR(record) = &answer.data {
            let name = record.0.to_string();
            let name = name.trim_end_matches('.');
            if !name.is_empty() {
                return Ok(Some(name.to_string()));
            }
        }
    }

    Err(DiscoverError::Dns("no PTR record in response".to_string()))
}

async fn query_ptr(server: SocketAddr, ip: Ipv4Addr, limit: Duration) -> Result<String> {
    let bind_addr = if server.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(server).await?;

    let id = (Uuid::new_v4().as_u128() & 0xFFFF) as u16;
    socket.send(&build_ptr_query(id, ip)?).await?;

    let deadline = Instant::now() + limit;
    let mut buf = [0u8; 512];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let n = timeout(remaining, socket.recv(&mut buf))
            .await
            .map_err(|_| DiscoverError::Dns(format!("timed out waiting for {server}")))??;

        if let Some(name) = parse_ptr_response(id, &buf[..n])? {
            return Ok(name);
        }
    }
}

/// Nameserver addresses from a resolv.conf-style file. Missing file → empty.
pub fn system_nameservers(path: &Path) -> Vec<SocketAddr> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_resolv_conf(&text),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "No resolv.conf");
            Vec::new()
        }
    }
}

fn parse_resolv_conf(text: &str) -> Vec<SocketAddr> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#') && !line.starts_with(';'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some("nameserver"), Some(addr)) => addr.parse::<IpAddr>().ok(),
                _ => None,
            }
        })
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
        .collect()
}
