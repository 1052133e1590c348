//! Open-port scan of a single live host.

use std::net::IpAddr;
use std::time::Duration;

use futures::future::join_all;

use crate::probe::probe_tcp;

/// Probe every port in `ports` at once and return the open ones, ascending.
///
/// The fan-out is unbounded on purpose: the list is short and fixed, so a
/// host never has more than `ports.len()` sockets in flight.
pub async fn scan_ports(ip: IpAddr, ports: &[u16], per_port: Duration) -> Vec<u16> {
    let probes = ports.iter().map(|&port| async move {
        if probe_tcp(ip, port, per_port).await {
            Some(port)
        } else {
            None
        }
    });

    let mut open: Vec<u16> = join_all(probes).await.into_iter().flatten().collect();
    open.sort_unstable();
    open.dedup();

    tracing::debug!(%ip, open_ports = ?open, "Port scan complete");
    open
}
