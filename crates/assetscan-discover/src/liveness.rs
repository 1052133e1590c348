//! Liveness detection without ICMP.
//!
//! Raw ICMP is often unavailable inside containers and sandboxed network
//! namespaces, so a host counts as alive when any port in the liveness list
//! accepts a TCP connection.

use std::net::IpAddr;
use std::time::Duration;

use crate::probe::probe_tcp;

/// Probe `ports` one at a time, in order, stopping at the first open one.
///
/// Returns the port that answered, or `None` when every probe failed.
pub async fn find_live_port(ip: IpAddr, ports: &[u16], per_port: Duration) -> Option<u16> {
    for &port in ports {
        if probe_tcp(ip, port, per_port).await {
            tracing::debug!(%ip, port, "Host is alive");
            return Some(port);
        }
    }
    None
}

/// `true` if any port in `ports` accepts a connection.
pub async fn is_alive(ip: IpAddr, ports: &[u16], per_port: Duration) -> bool {
    find_live_port(ip, ports, per_port).await.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    async fn closed_ports(n: usize) -> Vec<u16> {
        let mut ports = Vec::new();
        for _ in 0..n {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            ports.push(l.local_addr().unwrap().port());
        }
        ports
    }

    #[tokio::test]
    async fn fully_closed_host_is_not_alive() {
        let ports = closed_ports(16).await;
        assert!(!is_alive(LOCALHOST, &ports, Duration::from_millis(200)).await);
    }

    #[tokio::test]
    async fn late_port_in_list_still_counts() {
        let mut ports = closed_ports(10).await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().port();
        ports.push(open);

        assert_eq!(
            find_live_port(LOCALHOST, &ports, Duration::from_millis(200)).await,
            Some(open)
        );
    }

    #[tokio::test]
    async fn stops_at_first_open_port() {
        let first = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let second = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ports = [
            first.local_addr().unwrap().port(),
            second.local_addr().unwrap().port(),
        ];

        assert_eq!(
            find_live_port(LOCALHOST, &ports, Duration::from_millis(200)).await,
            Some(ports[0])
        );
    }
}
