//! Single TCP connect probe, the primitive under liveness and port scanning.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

/// Attempt one TCP connect to `ip:port`.
///
/// Returns `true` if the handshake completes within `limit`; the socket is
/// dropped straight away. Refusals, resets, and timeouts all return `false`.
pub async fn probe_tcp(ip: IpAddr, port: u16, limit: Duration) -> bool {
    let addr = SocketAddr::new(ip, port);

    match timeout(limit, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            true
        }
        Ok(Err(e)) => {
            tracing::trace!(%addr, error = %e, "Connect failed");
            false
        }
        Err(_) => {
            tracing::trace!(%addr, timeout_ms = limit.as_millis() as u64, "Connect timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[tokio::test]
    async fn open_port_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(probe_tcp(LOCALHOST, port, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(!probe_tcp(LOCALHOST, port, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn probe_never_outlives_its_limit() {
        // TEST-NET-3. Some networks intercept and accept, so only the bound is checked.
        let ip = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 1));
        let start = tokio::time::Instant::now();
        let _ = probe_tcp(ip, 80, Duration::from_millis(50)).await;
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
