//! Banner grabbing: raw TCP greetings and HTTP response headers.
//!
//! Both collectors are opportunistic. Any failure yields `None` and the
//! fingerprint simply has less to work with.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::Client;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};

use crate::config::DiscoverConfig;
use crate::error::Result;

/// Ports whose services greet unprompted, and whether they need a CRLF nudge first.
pub const BANNER_PORTS: [(u16, bool); 4] = [(21, false), (22, false), (23, true), (25, false)];

/// Raw TCP banner grabber.
#[derive(Debug, Clone)]
pub struct BannerGrabber {
    /// Overall budget, connect included.
    overall: Duration,
    /// Once this has passed, return as soon as anything was captured.
    grace: Duration,
    max_bytes: usize,
}

impl BannerGrabber {
    pub fn new(overall: Duration, grace: Duration, max_bytes: usize) -> Self {
        Self {
            overall,
            grace,
            max_bytes,
        }
    }

    pub fn from_config(config: &DiscoverConfig) -> Self {
        Self::new(
            config.banner_timeout(),
            config.banner_grace(),
            config.banner_max_bytes,
        )
    }

    /// Connect, optionally nudge with CRLF, and capture what the service sends.
    ///
    /// Stops at the byte cap, at EOF, at the overall deadline, or at the grace
    /// point if at least one byte has arrived.
    pub async fn grab(&self, ip: IpAddr, port: u16, nudge: bool) -> Option<String> {
        let addr = SocketAddr::new(ip, port);
        let start = Instant::now();
        let deadline = start + self.overall;
        let grace = start + self.grace;

        let mut stream = match timeout(self.overall, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::trace!(%addr, error = %e, "Banner connect failed");
                return None;
            }
            Err(_) => {
                tracing::trace!(%addr, "Banner connect timed out");
                return None;
            }
        };

        if nudge && stream.write_all(b"\r\n").await.is_err() {
            return None;
        }

        let mut captured: Vec<u8> = Vec::with_capacity(self.max_bytes);
        let mut chunk = [0u8; 512];

        while captured.len() < self.max_bytes {
            let until = if captured.is_empty() {
                deadline
            } else {
                grace.min(deadline)
            };
            let now = Instant::now();
            if now >= until {
                break;
            }

            match timeout(until - now, stream.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    let take = n.min(self.max_bytes - captured.len());
                    captured.extend_from_slice(&chunk[..take]);
                }
                Ok(Err(e)) => {
                    tracing::trace!(%addr, error = %e, "Banner read failed");
                    break;
                }
                Err(_) => break,
            }
        }

        let text = String::from_utf8_lossy(&captured).trim().to_string();
        if text.is_empty() {
            None
        } else {
            tracing::debug!(%addr, bytes = captured.len(), "Banner captured");
            Some(text)
        }
    }
}

/// Build the client used for HEAD banner requests.
///
/// Certificates are not verified: internal hosts routinely serve self-signed
/// ones and only the headers are of interest.
pub fn http_client(request_timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(request_timeout)
        .danger_accept_invalid_certs(true)
        .redirect(Policy::none())
        .build()?)
}

/// Pick the URL to HEAD: HTTPS when 443 is open, else HTTP when 80 is.
pub fn http_banner_url(ip: IpAddr, open_ports: &[u16]) -> Option<String> {
    if open_ports.contains(&443) {
        Some(format!("https://{ip}/"))
    } else if open_ports.contains(&80) {
        Some(format!("http://{ip}/"))
    } else {
        None
    }
}

/// HEAD `url` and join the non-empty `Server` and `X-Powered-By` values.
pub async fn fetch_http_banner(client: &Client, url: &str) -> Option<String> {
    let response = match client.head(url).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::trace!(%url, error = %e, "HTTP banner request failed");
            return None;
        }
    };

    let headers = response.headers();
    let parts: Vec<&str> = ["server", "x-powered-by"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    /// Accept one connection, write `payload`, then hold the socket open.
    async fn greeting_server(payload: Vec<u8>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(&payload).await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        port
    }

    #[tokio::test]
    async fn grabs_ssh_greeting_within_grace() {
        let port = greeting_server(b"SSH-2.0-OpenSSH_8.9p1 Ubuntu-3ubuntu0.6\r\n".to_vec()).await;
        let grabber = BannerGrabber::new(Duration::from_secs(2), Duration::from_millis(100), 1024);

        let start = Instant::now();
        let banner = grabber.grab(LOCALHOST, port, false).await.unwrap();
        assert_eq!(banner, "SSH-2.0-OpenSSH_8.9p1 Ubuntu-3ubuntu0.6");
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn capture_is_capped() {
        let port = greeting_server(vec![b'A'; 4096]).await;
        let grabber = BannerGrabber::new(Duration::from_secs(2), Duration::from_millis(500), 64);

        let banner = grabber.grab(LOCALHOST, port, false).await.unwrap();
        assert_eq!(banner.len(), 64);
    }

    #[tokio::test]
    async fn silent_service_yields_nothing() {
        let port = greeting_server(Vec::new()).await;
        let grabber =
            BannerGrabber::new(Duration::from_millis(200), Duration::from_millis(100), 1024);

        assert!(grabber.grab(LOCALHOST, port, false).await.is_none());
    }

    #[tokio::test]
    async fn nudge_elicits_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2];
            socket.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"\r\n");
            socket.write_all(b"login: ").await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let grabber = BannerGrabber::new(Duration::from_secs(2), Duration::from_millis(100), 1024);
        assert_eq!(
            grabber.grab(LOCALHOST, port, true).await.as_deref(),
            Some("login:")
        );
    }

    #[test]
    fn https_preferred_over_http() {
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9));
        assert_eq!(
            http_banner_url(ip, &[80, 443]).as_deref(),
            Some("https://10.0.0.9/")
        );
        assert_eq!(http_banner_url(ip, &[22, 80]).as_deref(), Some("http://10.0.0.9/"));
        assert_eq!(http_banner_url(ip, &[22]), None);
    }

    #[tokio::test]
    async fn head_banner_joins_headers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await.unwrap();
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nServer: Microsoft-IIS/10.0\r\nX-Powered-By: ASP.NET\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                )
                .await
                .unwrap();
        });

        let client = http_client(Duration::from_secs(2)).unwrap();
        let banner = fetch_http_banner(&client, &format!("http://127.0.0.1:{port}/")).await;
        assert_eq!(banner.as_deref(), Some("Microsoft-IIS/10.0, ASP.NET"));
    }

    #[tokio::test]
    async fn head_banner_absent_when_nothing_listens() {
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        let client = http_client(Duration::from_millis(500)).unwrap();
        assert!(fetch_http_banner(&client, &format!("http://127.0.0.1:{port}/"))
            .await
            .is_none());
    }
}
