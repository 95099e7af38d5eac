//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType},
};
use reqwest::Url;
use std::io::ErrorKind;
use std::time::Duration;
use tracing::debug;

const DEFAULT_PROBE_ADDR: &str = "1.1.1.1:443";
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Desktop network monitor implementation
///
/// Reachability is decided by a TCP connect to a probe address. A completed
/// or refused connect means the host answered and reports `Connected`.
///
/// Any other failure only counts as `Disconnected` when the probe targets
/// the API server itself ([`for_base_url`](Self::for_base_url),
/// [`with_probe`](Self::with_probe)). A failed third-party probe reports
/// `Indeterminate`, so requests are still attempted.
///
/// Note: Platform-specific implementations (Linux netlink, macOS SystemConfiguration,
/// Windows WinAPI) would be more robust but require additional dependencies.
#[derive(Debug, Clone)]
pub struct DesktopNetworkMonitor {
    probe_addr: String,
    probe_timeout: Duration,
    poll_interval: Duration,
    authoritative: bool,
}

impl DesktopNetworkMonitor {
    /// Create a new network monitor probing a public resolver
    pub fn new() -> Self {
        Self {
            authoritative: false,
            ..Self::with_probe(DEFAULT_PROBE_ADDR)
        }
    }

    /// Probe `host:port` of the API server
    pub fn with_probe(probe_addr: impl Into<String>) -> Self {
        Self {
            probe_addr: probe_addr.into(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            authoritative: true,
        }
    }

    /// Probe the host and port `base_url` points at
    pub fn for_base_url(base_url: &str) -> Result<Self> {
        Ok(Self::with_probe(probe_addr_for(base_url)?))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn probe_addr(&self) -> &str {
        &self.probe_addr
    }

    async fn check_connectivity(&self) -> NetworkStatus {
        let failure = match tokio::time::timeout(
            self.probe_timeout,
            tokio::net::TcpStream::connect(self.probe_addr.as_str()),
        )
        .await
        {
            Ok(Ok(_)) => return NetworkStatus::Connected,
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                return NetworkStatus::Connected
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => "timed out".to_string(),
        };

        debug!(probe = %self.probe_addr, error = %failure, "Network probe failed");
        if self.authoritative {
            NetworkStatus::Disconnected
        } else {
            NetworkStatus::Indeterminate
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// `host:port` of `base_url`, using the scheme's default port when none is
/// given.
fn probe_addr_for(base_url: &str) -> Result<String> {
    let url = Url::parse(base_url)
        .map_err(|e| BridgeError::OperationFailed(format!("Invalid base URL: {}", e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| BridgeError::OperationFailed(format!("No host in {}", base_url)))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| BridgeError::OperationFailed(format!("No port for {}", base_url)))?;
    Ok(format!("{}:{}", host, port))
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let status = self.check_connectivity().await;
        debug!(status = ?status, probe = %self.probe_addr, "Network probe finished");

        let info = match status {
            // Desktop can't tell Ethernet from WiFi without platform APIs
            NetworkStatus::Connected => NetworkInfo::connected(NetworkType::Other),
            NetworkStatus::Disconnected => NetworkInfo::disconnected(),
            NetworkStatus::Indeterminate => NetworkInfo::indeterminate(),
        };
        Ok(info)
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        Ok(Box::new(DesktopNetworkChangeStream {
            monitor: self.clone(),
            last_status: None,
        }))
    }
}

/// Network change stream that polls for changes
struct DesktopNetworkChangeStream {
    monitor: DesktopNetworkMonitor,
    last_status: Option<NetworkStatus>,
}

#[async_trait]
impl NetworkChangeStream for DesktopNetworkChangeStream {
    async fn next(&mut self) -> Option<NetworkInfo> {
        loop {
            // The first item reports the initial status without waiting.
            if self.last_status.is_some() {
                tokio::time::sleep(self.monitor.poll_interval).await;
            }

            if let Ok(info) = self.monitor.get_network_info().await {
                if self.last_status != Some(info.status) {
                    self.last_status = Some(info.status);
                    return Some(info);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Non-routable address: connects time out or fail without a reply.
    const UNROUTABLE: &str = "10.255.255.1:9";

    #[tokio::test]
    async fn test_reachable_probe_is_connected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let monitor = DesktopNetworkMonitor::with_probe(addr.to_string());
        let info = monitor.get_network_info().await.unwrap();

        assert_eq!(info.status, NetworkStatus::Connected);
        assert!(!monitor.is_known_offline().await);
    }

    #[tokio::test]
    async fn test_refused_probe_means_host_answered() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let monitor = DesktopNetworkMonitor::with_probe(addr.to_string());
        assert_eq!(
            monitor.get_network_info().await.unwrap().status,
            NetworkStatus::Connected
        );
    }

    #[tokio::test]
    async fn test_unreachable_api_probe_is_known_offline() {
        let monitor = DesktopNetworkMonitor::with_probe(UNROUTABLE)
            .with_probe_timeout(Duration::from_millis(200));

        assert!(monitor.is_known_offline().await);
    }

    #[tokio::test]
    async fn test_failed_public_probe_is_indeterminate() {
        let monitor = DesktopNetworkMonitor {
            probe_addr: UNROUTABLE.to_string(),
            ..DesktopNetworkMonitor::new()
        }
        .with_probe_timeout(Duration::from_millis(200));

        let info = monitor.get_network_info().await.unwrap();
        assert_eq!(info.status, NetworkStatus::Indeterminate);
        assert!(!monitor.is_known_offline().await);
    }

    #[test]
    fn test_probe_addr_follows_base_url() {
        let probe = |url| DesktopNetworkMonitor::for_base_url(url).unwrap();
        assert_eq!(probe("https://jexi.example/api/v1").probe_addr(), "jexi.example:443");
        assert_eq!(probe("http://localhost:8000/api/v1").probe_addr(), "localhost:8000");
        assert_eq!(probe("http://10.0.0.5/api").probe_addr(), "10.0.0.5:80");
        assert!(DesktopNetworkMonitor::for_base_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_change_stream_reports_initial_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let monitor = DesktopNetworkMonitor::with_probe(addr.to_string());
        let mut changes = monitor.subscribe_changes().await.unwrap();

        let first = changes.next().await.unwrap();
        assert_eq!(first.status, NetworkStatus::Connected);
    }
}
