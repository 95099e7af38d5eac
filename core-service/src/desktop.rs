//! Desktop bootstrap: SQLite settings, keyring-backed native bridge, TCP
//! connectivity probe against the API host and the logging notification
//! surface.

use bridge_desktop::{
    DesktopNativeBridge, DesktopNetworkMonitor, DesktopNotificationPresenter, KeyringSecureStore,
    SqliteSettingsStore,
};
use core_runtime::config::ClientConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, ServiceError};
use crate::ClientService;

const SETTINGS_DB: &str = "client.db";
const JOURNAL_DB: &str = "bridge.db";
const KEYRING_SERVICE: &str = "jexi-client";

#[derive(Debug, Clone)]
pub struct DesktopOptions {
    /// API root, e.g. `https://jexi.example/api/v1`
    pub base_url: String,
    pub data_dir: PathBuf,
    /// Keyring service the mirrored token is stored under
    pub keyring_service: String,
    pub poll_interval: Option<Duration>,
    /// `host:port` the connectivity probe connects to; defaults to the host
    /// of `base_url`
    pub probe_addr: Option<String>,
}

impl DesktopOptions {
    pub fn new(base_url: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            data_dir: data_dir.into(),
            keyring_service: KEYRING_SERVICE.to_string(),
            poll_interval: None,
            probe_addr: None,
        }
    }

    pub fn keyring_service(mut self, service: impl Into<String>) -> Self {
        self.keyring_service = service.into();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn probe_addr(mut self, addr: impl Into<String>) -> Self {
        self.probe_addr = Some(addr.into());
        self
    }

    fn network_monitor(&self) -> Result<DesktopNetworkMonitor> {
        match &self.probe_addr {
            Some(addr) => Ok(DesktopNetworkMonitor::with_probe(addr.as_str())),
            None => DesktopNetworkMonitor::for_base_url(&self.base_url)
                .map_err(|e| init_failed("network monitor", e)),
        }
    }
}

/// Build a [`ClientService`] from the desktop bridge implementations.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// use core_service::{bootstrap_desktop, DesktopOptions};
///
/// let service = bootstrap_desktop(DesktopOptions::new(
///     "https://jexi.example/api/v1",
///     "/tmp/jexi",
/// ))
/// .await?;
/// service.watch_connectivity()?;
/// # Ok(())
/// # }
/// ```
pub async fn bootstrap_desktop(options: DesktopOptions) -> Result<ClientService> {
    let network_monitor = options.network_monitor()?;
    tokio::fs::create_dir_all(&options.data_dir)
        .await
        .map_err(|e| init_failed("data directory", e))?;

    let settings = SqliteSettingsStore::new(options.data_dir.join(SETTINGS_DB))
        .await
        .map_err(|e| init_failed("settings store", e))?;
    let secure_store = KeyringSecureStore::with_service_name(&options.keyring_service);
    let native_bridge =
        DesktopNativeBridge::open(options.data_dir.join(JOURNAL_DB), Arc::new(secure_store))
            .await
            .map_err(|e| init_failed("native bridge", e))?;

    let mut builder = ClientConfig::builder()
        .base_url(options.base_url)
        .settings_store(Arc::new(settings))
        .native_bridge(Arc::new(native_bridge))
        .network_monitor(Arc::new(network_monitor))
        .notification_presenter(Arc::new(DesktopNotificationPresenter::new()))
        .data_dir(options.data_dir.clone());
    if let Some(interval) = options.poll_interval {
        builder = builder.poll_interval(interval);
    }

    let config = builder.build()?;
    info!(data_dir = ?options.data_dir, "Desktop client bootstrapped");
    Ok(ClientService::new(config))
}

fn init_failed(component: &str, error: impl std::fmt::Display) -> ServiceError {
    ServiceError::InitializationFailed(format!("{}: {}", component, error))
}
