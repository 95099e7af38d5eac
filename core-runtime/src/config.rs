//! # Client Configuration Module
//!
//! Configuration for the client core: the API base URL, the host bridges the
//! core runs on, and the timing knobs for polling and retries.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `ClientConfig` that holds every dependency the core needs. It enforces
//! fail-fast validation so a missing bridge is reported at startup rather
//! than on the first request.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - Transport for every API call (desktop default: reqwest)
//! - `SettingsStore` - Persisted token, cache and preferences (desktop default: SQLite)
//!
//! ## Optional Dependencies
//!
//! - `NetworkMonitor` - Fail fast while offline
//! - `NativeBridge` - Token mirroring and write-action journal
//! - `NotificationPresenter` - System notifications for the poller
//! - `Clock` - Time source (default: system clock)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::ClientConfig;
//!
//! let config = ClientConfig::builder()
//!     .base_url("https://jexi.example.com/api/v1")
//!     .data_dir("/home/user/.local/share/jexi")
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    Clock, HttpClient, NativeBridge, NetworkMonitor, NotificationPresenter, RetryPolicy,
    SettingsStore, SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default interval between notification polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client configuration.
///
/// Use [`ClientConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct ClientConfig {
    /// Prefix joined with every request path, e.g. `https://host/api/v1`
    pub base_url: String,

    pub http_client: Arc<dyn HttpClient>,

    /// Durable key-value store (required)
    pub settings_store: Arc<dyn SettingsStore>,

    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,

    /// Native shell hooks; presence is fixed for the life of the config
    pub native_bridge: Option<Arc<dyn NativeBridge>>,

    pub notification_presenter: Option<Arc<dyn NotificationPresenter>>,

    pub clock: Arc<dyn Clock>,

    /// Interval of the notification poller
    pub poll_interval: Duration,

    /// Retry policy for delivering queued actions to the native bridge
    pub bridge_retry: RetryPolicy,

    /// Retry policy for read requests; writes are never retried
    pub read_retry: RetryPolicy,

    /// Reject offline-cache entries older than this on fallback
    pub offline_cache_max_age: Option<Duration>,

    pub request_timeout: Duration,

    /// Directory for desktop storage (settings database, asset cache)
    pub data_dir: Option<PathBuf>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("http_client", &"HttpClient { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field(
                "network_monitor",
                &self
                    .network_monitor
                    .as_ref()
                    .map(|_| "NetworkMonitor { ... }"),
            )
            .field(
                "native_bridge",
                &self.native_bridge.as_ref().map(|_| "NativeBridge { ... }"),
            )
            .field(
                "notification_presenter",
                &self
                    .notification_presenter
                    .as_ref()
                    .map(|_| "NotificationPresenter { ... }"),
            )
            .field("poll_interval", &self.poll_interval)
            .field("bridge_retry", &self.bridge_retry)
            .field("read_retry", &self.read_retry)
            .field("offline_cache_max_age", &self.offline_cache_max_age)
            .field("request_timeout", &self.request_timeout)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

impl ClientConfig {
    /// Creates a new builder for constructing a `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Base URL is not empty
    /// - Poll interval and request timeout are non-zero
    /// - Retry policies allow at least one attempt
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("Base URL cannot be empty".to_string()));
        }

        if self.poll_interval.is_zero() {
            return Err(Error::Config(
                "Poll interval must be greater than zero".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.bridge_retry.max_attempts == 0 {
            return Err(Error::Config(
                "Bridge retry policy must allow at least one attempt".to_string(),
            ));
        }

        if self.read_retry.max_attempts == 0 {
            return Err(Error::Config(
                "Read retry policy must allow at least one attempt".to_string(),
            ));
        }

        Ok(())
    }

    /// Joins `path` onto the base URL without doubling the slash.
    pub fn url_for(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for API requests. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestHttpClient. \
                 Mobile: inject the shell's native HTTP stack."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required for the token, offline cache and preferences. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default SqliteSettingsStore. \
                 Mobile: inject platform-native settings (SharedPreferences/UserDefaults)."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout).map_err(|e| {
        Error::Internal(format!("Failed to create default HttpClient: {}", e))
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(data_dir: Option<&PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Builder, Handle};

    let data_dir = data_dir.ok_or_else(|| Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "The default SqliteSettingsStore needs a data directory. \
                 Use .data_dir() or inject a SettingsStore."
            .to_string(),
    })?;
    let candidate = data_dir.join("client.db");

    let init_store = |path: PathBuf| -> Result<_> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                Error::Internal(format!(
                    "Failed to create Tokio runtime for default settings store: {}",
                    e
                ))
            })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    // block_on panics inside a runtime, so initialise on a plain thread there.
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || init_store(candidate))
            .join()
            .map_err(|_| {
                Error::Internal(
                    "Worker thread panicked while creating default SettingsStore".to_string(),
                )
            })??,
        Err(_) => init_store(candidate)?,
    };

    let store: Arc<dyn SettingsStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_data_dir: Option<&PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

/// Builder for constructing [`ClientConfig`] instances.
#[derive(Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    native_bridge: Option<Arc<dyn NativeBridge>>,
    notification_presenter: Option<Arc<dyn NotificationPresenter>>,
    clock: Option<Arc<dyn Clock>>,
    poll_interval: Option<Duration>,
    bridge_retry: Option<RetryPolicy>,
    read_retry: Option<RetryPolicy>,
    offline_cache_max_age: Option<Duration>,
    request_timeout: Option<Duration>,
    data_dir: Option<PathBuf>,
}

impl ClientConfigBuilder {
    /// Sets the API base URL (required).
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::ClientConfig;
    ///
    /// let builder = ClientConfig::builder()
    ///     .base_url("https://jexi.example.com/api/v1");
    /// ```
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) is used when the
    /// `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the persisted key-value store (required).
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    /// Sets the native shell bridge.
    ///
    /// Leaving it unset means "no bridge" for the lifetime of the client.
    pub fn native_bridge(mut self, bridge: Arc<dyn NativeBridge>) -> Self {
        self.native_bridge = Some(bridge);
        self
    }

    pub fn notification_presenter(mut self, presenter: Arc<dyn NotificationPresenter>) -> Self {
        self.notification_presenter = Some(presenter);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the notification poll interval.
    ///
    /// Default: 5 minutes
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Sets the retry policy used to deliver queued actions to the bridge.
    ///
    /// Default: 3 attempts, 100ms base delay, exponential backoff
    pub fn bridge_retry(mut self, policy: RetryPolicy) -> Self {
        self.bridge_retry = Some(policy);
        self
    }

    /// Sets the retry policy for read requests.
    ///
    /// Default: a single attempt
    pub fn read_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_retry = Some(policy);
        self
    }

    /// Rejects cached read responses older than `max_age` on fallback.
    ///
    /// Default: entries never expire
    pub fn offline_cache_max_age(mut self, max_age: Duration) -> Self {
        self.offline_cache_max_age = Some(max_age);
        self
    }

    /// Default: 30 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the directory used by desktop storage defaults.
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Builds the final `ClientConfig` instance.
    ///
    /// Returns an error if:
    /// - The base URL is missing or empty
    /// - Required bridges are missing (HttpClient, SettingsStore) and no
    ///   desktop default can be provided
    /// - Timing or retry values are invalid
    pub fn build(self) -> Result<ClientConfig> {
        let base_url = self.base_url.ok_or_else(|| {
            Error::Config("Base URL is required. Use .base_url() to set it.".to_string())
        })?;

        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(self.data_dir.as_ref())?,
        };

        let config = ClientConfig {
            base_url,
            http_client,
            settings_store,
            network_monitor: self.network_monitor,
            native_bridge: self.native_bridge,
            notification_presenter: self.notification_presenter,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            bridge_retry: self.bridge_retry.unwrap_or_default(),
            read_retry: self.read_retry.unwrap_or_else(RetryPolicy::single_attempt),
            offline_cache_max_age: self.offline_cache_max_age,
            request_timeout,
            data_dir: self.data_dir,
        };

        config.validate()?;

        Ok(config)
    }
}
