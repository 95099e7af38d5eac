//! Client service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, settings,
//! native shell, network monitor, notification surface) into one
//! [`ClientService`]. Desktop apps typically enable the `desktop-shims`
//! feature (which depends on `bridge-desktop`) and call
//! [`bootstrap_desktop`]; other hosts build a
//! [`ClientConfig`](core_runtime::config::ClientConfig) with their own
//! bridges and call [`ClientService::new`].

mod connectivity;
pub mod error;

#[cfg(feature = "desktop-shims")]
mod desktop;

pub use error::{Result, ServiceError};

#[cfg(feature = "desktop-shims")]
pub use desktop::{bootstrap_desktop, DesktopOptions};

use core_auth::Credentials;
use core_client::{
    ApiClient, NotificationPoller, NotificationsView, Preferences, ViewHandler, ViewRegistry,
};
use core_runtime::config::ClientConfig;
use core_runtime::events::{EventBus, EventStream};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Views that own the notification timer while shown.
///
/// Polling is scoped to these views rather than to the whole session:
/// switching to any other view tears the timer down, and with it native
/// alerts. Hosts that want alerts on more screens register them with
/// [`ClientService::register_notification_view`]; [`NotificationPoller::refresh_now`]
/// still works from anywhere.
pub const NOTIFICATION_VIEWS: &[&str] = &["dashboard", "notifications"];

/// Everything a host needs to drive the client: the dispatcher, the
/// notification poller, view switching, preferences and the event bus.
#[derive(Clone)]
pub struct ClientService {
    inner: Arc<Inner>,
}

struct Inner {
    api: ApiClient,
    poller: NotificationPoller,
    preferences: Preferences,
    views: AsyncMutex<ViewRegistry>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ClientService {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_event_bus(config, EventBus::default())
    }

    /// Build the service on an existing bus, e.g. one the host already
    /// listens to.
    pub fn with_event_bus(config: ClientConfig, events: EventBus) -> Self {
        let api = ApiClient::from_config(&config, events);
        let poller = NotificationPoller::from_api(api.clone());
        let preferences = Preferences::new(Arc::clone(&config.settings_store));

        let mut views = ViewRegistry::new();
        for id in NOTIFICATION_VIEWS {
            views.register(Arc::new(NotificationsView::new(*id, poller.clone())));
        }

        info!(base_url = %config.base_url, bridge = api.bridge().is_present(), "Client service ready");
        Self {
            inner: Arc::new(Inner {
                api,
                poller,
                preferences,
                views: AsyncMutex::new(views),
                watcher: Mutex::new(None),
            }),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn poller(&self) -> &NotificationPoller {
        &self.inner.poller
    }

    pub fn preferences(&self) -> &Preferences {
        &self.inner.preferences
    }

    pub fn config(&self) -> &ClientConfig {
        self.inner.api.config()
    }

    pub fn events(&self) -> &EventBus {
        self.inner.api.events()
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events().subscribe())
    }

    pub async fn is_logged_in(&self) -> bool {
        self.inner.api.tokens().is_logged_in().await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Credentials> {
        Ok(self.inner.api.login(username, password).await?)
    }

    pub async fn setup(&self, username: &str, password: &str) -> Result<Credentials> {
        Ok(self.inner.api.setup(username, password).await?)
    }

    /// Leave the current view and clear the session.
    pub async fn logout(&self) -> Result<()> {
        self.inner.views.lock().await.deactivate().await;
        self.inner.poller.stop();
        Ok(self.inner.api.logout().await?)
    }

    /// Add or replace a view handler.
    pub async fn register_view(&self, handler: Arc<dyn ViewHandler>) {
        self.inner.views.lock().await.register(handler);
    }

    /// Make `id` another view that keeps the notification timer running
    /// while shown.
    pub async fn register_notification_view(&self, id: &str) {
        self.register_view(Arc::new(NotificationsView::new(
            id,
            self.inner.poller.clone(),
        )))
        .await;
    }

    /// Switch to the view `id`, tearing down the current one first.
    pub async fn show_view(&self, id: &str) -> Result<()> {
        Ok(self.inner.views.lock().await.switch_to(id).await?)
    }

    pub async fn current_view(&self) -> Option<String> {
        self.inner.views.lock().await.current().map(str::to_string)
    }

    /// Start publishing connectivity transitions. Replaces a running
    /// watcher. Requires a tokio runtime and a configured network monitor.
    pub fn watch_connectivity(&self) -> Result<()> {
        let monitor = self.config().network_monitor.clone().ok_or_else(|| {
            ServiceError::CapabilityMissing {
                capability: "NetworkMonitor".to_string(),
                message: "Connectivity events need a network monitor. \
                          Use .network_monitor() on the config builder."
                    .to_string(),
            }
        })?;

        let handle = connectivity::spawn_watcher(monitor, self.events().clone());
        let previous = self.lock_watcher().replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    /// Stop background work and wait for queued bridge actions.
    pub async fn shutdown(&self) {
        self.inner.views.lock().await.deactivate().await;
        self.inner.poller.stop();
        let watcher = self.lock_watcher().take();
        if let Some(watcher) = watcher {
            watcher.abort();
        }
        self.inner.api.bridge().flush().await;
        debug!("Client service shut down");
    }

    fn lock_watcher(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.inner.watcher.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
