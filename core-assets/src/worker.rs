//! # Asset Cache Worker
//!
//! Keeps one generation of static assets in the shared [`CacheStorage`] and
//! answers intercepted reads from it.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --install()--> Installed --activate()--> Active
//!   ^       |
//!   +-------+ (any manifest entry unreachable)
//! ```
//!
//! - `install` downloads the whole manifest before writing anything. A
//!   download failure leaves no cache behind; a write failure deletes the
//!   partially written generation.
//! - `activate` deletes every cache whose name is not the current
//!   generation.
//! - `fetch` is cache-first for non-API reads once active. Nothing is
//!   written back on a miss.

use bridge_traits::{
    cache::{CacheStorage, CachedAsset},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse},
    notification::{NativeNotification, NotificationPresenter},
};
use futures::future::try_join_all;
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::error::{AssetError, Result};

pub const DEFAULT_GENERATION: &str = "jexi-cache-v1";
pub const DEFAULT_API_PREFIX: &str = "/api/v1";

pub const DEFAULT_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/css/style.css",
    "/js/app.js",
    "/js/utils.js",
    "/js/api.js",
    "/js/chat.js",
    "/js/notifications.js",
    "https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600;700&family=JetBrains+Mono:wght@400;500&display=swap",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.1/css/all.min.css",
];

pub const PUSH_TITLE: &str = "JEXI Update";
pub const PUSH_MESSAGE: &str = "Something new happened!";
pub const PUSH_ICON: &str =
    "https://ui-avatars.com/api/?name=JEXI&background=8B5CF6&color=fff&size=192";
pub const PUSH_BADGE: &str =
    "https://ui-avatars.com/api/?name=J&background=8B5CF6&color=fff&size=96";
pub const PUSH_VIBRATE: [u32; 3] = [100, 50, 100];
pub const PUSH_TARGET: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Installed,
    Active,
}

/// Where the worker serves from and what it caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetWorkerConfig {
    /// Scheme and host relative manifest entries are resolved against
    pub origin: String,
    pub generation: String,
    pub manifest: Vec<String>,
    /// Reads under this prefix are never intercepted
    pub api_prefix: String,
}

impl AssetWorkerConfig {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            generation: DEFAULT_GENERATION.to_string(),
            manifest: DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
        }
    }

    pub fn generation(mut self, generation: impl Into<String>) -> Self {
        self.generation = generation.into();
        self
    }

    pub fn manifest<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.manifest = entries.into_iter().map(Into::into).collect();
        self
    }

    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    /// Absolute form of a manifest entry or request URL.
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{}", self.origin, url)
        } else {
            format!("{}/{}", self.origin, url)
        }
    }
}

/// Result of intercepting one request.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Not intercepted; the host performs the request itself
    Passthrough,
    Cached(CachedAsset),
    /// Cache miss answered from the network, not stored
    Network(HttpResponse),
}

/// Push message body. Missing fields fall back to the generic update text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushPayload {
    #[serde(default = "default_push_title")]
    pub title: String,
    #[serde(default = "default_push_message")]
    pub message: String,
}

fn default_push_title() -> String {
    PUSH_TITLE.to_string()
}

fn default_push_message() -> String {
    PUSH_MESSAGE.to_string()
}

impl Default for PushPayload {
    fn default() -> Self {
        Self {
            title: default_push_title(),
            message: default_push_message(),
        }
    }
}

pub struct AssetCacheWorker {
    config: AssetWorkerConfig,
    storage: Arc<dyn CacheStorage>,
    http: Arc<dyn HttpClient>,
    presenter: Arc<dyn NotificationPresenter>,
    state: Mutex<WorkerState>,
}

impl AssetCacheWorker {
    pub fn new(
        config: AssetWorkerConfig,
        storage: Arc<dyn CacheStorage>,
        http: Arc<dyn HttpClient>,
        presenter: Arc<dyn NotificationPresenter>,
    ) -> Self {
        Self {
            config,
            storage,
            http,
            presenter,
            state: Mutex::new(WorkerState::Idle),
        }
    }

    pub fn config(&self) -> &AssetWorkerConfig {
        &self.config
    }

    pub fn state(&self) -> WorkerState {
        *self.lock_state()
    }

    /// Populate the current generation with every manifest entry. Returns
    /// the number of assets stored.
    #[instrument(skip(self), fields(generation = %self.config.generation))]
    pub async fn install(&self) -> Result<usize> {
        let downloads = self
            .config
            .manifest
            .iter()
            .map(|entry| self.download(self.config.resolve(entry)));
        let assets = try_join_all(downloads).await?;

        let generation = &self.config.generation;
        let count = assets.len();
        for asset in assets {
            if let Err(e) = self.storage.put(generation, asset).await {
                warn!(error = %e, "Asset write failed; discarding partial generation");
                if let Err(cleanup) = self.storage.delete(generation).await {
                    warn!(error = %cleanup, "Failed to discard partial generation");
                }
                return Err(e.into());
            }
        }

        let mut state = self.lock_state();
        if *state == WorkerState::Idle {
            *state = WorkerState::Installed;
        }
        info!(count, "Asset cache installed");
        Ok(count)
    }

    /// Delete every cache other than the current generation. Returns the
    /// names removed.
    #[instrument(skip(self), fields(generation = %self.config.generation))]
    pub async fn activate(&self) -> Result<Vec<String>> {
        if self.state() == WorkerState::Idle {
            return Err(AssetError::NotInstalled);
        }

        let mut removed = Vec::new();
        for name in self.storage.keys().await? {
            if name != self.config.generation && self.storage.delete(&name).await? {
                removed.push(name);
            }
        }

        *self.lock_state() = WorkerState::Active;
        info!(removed = removed.len(), "Asset worker active");
        Ok(removed)
    }

    /// Intercept a request.
    pub async fn fetch(&self, method: HttpMethod, url: &str) -> Result<FetchOutcome> {
        if method != HttpMethod::Get
            || url.contains(&self.config.api_prefix)
            || self.state() != WorkerState::Active
        {
            return Ok(FetchOutcome::Passthrough);
        }

        let url = self.config.resolve(url);
        match self.storage.match_url(&url).await {
            Ok(Some(asset)) => {
                debug!(url = %url, "Served from asset cache");
                return Ok(FetchOutcome::Cached(asset));
            }
            Ok(None) => {}
            Err(e) => warn!(url = %url, error = %e, "Asset cache lookup failed"),
        }

        let response = self
            .http
            .execute(HttpRequest::new(HttpMethod::Get, url))
            .await
            .map_err(|e| AssetError::Network(e.to_string()))?;
        Ok(FetchOutcome::Network(response))
    }

    /// Show a system notification for a push message. `data` is the raw
    /// message body, absent when the push carried none.
    pub async fn on_push(&self, data: Option<&[u8]>) -> Result<NativeNotification> {
        let payload = match data {
            Some(bytes) => serde_json::from_slice::<PushPayload>(bytes)?,
            None => PushPayload::default(),
        };

        let notification = NativeNotification::new(payload.title, payload.message)
            .icon(PUSH_ICON)
            .badge(PUSH_BADGE)
            .vibrate(PUSH_VIBRATE.to_vec())
            .target_url(PUSH_TARGET);

        self.presenter
            .show(notification.clone())
            .await
            .map_err(|e| AssetError::Notification(e.to_string()))?;
        debug!(title = %notification.title, "Push notification shown");
        Ok(notification)
    }

    /// Dismiss the clicked notification and open its target.
    pub async fn on_notification_click(&self, notification: &NativeNotification) -> Result<()> {
        if let Err(e) = self.presenter.dismiss(&notification.title).await {
            warn!(error = %e, "Failed to dismiss notification");
        }

        let target = notification.target_url.as_deref().unwrap_or(PUSH_TARGET);
        self.presenter
            .open_window(&self.config.resolve(target))
            .await
            .map_err(|e| AssetError::Notification(e.to_string()))
    }

    async fn download(&self, url: String) -> Result<CachedAsset> {
        let response = self
            .http
            .execute(HttpRequest::new(HttpMethod::Get, url.clone()))
            .await
            .map_err(|e| AssetError::Unreachable {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        if !response.is_success() {
            return Err(AssetError::Unreachable {
                url,
                reason: format!("HTTP {}", response.status),
            });
        }

        let content_type = response
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.clone());

        let mut asset = CachedAsset::new(url, response.body);
        asset.status = response.status;
        asset.content_type = content_type;
        Ok(asset)
    }

    fn lock_state(&self) -> MutexGuard<'_, WorkerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
