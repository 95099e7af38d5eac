//! # Request Dispatcher
//!
//! [`ApiClient`] is the only way the client talks to the API. For every call
//! it:
//!
//! 1. queues write actions (anything but `GET`) for the native bridge
//! 2. attaches `Content-Type: application/json` and the bearer token, if any
//! 3. fails fast with [`ClientError::Connectivity`] when the device is known
//!    to be offline
//! 4. decodes the body as JSON, falling back to the raw text
//! 5. maps 401 to [`ClientError::Unauthorized`] and other non-2xx statuses to
//!    [`ClientError::Http`], preferring the server's `detail` message
//! 6. caches successful reads under their exact path
//!
//! A failed read is answered from the [`OfflineCache`] when an entry exists
//! and the failure is recoverable. Writes are never answered from the cache.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_client::ApiClient;
//! use core_runtime::events::EventBus;
//!
//! # async fn example(config: core_runtime::config::ClientConfig) -> core_client::Result<()> {
//! let api = ApiClient::from_config(&config, EventBus::default());
//! api.login("ada", "hunter2").await?;
//!
//! let tasks = api.get("/tasks").await?;
//! api.put("/tasks/7", &serde_json::json!({"done": true})).await?;
//! # Ok(())
//! # }
//! ```

use bridge_traits::http::{HttpMethod, HttpRequest, HttpResponse, MultipartFile};
use bytes::Bytes;
use core_auth::{Credentials, TokenStore};
use core_runtime::config::ClientConfig;
use core_runtime::events::{ClientEvent, EventBus, Notice, RequestEvent};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::bridge::BridgeAdapter;
use crate::cache::OfflineCache;
use crate::error::{ClientError, RequestOrigin, Result, UNAUTHORIZED_MESSAGE};

/// Multipart form field carrying an uploaded file.
pub const UPLOAD_FIELD: &str = "file";

/// A file to upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// The `data` member of a `{status, data, detail}` envelope, or the payload
/// itself when it is not enveloped.
pub fn payload_data(payload: &Value) -> &Value {
    match payload {
        Value::Object(map) if map.contains_key("status") && map.contains_key("data") => {
            &map["data"]
        }
        other => other,
    }
}

#[derive(Clone)]
pub struct ApiClient {
    config: ClientConfig,
    tokens: TokenStore,
    cache: OfflineCache,
    bridge: BridgeAdapter,
    events: EventBus,
}

impl ApiClient {
    pub fn new(
        config: &ClientConfig,
        tokens: TokenStore,
        cache: OfflineCache,
        bridge: BridgeAdapter,
        events: EventBus,
    ) -> Self {
        Self {
            config: config.clone(),
            tokens,
            cache,
            bridge,
            events,
        }
    }

    /// Wire the token store, cache and bridge adapter from `config`.
    pub fn from_config(config: &ClientConfig, events: EventBus) -> Self {
        let bridge = BridgeAdapter::new(
            config.native_bridge.clone(),
            config.bridge_retry.clone(),
            Arc::clone(&config.clock),
            events.clone(),
        );

        let mut tokens =
            TokenStore::new(Arc::clone(&config.settings_store)).with_events(events.clone());
        if bridge.is_present() {
            tokens = tokens.with_mirror(Arc::new(bridge.clone()));
        }

        let cache = OfflineCache::new(
            Arc::clone(&config.settings_store),
            Arc::clone(&config.clock),
        );

        Self::new(config, tokens, cache, bridge, events)
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn cache(&self) -> &OfflineCache {
        &self.cache
    }

    pub fn bridge(&self) -> &BridgeAdapter {
        &self.bridge
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Issue a user-initiated request.
    pub async fn request(&self, method: HttpMethod, path: &str, body: Option<&Value>) -> Result<Value> {
        self.request_with(RequestOrigin::Interactive, method, path, body)
            .await
    }

    #[instrument(skip(self, body))]
    pub async fn request_with(
        &self,
        origin: RequestOrigin,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        if !method.is_read() {
            self.bridge.log_action(method, path, body);
        }

        match self.send(method, path, body).await {
            Ok(payload) => {
                if method.is_read() {
                    self.cache.put(path, &payload).await;
                }
                Ok(payload)
            }
            Err(error) => {
                if method.is_read() && error.is_recoverable_from_cache() {
                    if let Some(cached) = self.cached(path).await {
                        warn!(path, error = %error, "Serving cached data after failed read");
                        self.events
                            .emit(ClientEvent::Request(RequestEvent::ServedFromCache {
                                path: path.to_string(),
                                reason: error.to_string(),
                            }))
                            .ok();
                        return Ok(cached);
                    }
                }

                debug!(path, error = %error, "Request failed");
                if let Some(message) = error.user_notice(origin) {
                    self.notify(Notice::error(message));
                }
                Err(error)
            }
        }
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        self.request(HttpMethod::Get, path, None).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        let body = serde_json::to_value(body)?;
        self.request(HttpMethod::Post, path, Some(&body)).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        let body = serde_json::to_value(body)?;
        self.request(HttpMethod::Put, path, Some(&body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.request(HttpMethod::Delete, path, None).await
    }

    /// `GET` and decode the payload into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let payload = self.get(path).await?;
        Ok(serde_json::from_value(payload)?)
    }

    /// Upload `file` as the single multipart field `file`.
    ///
    /// Uploads are never journaled and never answered from the cache.
    #[instrument(skip(self, file), fields(file_name = %file.file_name, size = file.data.len()))]
    pub async fn upload(&self, path: &str, file: UploadFile) -> Result<Value> {
        match self.send_upload(path, file).await {
            Ok(payload) => Ok(payload),
            Err(error) => {
                warn!(path, error = %error, "Upload failed");
                self.notify(Notice::error(error.to_string()));
                Err(error)
            }
        }
    }

    /// Sign in and persist the issued credentials.
    pub async fn login(&self, username: &str, password: &str) -> Result<Credentials> {
        let response = self
            .post("/auth/login", &json!({"username": username, "password": password}))
            .await?;
        let credentials = Credentials::from_login_response(&response)?;

        self.tokens.store_session(&credentials).await?;
        self.notify(Notice::success("Login successful"));
        Ok(credentials)
    }

    /// Create the first account and persist the issued credentials.
    pub async fn setup(&self, username: &str, password: &str) -> Result<Credentials> {
        let response = self
            .post("/auth/setup", &json!({"username": username, "password": password}))
            .await?;
        let credentials = Credentials::from_setup_response(&response)?;

        self.tokens.store_session(&credentials).await?;
        self.notify(Notice::success("Account created successfully"));
        Ok(credentials)
    }

    pub async fn logout(&self) -> Result<()> {
        self.tokens.logout().await?;
        info!("Logged out");
        Ok(())
    }

    async fn send(&self, method: HttpMethod, path: &str, body: Option<&Value>) -> Result<Value> {
        let mut request = HttpRequest::new(method, self.config.url_for(path))
            .header("Content-Type", "application/json")
            .timeout(self.config.request_timeout);

        if let Some(token) = self.tokens.get_token().await {
            request = request.bearer_token(token);
        }

        if let Some(body) = body.filter(|b| !method.is_read() && !b.is_null()) {
            request = request.body(Bytes::from(serde_json::to_vec(body)?));
        }

        self.ensure_online().await?;

        let http = &self.config.http_client;
        let response = if method.is_read() {
            http.execute_with_retry(request, self.config.read_retry.clone())
                .await
        } else {
            http.execute(request).await
        }
        .map_err(|e| ClientError::Transport(e.to_string()))?;

        debug!(path, status = response.status, "Response received");
        decode_response(&response)
    }

    async fn send_upload(&self, path: &str, file: UploadFile) -> Result<Value> {
        let mut part = MultipartFile::new(UPLOAD_FIELD, file.file_name, file.data);
        if let Some(content_type) = file.content_type {
            part = part.content_type(content_type);
        }

        let mut request = HttpRequest::new(HttpMethod::Post, self.config.url_for(path))
            .multipart(part)
            .timeout(self.config.request_timeout);
        if let Some(token) = self.tokens.get_token().await {
            request = request.bearer_token(token);
        }

        self.ensure_online().await?;

        let response = self
            .config
            .http_client
            .execute(request)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let payload = parse_body(&response.body);

        if !response.is_success() {
            return Err(ClientError::Upload {
                status: response.status,
                message: detail_message(&payload).unwrap_or_else(|| "Upload failed".to_string()),
            });
        }
        Ok(payload)
    }

    async fn ensure_online(&self) -> Result<()> {
        match &self.config.network_monitor {
            Some(network) if network.is_known_offline().await => Err(ClientError::Connectivity),
            _ => Ok(()),
        }
    }

    async fn cached(&self, path: &str) -> Option<Value> {
        match self.config.offline_cache_max_age {
            Some(max_age) => {
                self.cache
                    .get_fresh(path, max_age, self.config.clock.now())
                    .await
            }
            None => self.cache.get(path).await,
        }
    }

    fn notify(&self, notice: Notice) {
        self.events.emit(ClientEvent::Notice(notice)).ok();
    }
}

/// Decode a response body: `null` when empty, JSON when parseable, the raw
/// text otherwise.
fn parse_body(body: &Bytes) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

fn detail_message(payload: &Value) -> Option<String> {
    match payload.get("detail")? {
        Value::Null => None,
        Value::String(detail) if detail.is_empty() => None,
        Value::String(detail) => Some(detail.clone()),
        other => Some(other.to_string()),
    }
}

fn decode_response(response: &HttpResponse) -> Result<Value> {
    let payload = parse_body(&response.body);

    if response.status == 401 {
        return Err(ClientError::Unauthorized {
            message: detail_message(&payload).unwrap_or_else(|| UNAUTHORIZED_MESSAGE.to_string()),
        });
    }

    if !response.is_success() {
        let message = detail_message(&payload).unwrap_or_else(|| match &response.reason {
            Some(reason) => format!("Error {}: {}", response.status, reason),
            None => format!("Error {}", response.status),
        });
        return Err(ClientError::Http {
            status: response.status,
            message,
        });
    }

    Ok(payload)
}
