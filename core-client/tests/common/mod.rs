//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkType};
use bridge_traits::notification::{
    NativeNotification, NotificationPermission, NotificationPresenter,
};
use bridge_traits::storage::SettingsStore;
use core_client::ApiClient;
use core_runtime::config::{ClientConfig, ClientConfigBuilder};
use core_runtime::events::EventBus;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const BASE_URL: &str = "https://jexi.test/api/v1";

#[derive(Default)]
pub struct MemorySettings {
    pub strings: Mutex<HashMap<String, String>>,
    pub bools: Mutex<HashMap<String, bool>>,
}

impl MemorySettings {
    pub fn raw(&self, key: &str) -> Option<String> {
        self.strings.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.strings
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.raw(key))
    }

    async fn set_bool(&self, key: &str, value: bool) -> BridgeResult<()> {
        self.bools.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn get_bool(&self, key: &str) -> BridgeResult<Option<bool>> {
        Ok(self.bools.lock().unwrap().get(key).copied())
    }

    async fn set_i64(&self, _key: &str, _value: i64) -> BridgeResult<()> {
        Ok(())
    }

    async fn get_i64(&self, _key: &str) -> BridgeResult<Option<i64>> {
        Ok(None)
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.strings.lock().unwrap().remove(key);
        self.bools.lock().unwrap().remove(key);
        Ok(())
    }

    async fn has_key(&self, key: &str) -> BridgeResult<bool> {
        Ok(self.strings.lock().unwrap().contains_key(key))
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.strings.lock().unwrap().keys().cloned().collect())
    }

    async fn clear_all(&self) -> BridgeResult<()> {
        self.strings.lock().unwrap().clear();
        self.bools.lock().unwrap().clear();
        Ok(())
    }
}

/// Scripted HTTP server. Unscripted routes answer 404.
#[derive(Default)]
pub struct FakeHttp {
    routes: Mutex<HashMap<(HttpMethod, String), HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
    down: AtomicBool,
}

impl FakeHttp {
    pub fn respond(&self, method: HttpMethod, path: &str, status: u16, body: &Value) {
        self.respond_raw(method, path, HttpResponse::new(status, body.to_string()));
    }

    pub fn respond_raw(&self, method: HttpMethod, path: &str, response: HttpResponse) {
        self.routes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), response);
    }

    /// Fail every request at the transport level.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: HttpMethod, path: &str) -> Vec<HttpRequest> {
        let url = format!("{}{}", BASE_URL, path);
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.url == url)
            .collect()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());

        if self.down.load(Ordering::SeqCst) {
            return Err(BridgeError::Network("connection refused".to_string()));
        }

        let path = request
            .url
            .strip_prefix(BASE_URL)
            .unwrap_or(&request.url)
            .to_string();
        let response = self
            .routes
            .lock()
            .unwrap()
            .get(&(request.method, path))
            .cloned();

        Ok(response.unwrap_or_else(|| {
            HttpResponse::new(404, r#"{"detail":"Not Found"}"#).with_reason("Not Found")
        }))
    }
}

#[derive(Default)]
pub struct FakeNetwork {
    offline: AtomicBool,
}

impl FakeNetwork {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl NetworkMonitor for FakeNetwork {
    async fn get_network_info(&self) -> BridgeResult<NetworkInfo> {
        if self.offline.load(Ordering::SeqCst) {
            Ok(NetworkInfo::disconnected())
        } else {
            Ok(NetworkInfo::connected(NetworkType::WiFi))
        }
    }

    async fn subscribe_changes(&self) -> BridgeResult<Box<dyn NetworkChangeStream>> {
        Err(BridgeError::NotAvailable("network changes".to_string()))
    }
}

pub struct FakePresenter {
    pub permission: Mutex<NotificationPermission>,
    /// Decision applied when permission is requested
    pub decision: NotificationPermission,
    pub permission_requests: AtomicUsize,
    pub shown: Mutex<Vec<NativeNotification>>,
    pub opened: Mutex<Vec<String>>,
}

impl FakePresenter {
    pub fn with_permission(permission: NotificationPermission) -> Self {
        Self {
            permission: Mutex::new(permission),
            decision: NotificationPermission::Granted,
            permission_requests: AtomicUsize::new(0),
            shown: Mutex::new(Vec::new()),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn deciding(mut self, decision: NotificationPermission) -> Self {
        self.decision = decision;
        self
    }

    pub fn shown(&self) -> Vec<NativeNotification> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationPresenter for FakePresenter {
    async fn permission(&self) -> NotificationPermission {
        *self.permission.lock().unwrap()
    }

    async fn request_permission(&self) -> BridgeResult<NotificationPermission> {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        *self.permission.lock().unwrap() = self.decision;
        Ok(self.decision)
    }

    async fn show(&self, notification: NativeNotification) -> BridgeResult<()> {
        self.shown.lock().unwrap().push(notification);
        Ok(())
    }

    async fn dismiss(&self, title: &str) -> BridgeResult<()> {
        self.shown.lock().unwrap().retain(|n| n.title != title);
        Ok(())
    }

    async fn open_window(&self, url: &str) -> BridgeResult<()> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// Everything a test needs to drive an [`ApiClient`].
pub struct Harness {
    pub http: Arc<FakeHttp>,
    pub settings: Arc<MemorySettings>,
    pub network: Arc<FakeNetwork>,
    pub events: EventBus,
    pub api: ApiClient,
}

pub fn builder(http: &Arc<FakeHttp>, settings: &Arc<MemorySettings>) -> ClientConfigBuilder {
    ClientConfig::builder()
        .base_url(BASE_URL)
        .http_client(http.clone())
        .settings_store(settings.clone())
}

pub fn harness() -> Harness {
    harness_with(|builder| builder)
}

pub fn harness_with(configure: impl FnOnce(ClientConfigBuilder) -> ClientConfigBuilder) -> Harness {
    let http = Arc::new(FakeHttp::default());
    let settings = Arc::new(MemorySettings::default());
    let network = Arc::new(FakeNetwork::default());

    let config = configure(builder(&http, &settings).network_monitor(network.clone()))
        .build()
        .expect("valid test config");
    let events = EventBus::new(64);
    let api = ApiClient::from_config(&config, events.clone());

    Harness {
        http,
        settings,
        network,
        events,
        api,
    }
}
