//! Native Bridge Adapter
//!
//! Optional host capability used to mirror the bearer token and to journal
//! write actions for later replay. Presence is resolved once, when the
//! adapter is built.
//!
//! Journaling never runs on the request path. [`BridgeAdapter::log_action`]
//! enqueues a [`PendingAction`] on an unbounded channel; a background worker
//! hands each action to the bridge with bounded exponential retry and reports
//! the outcome as a [`BridgeEvent`]. No bridge failure is ever returned to a
//! caller.
//!
//! Credential fields (`password`, `token`, ...) are redacted from journaled
//! bodies; the shell persists them unencrypted.

use async_trait::async_trait;
use bridge_traits::{http::HttpMethod, native::NativeBridge, time::Clock, RetryPolicy};
use chrono::{DateTime, Utc};
use core_auth::TokenMirror;
use core_runtime::events::{BridgeEvent, ClientEvent, EventBus};
use core_runtime::logging::redact_if_sensitive;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// A write action handed to the bridge for replay.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    pub id: String,
    pub method: HttpMethod,
    pub path: String,
    /// JSON-serialised request body, `null` when there is none
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Counters of the action queue since the adapter was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub queued: u64,
    pub delivered: u64,
    pub dropped: u64,
}

enum Job {
    Deliver(PendingAction),
    Flush(oneshot::Sender<()>),
}

struct Delivery {
    bridge: Arc<dyn NativeBridge>,
    retry: RetryPolicy,
    events: EventBus,
    queued: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl Delivery {
    async fn run(self: Arc<Self>, mut jobs: mpsc::UnboundedReceiver<Job>) {
        debug!("Bridge action worker started");
        while let Some(job) = jobs.recv().await {
            match job {
                Job::Deliver(action) => self.deliver(action).await,
                Job::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("Bridge action worker stopped");
    }

    async fn deliver(&self, action: PendingAction) {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = self
                .bridge
                .log_offline_action(action.method.as_str(), &action.path, &action.body)
                .await;

            match result {
                Ok(()) => {
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                    debug!(id = %action.id, method = %action.method, path = %action.path, attempt, "Action journaled");
                    self.emit(BridgeEvent::ActionDelivered {
                        action_id: action.id,
                        method: action.method.to_string(),
                        path: action.path,
                        attempts: attempt,
                    });
                    return;
                }
                Err(e) if attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(id = %action.id, attempt, error = %e, ?delay, "Bridge rejected action; retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    error!(
                        id = %action.id,
                        method = %action.method,
                        path = %action.path,
                        attempts = attempt,
                        error = %e,
                        "Dropping action after exhausting retries"
                    );
                    self.emit(BridgeEvent::ActionDropped {
                        action_id: action.id,
                        method: action.method.to_string(),
                        path: action.path,
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                    return;
                }
            }
        }
    }

    fn emit(&self, event: BridgeEvent) {
        self.events.emit(ClientEvent::Bridge(event)).ok();
    }
}

struct Inner {
    delivery: Arc<Delivery>,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
}

impl Inner {
    /// Sender of the running worker, spawning it on first use.
    fn sender(&self) -> Option<mpsc::UnboundedSender<Job>> {
        let mut slot = match self.sender.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(sender) = slot.as_ref().filter(|s| !s.is_closed()) {
            return Some(sender.clone());
        }

        let handle = Handle::try_current().ok()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        handle.spawn(Arc::clone(&self.delivery).run(receiver));
        *slot = Some(sender.clone());
        Some(sender)
    }
}

#[derive(Clone)]
pub struct BridgeAdapter {
    inner: Option<Arc<Inner>>,
    clock: Option<Arc<dyn Clock>>,
}

impl BridgeAdapter {
    /// Adapter over `bridge`; `None` yields an adapter whose operations are
    /// all no-ops.
    pub fn new(
        bridge: Option<Arc<dyn NativeBridge>>,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Self {
        let inner = bridge.map(|bridge| {
            Arc::new(Inner {
                delivery: Arc::new(Delivery {
                    bridge,
                    retry,
                    events,
                    queued: AtomicU64::new(0),
                    delivered: AtomicU64::new(0),
                    dropped: AtomicU64::new(0),
                }),
                sender: Mutex::new(None),
            })
        });
        Self {
            inner,
            clock: Some(clock),
        }
    }

    pub fn absent() -> Self {
        Self {
            inner: None,
            clock: None,
        }
    }

    pub fn is_present(&self) -> bool {
        self.inner.is_some()
    }

    /// Queue a write action for the bridge. Returns the queued action, or
    /// `None` when no bridge is present or the action could not be queued.
    pub fn log_action(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
    ) -> Option<PendingAction> {
        let inner = self.inner.as_ref()?;
        let created_at = self.clock.as_ref().map_or_else(Utc::now, |c| c.now());

        let action = PendingAction {
            id: Uuid::new_v4().to_string(),
            method,
            path: path.to_string(),
            body: body.map_or_else(|| Value::Null.to_string(), |b| redact_body(b).to_string()),
            created_at,
        };

        let Some(sender) = inner.sender() else {
            inner.delivery.dropped.fetch_add(1, Ordering::Relaxed);
            error!(method = %method, path, "No async runtime for bridge worker; action dropped");
            return None;
        };

        inner.delivery.queued.fetch_add(1, Ordering::Relaxed);
        if sender.send(Job::Deliver(action.clone())).is_err() {
            inner.delivery.dropped.fetch_add(1, Ordering::Relaxed);
            error!(method = %method, path, "Bridge worker stopped; action dropped");
            return None;
        }
        Some(action)
    }

    /// Wait until every action queued before this call was delivered or
    /// dropped.
    pub async fn flush(&self) {
        let Some(inner) = self.inner.as_ref() else {
            return;
        };
        let Some(sender) = inner.sender() else {
            return;
        };
        let (done, wait) = oneshot::channel();
        if sender.send(Job::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    pub fn delivery_stats(&self) -> DeliveryStats {
        match &self.inner {
            Some(inner) => DeliveryStats {
                queued: inner.delivery.queued.load(Ordering::Relaxed),
                delivered: inner.delivery.delivered.load(Ordering::Relaxed),
                dropped: inner.delivery.dropped.load(Ordering::Relaxed),
            },
            None => DeliveryStats::default(),
        }
    }

    fn bridge(&self) -> Option<&Arc<dyn NativeBridge>> {
        self.inner.as_ref().map(|inner| &inner.delivery.bridge)
    }
}

/// Copy of `value` with every sensitive string field replaced.
fn redact_body(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, field)| {
                    let field = match field {
                        Value::String(s) => Value::String(redact_if_sensitive(key, s)),
                        other => redact_body(other),
                    };
                    (key.clone(), field)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_body).collect()),
        other => other.clone(),
    }
}

#[async_trait]
impl TokenMirror for BridgeAdapter {
    async fn save_token(&self, token: &str) {
        if let Some(bridge) = self.bridge() {
            if let Err(e) = bridge.save_auth_token(token).await {
                warn!(error = %e, "Failed to mirror token to native bridge");
            }
        }
    }

    async fn load_token(&self) -> Option<String> {
        let bridge = self.bridge()?;
        match bridge.get_auth_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read token from native bridge");
                None
            }
        }
    }

    async fn clear_token(&self) {
        if let Some(bridge) = self.bridge() {
            if let Err(e) = bridge.clear_auth_token().await {
                warn!(error = %e, "Failed to clear token on native bridge");
            }
        }
    }
}
