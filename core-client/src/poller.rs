//! # Notification Poller
//!
//! Polls the unread notification set every `poll_interval` (five minutes by
//! default) plus once when started. Each run:
//!
//! 1. skips entirely when nobody is signed in
//! 2. asks the server to generate due alerts (`GET /notifications/generate`)
//! 3. fetches the unread set (`GET /notifications?unread_only=true`)
//! 4. raises one native notification when the newest id differs from the
//!    last one surfaced, and remembers it under `last_notif_id`
//! 5. publishes the badge text and the first ten items as
//!    [`NotificationEvent::UnreadChanged`]
//!
//! Runs are serialized, so two overlapping triggers (timer and a manual
//! refresh) can never surface the same notification twice. At most one timer
//! is armed per poller: [`NotificationPoller::start`] cancels the previous
//! one first.

use bridge_traits::{
    http::HttpMethod,
    notification::{NativeNotification, NotificationPermission, NotificationPresenter},
    storage::SettingsStore,
};
use core_runtime::events::{ClientEvent, EventBus, NotificationEvent, NotificationItem};
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::dispatcher::{payload_data, ApiClient};
use crate::error::{ClientError, RequestOrigin, Result};
use crate::task::RecurringTask;

/// Persisted id of the newest notification already surfaced natively
pub const LAST_SEEN_KEY: &str = "last_notif_id";

pub const NOTIFICATION_ICON: &str =
    "https://ui-avatars.com/api/?name=JEXI&background=8B5CF6&color=fff";

const GENERATE_PATH: &str = "/notifications/generate";
const UNREAD_PATH: &str = "/notifications?unread_only=true";
const MAX_LISTED: usize = 10;

/// A notification as returned by the API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotificationRecord {
    pub id: Value,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl NotificationRecord {
    pub fn id_string(&self) -> String {
        match &self.id {
            Value::String(id) => id.clone(),
            other => other.to_string(),
        }
    }

    fn to_item(&self) -> NotificationItem {
        NotificationItem {
            id: self.id_string(),
            icon: icon_for(self.kind.as_deref()).to_string(),
            title: self.title.clone().unwrap_or_default(),
            message: self.message.clone().unwrap_or_default(),
            created_at: self.created_at.clone(),
        }
    }
}

/// Outcome of one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Nobody was signed in; nothing was fetched
    pub skipped: bool,
    pub unread: usize,
    /// Id of the notification raised natively in this run
    pub native_shown: Option<String>,
}

/// Badge text for `count` unread items; hidden at zero.
pub fn badge_text(count: usize) -> Option<String> {
    match count {
        0 => None,
        1..=9 => Some(count.to_string()),
        _ => Some("9+".to_string()),
    }
}

pub fn icon_for(kind: Option<&str>) -> &'static str {
    match kind {
        Some("reminder") => "⏰",
        Some("warning") => "⚠️",
        Some("streak") => "🔥",
        Some("celebration") => "🎉",
        Some("insight") => "💡",
        _ => "📌",
    }
}

struct PollerInner {
    api: ApiClient,
    settings: Arc<dyn SettingsStore>,
    presenter: Option<Arc<dyn NotificationPresenter>>,
    events: EventBus,
    permission_requested: AtomicBool,
    run_lock: AsyncMutex<()>,
}

impl PollerInner {
    async fn run(&self) -> Result<PollReport> {
        let _serialized = self.run_lock.lock().await;

        if !self.api.tokens().is_logged_in().await {
            debug!("Not signed in; skipping notification poll");
            return Ok(PollReport {
                skipped: true,
                ..PollReport::default()
            });
        }

        self.api
            .request_with(RequestOrigin::Background, HttpMethod::Get, GENERATE_PATH, None)
            .await?;
        let payload = self
            .api
            .request_with(RequestOrigin::Background, HttpMethod::Get, UNREAD_PATH, None)
            .await?;
        let unread = parse_unread(&payload)?;

        let mut report = PollReport {
            unread: unread.len(),
            ..PollReport::default()
        };

        if let Some(latest) = unread.first() {
            let latest_id = latest.id.clone();
            if self.last_seen().await.as_ref() != Some(&latest_id) {
                if self.show_native(latest).await {
                    report.native_shown = Some(latest.id_string());
                }
                self.remember(&latest_id).await;
            }
        }

        self.events
            .emit(ClientEvent::Notifications(NotificationEvent::UnreadChanged {
                count: unread.len(),
                badge: badge_text(unread.len()),
                items: unread.iter().take(MAX_LISTED).map(|n| n.to_item()).collect(),
            }))
            .ok();

        Ok(report)
    }

    async fn last_seen(&self) -> Option<Value> {
        match self.settings.get_string(LAST_SEEN_KEY).await {
            Ok(Some(raw)) => {
                Some(serde_json::from_str(&raw).unwrap_or_else(|_| Value::String(raw)))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read last seen notification");
                None
            }
        }
    }

    async fn remember(&self, id: &Value) {
        if let Err(e) = self.settings.set_string(LAST_SEEN_KEY, &id.to_string()).await {
            warn!(error = %e, "Failed to persist last seen notification");
        }
    }

    /// Raise `record` natively. Returns whether it was shown.
    async fn show_native(&self, record: &NotificationRecord) -> bool {
        let Some(presenter) = &self.presenter else {
            return false;
        };

        if !self.permission_requested.swap(true, Ordering::SeqCst)
            && presenter.permission().await == NotificationPermission::Default
        {
            match presenter.request_permission().await {
                Ok(decided) => debug!(?decided, "Notification permission decided"),
                Err(e) => warn!(error = %e, "Notification permission request failed"),
            }
        }

        if presenter.permission().await != NotificationPermission::Granted {
            debug!("Notification permission not granted; skipping native alert");
            return false;
        }

        let notification = NativeNotification::new(
            record.title.clone().unwrap_or_default(),
            record.message.clone().unwrap_or_default(),
        )
        .icon(NOTIFICATION_ICON);

        match presenter.show(notification).await {
            Ok(()) => {
                let id = record.id_string();
                info!(id = %id, "Native notification shown");
                self.events
                    .emit(ClientEvent::Notifications(NotificationEvent::NativeShown { id }))
                    .ok();
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to show native notification");
                false
            }
        }
    }
}

fn parse_unread(payload: &Value) -> Result<Vec<NotificationRecord>> {
    match payload_data(payload) {
        Value::Null => Ok(Vec::new()),
        data => serde_json::from_value(data.clone()).map_err(|e| {
            ClientError::InvalidResponse(format!("unread notifications: {}", e))
        }),
    }
}

#[derive(Clone)]
pub struct NotificationPoller {
    inner: Arc<PollerInner>,
    period: Duration,
    timer: Arc<std::sync::Mutex<Option<RecurringTask>>>,
}

impl NotificationPoller {
    pub fn new(
        api: ApiClient,
        presenter: Option<Arc<dyn NotificationPresenter>>,
        period: Duration,
    ) -> Self {
        let settings = Arc::clone(&api.config().settings_store);
        let events = api.events().clone();
        Self {
            inner: Arc::new(PollerInner {
                api,
                settings,
                presenter,
                events,
                permission_requested: AtomicBool::new(false),
                run_lock: AsyncMutex::new(()),
            }),
            period,
            timer: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    /// Poller using the presenter and interval configured on `api`.
    pub fn from_api(api: ApiClient) -> Self {
        let presenter = api.config().notification_presenter.clone();
        let period = api.config().poll_interval;
        Self::new(api, presenter, period)
    }

    /// Arm the timer, replacing any running one. The first run is immediate.
    pub fn start(&self) {
        let inner = Arc::clone(&self.inner);
        let task = RecurringTask::spawn("notification-poller", self.period, move || {
            let inner = Arc::clone(&inner);
            async move {
                if let Err(e) = inner.run().await {
                    warn!(error = %e, "Notification poll failed");
                }
            }
        });

        let previous = self.lock_timer().replace(task);
        if let Some(previous) = previous {
            debug!("Replacing running notification timer");
            previous.cancel();
        }
    }

    pub fn stop(&self) {
        if let Some(task) = self.lock_timer().take() {
            task.cancel();
            debug!("Notification timer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_timer()
            .as_ref()
            .map_or(false, RecurringTask::is_running)
    }

    pub async fn run_once(&self) -> Result<PollReport> {
        self.inner.run().await
    }

    /// Poll immediately, e.g. when the notification list is opened.
    pub async fn refresh_now(&self) {
        if let Err(e) = self.inner.run().await {
            warn!(error = %e, "Notification refresh failed");
        }
    }

    /// Mark `id` as read, then poll again.
    pub async fn mark_read(&self, id: &str) -> Result<PollReport> {
        self.inner
            .api
            .request(HttpMethod::Put, &format!("/notifications/{}/read", id), None)
            .await?;
        self.run_once().await
    }

    fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<RecurringTask>> {
        match self.timer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_badge_text() {
        assert_eq!(badge_text(0), None);
        assert_eq!(badge_text(1), Some("1".to_string()));
        assert_eq!(badge_text(9), Some("9".to_string()));
        assert_eq!(badge_text(10), Some("9+".to_string()));
    }

    #[test]
    fn test_icon_for_kind() {
        assert_eq!(icon_for(Some("streak")), "🔥");
        assert_eq!(icon_for(Some("insight")), "💡");
        assert_eq!(icon_for(Some("birthday")), "📌");
        assert_eq!(icon_for(None), "📌");
    }

    #[test]
    fn test_parse_unread_tolerates_envelope_and_null() {
        let bare = json!([{"id": 42, "title": "Standup", "message": "in 5", "type": "reminder"}]);
        let records = parse_unread(&bare).unwrap();
        assert_eq!(records[0].id_string(), "42");
        assert_eq!(records[0].kind.as_deref(), Some("reminder"));

        let enveloped = json!({"status": "success", "data": [{"id": "n-1", "title": null}]});
        let records = parse_unread(&enveloped).unwrap();
        assert_eq!(records[0].id_string(), "n-1");
        assert_eq!(records[0].to_item().title, "");

        assert!(parse_unread(&Value::Null).unwrap().is_empty());
        assert!(matches!(
            parse_unread(&json!("oops")),
            Err(ClientError::InvalidResponse(_))
        ));
    }
}
