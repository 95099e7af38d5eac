//! View registry
//!
//! Maps a view identifier to a [`ViewHandler`]. Switching views always tears
//! the current one down before the next is activated, so periodic work owned
//! by a view (chat polling, the notification timer) is cancelled first.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ClientError, Result};
use crate::poller::NotificationPoller;
use crate::task::RecurringTask;

/// Poll period of a chat-style view
pub const DEFAULT_VIEW_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[async_trait]
pub trait ViewHandler: Send + Sync {
    fn id(&self) -> &str;

    async fn activate(&self) -> Result<()>;

    /// Stop everything the view started. Must be idempotent.
    async fn teardown(&self);
}

#[derive(Default)]
pub struct ViewRegistry {
    handlers: HashMap<String, Arc<dyn ViewHandler>>,
    current: Option<Arc<dyn ViewHandler>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under its id, returning the one it replaces.
    pub fn register(&mut self, handler: Arc<dyn ViewHandler>) -> Option<Arc<dyn ViewHandler>> {
        self.handlers.insert(handler.id().to_string(), handler)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }

    /// Tear down the current view, then activate `id`.
    ///
    /// Switching to the active view re-activates it. If activation fails no
    /// view is current.
    pub async fn switch_to(&mut self, id: &str) -> Result<()> {
        let next = self
            .handlers
            .get(id)
            .cloned()
            .ok_or_else(|| ClientError::UnknownView(id.to_string()))?;

        if let Some(current) = self.current.take() {
            debug!(view = current.id(), "Tearing down view");
            current.teardown().await;
        }

        next.activate().await?;
        info!(view = id, "View activated");
        self.current = Some(next);
        Ok(())
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_ref().map(|view| view.id())
    }

    pub async fn deactivate(&mut self) {
        if let Some(current) = self.current.take() {
            current.teardown().await;
        }
    }
}

type PollFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// A view that runs a poll closure on a timer while it is active.
pub struct PollingView {
    id: String,
    period: Duration,
    poll: PollFn,
    task: Mutex<Option<RecurringTask>>,
}

impl PollingView {
    pub fn new<F, Fut>(id: impl Into<String>, period: Duration, poll: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            id: id.into(),
            period,
            poll: Arc::new(move || poll().boxed()),
            task: Mutex::new(None),
        }
    }

    pub fn is_polling(&self) -> bool {
        self.lock_task()
            .as_ref()
            .map_or(false, RecurringTask::is_running)
    }

    fn lock_task(&self) -> MutexGuard<'_, Option<RecurringTask>> {
        match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl ViewHandler for PollingView {
    fn id(&self) -> &str {
        &self.id
    }

    async fn activate(&self) -> Result<()> {
        let poll = Arc::clone(&self.poll);
        let task = RecurringTask::spawn(self.id.clone(), self.period, move || poll());
        if let Some(previous) = self.lock_task().replace(task) {
            previous.cancel();
        }
        Ok(())
    }

    async fn teardown(&self) {
        let task = self.lock_task().take();
        if let Some(task) = task {
            task.stop().await;
        }
    }
}

/// A view that owns the notification timer while it is active.
pub struct NotificationsView {
    id: String,
    poller: NotificationPoller,
}

impl NotificationsView {
    pub fn new(id: impl Into<String>, poller: NotificationPoller) -> Self {
        Self {
            id: id.into(),
            poller,
        }
    }
}

#[async_trait]
impl ViewHandler for NotificationsView {
    fn id(&self) -> &str {
        &self.id
    }

    async fn activate(&self) -> Result<()> {
        self.poller.start();
        Ok(())
    }

    async fn teardown(&self) {
        self.poller.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingView {
        id: String,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl ViewHandler for RecordingView {
        fn id(&self) -> &str {
            &self.id
        }

        async fn activate(&self) -> Result<()> {
            self.log.lock().unwrap().push(format!("activate {}", self.id));
            if self.fail {
                return Err(ClientError::InvalidResponse("view failed".to_string()));
            }
            Ok(())
        }

        async fn teardown(&self) {
            self.log.lock().unwrap().push(format!("teardown {}", self.id));
        }
    }

    fn view(id: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<RecordingView> {
        Arc::new(RecordingView {
            id: id.to_string(),
            log: log.clone(),
            fail: false,
        })
    }

    #[tokio::test]
    async fn test_switch_tears_down_before_activating() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ViewRegistry::new();
        registry.register(view("tasks", &log));
        registry.register(view("chat", &log));

        registry.switch_to("tasks").await.unwrap();
        registry.switch_to("chat").await.unwrap();
        registry.switch_to("chat").await.unwrap();

        assert_eq!(registry.current(), Some("chat"));
        assert_eq!(
            log.lock().unwrap().as_slice(),
            &[
                "activate tasks",
                "teardown tasks",
                "activate chat",
                "teardown chat",
                "activate chat"
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_view_keeps_current() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ViewRegistry::new();
        registry.register(view("tasks", &log));
        registry.switch_to("tasks").await.unwrap();

        let err = registry.switch_to("kanban").await.unwrap_err();
        assert!(matches!(err, ClientError::UnknownView(id) if id == "kanban"));
        assert_eq!(registry.current(), Some("tasks"));
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_activation_leaves_no_current_view() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ViewRegistry::new();
        registry.register(view("tasks", &log));
        registry.register(Arc::new(RecordingView {
            id: "journal".to_string(),
            log: log.clone(),
            fail: true,
        }));

        registry.switch_to("tasks").await.unwrap();
        assert!(registry.switch_to("journal").await.is_err());
        assert_eq!(registry.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_view_stops_on_switch() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let chat = Arc::new(PollingView::new("chat", DEFAULT_VIEW_POLL_INTERVAL, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut registry = ViewRegistry::new();
        registry.register(chat.clone());
        registry.register(view("tasks", &log));

        registry.switch_to("chat").await.unwrap();
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert!(chat.is_polling());
        assert_eq!(polls.load(Ordering::SeqCst), 3);

        registry.switch_to("tasks").await.unwrap();
        assert!(!chat.is_polling());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }
}
