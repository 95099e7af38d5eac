//! System Notification Abstraction
//!
//! Surfaces OS-level notifications and the permission prompt guarding them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Permission state for system notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationPermission {
    /// The user has not decided yet
    Default,
    Granted,
    Denied,
}

/// A notification to display through the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeNotification {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
    /// Vibration pattern in milliseconds (on, off, on, ...)
    pub vibrate: Vec<u32>,
    /// Location opened when the notification is activated
    pub target_url: Option<String>,
}

impl NativeNotification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            icon: None,
            badge: None,
            vibrate: Vec::new(),
            target_url: None,
        }
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn badge(mut self, badge: impl Into<String>) -> Self {
        self.badge = Some(badge.into());
        self
    }

    pub fn vibrate(mut self, pattern: Vec<u32>) -> Self {
        self.vibrate = pattern;
        self
    }

    pub fn target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = Some(url.into());
        self
    }
}

/// Host notification surface
///
/// - **Desktop**: OS notification center
/// - **Android**: NotificationManager
/// - **Web**: Notification API / `registration.showNotification`
#[async_trait]
pub trait NotificationPresenter: Send + Sync {
    /// Current permission state
    async fn permission(&self) -> NotificationPermission;

    /// Prompt the user for permission and return the decision
    async fn request_permission(&self) -> Result<NotificationPermission>;

    /// Display a notification
    async fn show(&self, notification: NativeNotification) -> Result<()>;

    /// Dismiss a displayed notification, identified by its title
    async fn dismiss(&self, title: &str) -> Result<()> {
        let _ = title;
        Ok(())
    }

    /// Open (or focus) an application window at `url`
    async fn open_window(&self, url: &str) -> Result<()>;
}
