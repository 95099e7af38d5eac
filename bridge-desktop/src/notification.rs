//! Notification presenter for desktop
//!
//! There is no portable notification center to target without pulling in a
//! platform toolkit, so this presenter writes notifications to the log and
//! keeps a record of what is currently on screen. Shells with a real
//! notification surface inject their own [`NotificationPresenter`].

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    notification::{NativeNotification, NotificationPermission, NotificationPresenter},
};
use std::sync::Mutex;
use tracing::info;

pub struct DesktopNotificationPresenter {
    permission: Mutex<NotificationPermission>,
    visible: Mutex<Vec<NativeNotification>>,
}

impl DesktopNotificationPresenter {
    pub fn new() -> Self {
        Self {
            permission: Mutex::new(NotificationPermission::Default),
            visible: Mutex::new(Vec::new()),
        }
    }

    /// Notifications shown and not yet dismissed.
    pub fn visible(&self) -> Vec<NativeNotification> {
        match self.visible.lock() {
            Ok(visible) => visible.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Default for DesktopNotificationPresenter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationPresenter for DesktopNotificationPresenter {
    async fn permission(&self) -> NotificationPermission {
        match self.permission.lock() {
            Ok(permission) => *permission,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    async fn request_permission(&self) -> Result<NotificationPermission> {
        // Desktop shows no prompt; an undecided permission becomes granted.
        let mut permission = match self.permission.lock() {
            Ok(permission) => permission,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *permission == NotificationPermission::Default {
            *permission = NotificationPermission::Granted;
        }
        Ok(*permission)
    }

    async fn show(&self, notification: NativeNotification) -> Result<()> {
        info!(title = %notification.title, body = %notification.body, "Notification");
        if let Ok(mut visible) = self.visible.lock() {
            visible.push(notification);
        }
        Ok(())
    }

    async fn dismiss(&self, title: &str) -> Result<()> {
        if let Ok(mut visible) = self.visible.lock() {
            visible.retain(|n| n.title != title);
        }
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<()> {
        info!(url = url, "Open window requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permission_is_granted_on_request() {
        let presenter = DesktopNotificationPresenter::new();
        assert_eq!(presenter.permission().await, NotificationPermission::Default);

        let decided = presenter.request_permission().await.unwrap();
        assert_eq!(decided, NotificationPermission::Granted);
        assert_eq!(presenter.permission().await, NotificationPermission::Granted);
    }

    #[tokio::test]
    async fn test_show_then_dismiss() {
        let presenter = DesktopNotificationPresenter::new();
        presenter
            .show(NativeNotification::new("Streak", "7 days in a row"))
            .await
            .unwrap();
        assert_eq!(presenter.visible().len(), 1);

        presenter.dismiss("Streak").await.unwrap();
        assert!(presenter.visible().is_empty());
    }
}
