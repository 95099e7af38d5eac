//! User preferences
//!
//! JSON-encoded values in the [`SettingsStore`]. Values written as raw
//! strings by older clients are read back as strings.

use bridge_traits::storage::SettingsStore;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::error::{ClientError, Result};

pub const THEME_KEY: &str = "jexi_theme";
pub const VOICE_KEY: &str = "jexi_voice_enabled";
pub const CURRENCY_KEY: &str = "jexi_currency";
pub const CHAT_SESSION_KEY: &str = "jexi_chat_session";
pub const DRAFT_KEY: &str = "current_chat_draft";

pub const DEFAULT_THEME: &str = "dark";
pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Clone)]
pub struct Preferences {
    settings: Arc<dyn SettingsStore>,
}

impl Preferences {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    /// Value under `key`, or `None` when absent, unreadable or of another
    /// type.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.settings.get_string(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "Failed to read preference");
                return None;
            }
        };

        let value = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
        serde_json::from_value(value).ok()
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let encoded = serde_json::to_string(value)?;
        self.settings
            .set_string(key, &encoded)
            .await
            .map_err(|e| ClientError::Storage(format!("preference {}: {}", key, e)))
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.settings
            .delete(key)
            .await
            .map_err(|e| ClientError::Storage(format!("preference {}: {}", key, e)))
    }

    pub async fn theme(&self) -> String {
        self.get::<String>(THEME_KEY)
            .await
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_THEME.to_string())
    }

    pub async fn set_theme(&self, theme: &str) -> Result<()> {
        self.set(THEME_KEY, theme).await
    }

    /// Voice replies are on only when explicitly enabled.
    pub async fn voice_enabled(&self) -> bool {
        self.get::<bool>(VOICE_KEY).await == Some(true)
    }

    pub async fn set_voice_enabled(&self, enabled: bool) -> Result<()> {
        self.set(VOICE_KEY, &enabled).await
    }

    pub async fn currency(&self) -> String {
        self.get::<String>(CURRENCY_KEY)
            .await
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
    }

    pub async fn set_currency(&self, currency: &str) -> Result<()> {
        self.set(CURRENCY_KEY, currency).await
    }

    pub async fn chat_session(&self) -> Option<String> {
        self.get(CHAT_SESSION_KEY).await
    }

    pub async fn set_chat_session(&self, session_id: &str) -> Result<()> {
        self.set(CHAT_SESSION_KEY, session_id).await
    }

    pub async fn draft(&self) -> Option<String> {
        self.get::<String>(DRAFT_KEY)
            .await
            .filter(|d| !d.is_empty())
    }

    pub async fn save_draft(&self, content: &str) -> Result<()> {
        self.set(DRAFT_KEY, content).await
    }

    pub async fn clear_draft(&self) -> Result<()> {
        self.remove(DRAFT_KEY).await
    }
}
