//! Native Shell Bridge
//!
//! Optional capability exposed by native shells (the Android WebView wrapper,
//! the desktop app). It mirrors the bearer token into shell-owned storage and
//! journals write actions so the shell can replay them once connectivity
//! returns.
//!
//! Every method may fail; callers in the core treat those failures as
//! non-fatal.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait NativeBridge: Send + Sync {
    /// Record a write action (`method`, `path`, JSON-serialised body) for
    /// later replay by the shell.
    async fn log_offline_action(&self, method: &str, path: &str, body: &str) -> Result<()>;

    /// Persist the bearer token in shell storage.
    async fn save_auth_token(&self, token: &str) -> Result<()>;

    /// Read the bearer token from shell storage.
    async fn get_auth_token(&self) -> Result<Option<String>>;

    /// Remove the bearer token from shell storage.
    async fn clear_auth_token(&self) -> Result<()>;
}
