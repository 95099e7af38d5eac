//! Bearer Token Storage
//!
//! The token and admin flag live in the persisted [`SettingsStore`], which is
//! authoritative for the lifetime of the process. When a native shell is
//! present its copy is kept in step through a [`TokenMirror`]:
//!
//! - writes and clears are mirrored after the persisted store succeeds
//! - a read that misses the persisted store consults the mirror once and
//!   writes the value back, so later reads never diverge from it
//! - a clear also persists a signed-out marker; while it is set the mirror is
//!   not consulted, so a mirror that failed to clear cannot revive the session
//!
//! ## Security
//!
//! Token values are never logged or included in error messages.

use async_trait::async_trait;
use bridge_traits::storage::SettingsStore;
use core_runtime::events::{AuthEvent, ClientEvent, EventBus};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::credentials::Credentials;
use crate::error::{AuthError, Result};

/// Persisted key of the bearer token
pub const TOKEN_KEY: &str = "jexi_token";

/// Persisted key of the admin flag
pub const ADMIN_KEY: &str = "jexi_is_admin";

/// Persisted marker set by [`TokenStore::clear_token`] and removed by the
/// next [`TokenStore::set_token`]
pub const SIGNED_OUT_KEY: &str = "jexi_signed_out";

/// Secondary token location owned by the host shell.
///
/// Implementations must absorb their own failures: a mirror that cannot be
/// reached behaves as an empty one and never fails the caller.
#[async_trait]
pub trait TokenMirror: Send + Sync {
    async fn save_token(&self, token: &str);

    async fn load_token(&self) -> Option<String>;

    async fn clear_token(&self);
}

#[derive(Clone)]
pub struct TokenStore {
    settings: Arc<dyn SettingsStore>,
    mirror: Option<Arc<dyn TokenMirror>>,
    events: Option<EventBus>,
}

impl TokenStore {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            settings,
            mirror: None,
            events: None,
        }
    }

    pub fn with_mirror(mut self, mirror: Arc<dyn TokenMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Emit `AuthEvent`s on this bus.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Current bearer token, if any.
    ///
    /// Never fails: a persisted-store error is logged and treated as absent.
    pub async fn get_token(&self) -> Option<String> {
        match self.settings.get_string(TOKEN_KEY).await {
            Ok(Some(token)) if !token.is_empty() => return Some(token),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to read persisted token"),
        }

        let mirror = self.mirror.as_ref()?;
        if self.signed_out().await {
            return None;
        }
        let token = mirror.load_token().await.filter(|t| !t.is_empty())?;

        debug!("Restored token from native bridge");
        if let Err(e) = self.settings.set_string(TOKEN_KEY, &token).await {
            warn!(error = %e, "Failed to write restored token back");
        }
        Some(token)
    }

    pub async fn set_token(&self, token: &str) -> Result<()> {
        self.settings
            .set_string(TOKEN_KEY, token)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        if let Err(e) = self.settings.delete(SIGNED_OUT_KEY).await {
            warn!(error = %e, "Failed to remove signed-out marker");
        }

        if let Some(mirror) = &self.mirror {
            mirror.save_token(token).await;
        }
        Ok(())
    }

    pub async fn clear_token(&self) -> Result<()> {
        self.settings
            .delete(TOKEN_KEY)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        self.settings
            .set_bool(SIGNED_OUT_KEY, true)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        if let Some(mirror) = &self.mirror {
            mirror.clear_token().await;
        }
        Ok(())
    }

    /// Whether the signed-in user is an administrator.
    pub async fn is_admin(&self) -> bool {
        match self.settings.get_bool(ADMIN_KEY).await {
            Ok(flag) => flag.unwrap_or(false),
            Err(e) => {
                warn!(error = %e, "Failed to read admin flag");
                false
            }
        }
    }

    pub async fn set_admin(&self, is_admin: bool) -> Result<()> {
        self.settings
            .set_bool(ADMIN_KEY, is_admin)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    pub async fn is_logged_in(&self) -> bool {
        self.get_token().await.is_some()
    }

    /// Persist a fresh session and announce it.
    pub async fn store_session(&self, credentials: &Credentials) -> Result<()> {
        self.set_token(&credentials.token).await?;
        self.set_admin(credentials.is_admin).await?;

        info!(is_admin = credentials.is_admin, "Session stored");
        self.emit(AuthEvent::SignedIn {
            is_admin: credentials.is_admin,
        });
        Ok(())
    }

    /// Remove the token and admin flag everywhere and announce it.
    pub async fn logout(&self) -> Result<()> {
        self.clear_token().await?;
        self.settings
            .delete(ADMIN_KEY)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        info!("Signed out");
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    async fn signed_out(&self) -> bool {
        match self.settings.get_bool(SIGNED_OUT_KEY).await {
            Ok(flag) => flag.unwrap_or(false),
            Err(e) => {
                warn!(error = %e, "Failed to read signed-out marker");
                false
            }
        }
    }

    fn emit(&self, event: AuthEvent) {
        if let Some(events) = &self.events {
            let _ = events.emit(ClientEvent::Auth(event));
        }
    }
}
