//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` (JSON and multipart bodies)
//! - `SettingsStore` using a SQLite-backed key-value store
//! - `SecureStore` using the `keyring` crate
//! - `NativeBridge` mirroring the token into a `SecureStore` and journaling
//!   write actions to SQLite
//! - `NetworkMonitor` using a TCP reachability probe
//! - `CacheStorage` using one directory per asset cache
//! - `NotificationPresenter` that logs notifications
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let settings = SqliteSettingsStore::new("client.db".into()).await?;
//!     // Use in ClientConfig
//!     Ok(())
//! }
//! ```

mod cache_storage;
mod http;
mod native_bridge;
mod network;
mod notification;
mod settings;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use cache_storage::FsCacheStorage;
pub use http::ReqwestHttpClient;
pub use native_bridge::{DesktopNativeBridge, JournaledAction};
pub use network::DesktopNetworkMonitor;
pub use notification::DesktopNotificationPresenter;
pub use settings::SqliteSettingsStore;

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;
