//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the client core and the host it
//! runs in. Each trait represents a capability that the core requires but
//! that must be implemented differently per platform (desktop, Android shell,
//! web).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP with JSON and multipart bodies
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity detection
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Persisted key-value state
//! - [`SecureStore`](storage::SecureStore) - Credential persistence (Keychain/Keystore)
//! - [`CacheStorage`](cache::CacheStorage) - Named caches shared with the asset worker
//!
//! ### Platform Integration
//! - [`NativeBridge`](native::NativeBridge) - Optional native shell hooks
//! - [`NotificationPresenter`](notification::NotificationPresenter) - System notifications
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! convert platform-specific errors into it with an actionable message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so handles can be shared across
//! async tasks behind `Arc`.

pub mod cache;
pub mod error;
pub mod http;
pub mod native;
pub mod network;
pub mod notification;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use cache::{CacheStorage, CachedAsset};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartFile, RetryPolicy};
pub use native::NativeBridge;
pub use network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use notification::{NativeNotification, NotificationPermission, NotificationPresenter};
pub use storage::{SecureStore, SettingsStore};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
