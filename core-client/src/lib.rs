//! # Client Core
//!
//! Authenticated API access with offline resilience.
//!
//! ## Overview
//!
//! - [`ApiClient`] issues every request, attaches the bearer token and falls
//!   back to the [`OfflineCache`] when a read fails
//! - [`BridgeAdapter`] mirrors the token into the native shell and queues
//!   write actions for it
//! - [`NotificationPoller`] surfaces new alerts natively, at most once each
//! - [`ViewRegistry`] guarantees a view's periodic work stops before the next
//!   view starts
//! - [`Preferences`] holds theme, voice, currency and draft settings

pub mod bridge;
pub mod cache;
pub mod dispatcher;
pub mod error;
pub mod poller;
pub mod preferences;
pub mod task;
pub mod views;

pub use bridge::{BridgeAdapter, DeliveryStats, PendingAction};
pub use cache::{CacheEntry, OfflineCache};
pub use dispatcher::{payload_data, ApiClient, UploadFile};
pub use error::{ClientError, RequestOrigin, Result};
pub use poller::{NotificationPoller, NotificationRecord, PollReport};
pub use preferences::Preferences;
pub use task::RecurringTask;
pub use views::{NotificationsView, PollingView, ViewHandler, ViewRegistry};
