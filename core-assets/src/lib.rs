//! # Static Asset Worker
//!
//! Background worker that version-caches the application's static assets
//! and answers intercepted reads from that cache.
//!
//! The worker shares nothing with the main client except the
//! [`CacheStorage`](bridge_traits::cache::CacheStorage) it writes to. Hosts
//! drive it through a [`WorkerHandle`], which posts lifecycle, fetch and
//! push events to the worker's own task.
//!
//! ```ignore
//! let worker = AssetCacheWorker::new(
//!     AssetWorkerConfig::new("https://jexi.example"),
//!     storage,
//!     http,
//!     presenter,
//! );
//! let handle = WorkerHandle::spawn(worker);
//! handle.install().await?;
//! handle.activate().await?;
//! ```

pub mod error;
pub mod handle;
pub mod worker;

pub use error::{AssetError, Result};
pub use handle::WorkerHandle;
pub use worker::{
    AssetCacheWorker, AssetWorkerConfig, FetchOutcome, PushPayload, WorkerState,
    DEFAULT_API_PREFIX, DEFAULT_GENERATION, DEFAULT_MANIFEST,
};
