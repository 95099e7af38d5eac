//! Named Asset Cache Storage
//!
//! Platform-provided store of named caches, each mapping a request URL to a
//! stored response. It is the only channel shared between the application
//! and the background asset worker.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A stored static asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAsset {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl CachedAsset {
    pub fn new(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Names of every existing cache
    async fn keys(&self) -> Result<Vec<String>>;

    /// Whether a cache with this name exists
    async fn has(&self, cache_name: &str) -> Result<bool>;

    /// Store one asset, creating the cache if needed
    async fn put(&self, cache_name: &str, asset: CachedAsset) -> Result<()>;

    /// Delete a cache and all its entries. Returns whether it existed.
    async fn delete(&self, cache_name: &str) -> Result<bool>;

    /// Look `url` up across every cache
    async fn match_url(&self, url: &str) -> Result<Option<CachedAsset>>;

    /// URLs stored in one cache
    async fn entries(&self, cache_name: &str) -> Result<Vec<String>>;
}
