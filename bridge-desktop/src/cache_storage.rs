//! Asset cache storage on the local file system
//!
//! Layout: one directory per cache name under the root; each asset is a pair
//! of files named by the SHA-256 of its URL, `<hash>.body` and
//! `<hash>.meta.json`.

use async_trait::async_trait;
use bridge_traits::{
    cache::{CacheStorage, CachedAsset},
    error::{BridgeError, Result},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct AssetMeta {
    url: String,
    status: u16,
    content_type: Option<String>,
}

pub struct FsCacheStorage {
    root: PathBuf,
}

impl FsCacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn url_hash(url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn cache_dir(&self, cache_name: &str) -> Result<PathBuf> {
        let valid = !cache_name.is_empty()
            && cache_name != "."
            && cache_name != ".."
            && !cache_name.contains(['/', '\\']);
        if !valid {
            return Err(BridgeError::OperationFailed(format!(
                "Invalid cache name: {:?}",
                cache_name
            )));
        }
        Ok(self.root.join(cache_name))
    }

    async fn read_asset(dir: &Path, url: &str) -> Result<Option<CachedAsset>> {
        let hash = Self::url_hash(url);
        let meta = match fs::read(dir.join(format!("{}.meta.json", hash))).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta: AssetMeta = serde_json::from_slice(&meta)?;
        let body = fs::read(dir.join(format!("{}.body", hash))).await?;

        Ok(Some(CachedAsset {
            url: meta.url,
            status: meta.status,
            content_type: meta.content_type,
            body: Bytes::from(body),
        }))
    }

    /// Cache directories in name order.
    async fn cache_names(&self) -> Result<Vec<String>> {
        let mut read_dir = match fs::read_dir(&self.root).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl CacheStorage for FsCacheStorage {
    async fn keys(&self) -> Result<Vec<String>> {
        self.cache_names().await
    }

    async fn has(&self, cache_name: &str) -> Result<bool> {
        Ok(fs::try_exists(self.cache_dir(cache_name)?).await?)
    }

    async fn put(&self, cache_name: &str, asset: CachedAsset) -> Result<()> {
        let dir = self.cache_dir(cache_name)?;
        fs::create_dir_all(&dir).await?;

        let hash = Self::url_hash(&asset.url);
        let meta = AssetMeta {
            url: asset.url.clone(),
            status: asset.status,
            content_type: asset.content_type.clone(),
        };

        // Body first: a meta file is only visible once its body exists.
        fs::write(dir.join(format!("{}.body", hash)), &asset.body).await?;
        fs::write(
            dir.join(format!("{}.meta.json", hash)),
            serde_json::to_vec(&meta)?,
        )
        .await?;

        debug!(cache = cache_name, url = %asset.url, size = asset.body.len(), "Cached asset");
        Ok(())
    }

    async fn delete(&self, cache_name: &str) -> Result<bool> {
        match fs::remove_dir_all(self.cache_dir(cache_name)?).await {
            Ok(()) => {
                debug!(cache = cache_name, "Deleted asset cache");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn match_url(&self, url: &str) -> Result<Option<CachedAsset>> {
        for name in self.cache_names().await? {
            if let Some(asset) = Self::read_asset(&self.root.join(&name), url).await? {
                return Ok(Some(asset));
            }
        }
        Ok(None)
    }

    async fn entries(&self, cache_name: &str) -> Result<Vec<String>> {
        let dir = self.cache_dir(cache_name)?;
        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut urls = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".meta.json") {
                let meta: AssetMeta = serde_json::from_slice(&fs::read(entry.path()).await?)?;
                urls.push(meta.url);
            }
        }
        urls.sort();
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("fs-cache-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let root = temp_root();
        let storage = FsCacheStorage::new(&root);

        let asset = CachedAsset::new("/css/style.css", "body{}").with_content_type("text/css");
        storage.put("jexi-cache-v1", asset.clone()).await.unwrap();

        assert!(storage.has("jexi-cache-v1").await.unwrap());
        assert_eq!(storage.match_url("/css/style.css").await.unwrap(), Some(asset));
        assert_eq!(storage.match_url("/js/app.js").await.unwrap(), None);
        assert_eq!(
            storage.entries("jexi-cache-v1").await.unwrap(),
            vec!["/css/style.css".to_string()]
        );

        let _ = fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_delete_removes_whole_generation() {
        let root = temp_root();
        let storage = FsCacheStorage::new(&root);

        storage
            .put("jexi-cache-v0", CachedAsset::new("/", "old"))
            .await
            .unwrap();
        storage
            .put("jexi-cache-v1", CachedAsset::new("/", "new"))
            .await
            .unwrap();

        assert_eq!(
            storage.keys().await.unwrap(),
            vec!["jexi-cache-v0".to_string(), "jexi-cache-v1".to_string()]
        );

        assert!(storage.delete("jexi-cache-v0").await.unwrap());
        assert!(!storage.delete("jexi-cache-v0").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["jexi-cache-v1".to_string()]);

        let served = storage.match_url("/").await.unwrap().unwrap();
        assert_eq!(served.body, Bytes::from_static(b"new"));

        let _ = fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_missing_root_has_no_caches() {
        let storage = FsCacheStorage::new(temp_root());
        assert!(storage.keys().await.unwrap().is_empty());
        assert!(!storage.has("jexi-cache-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_path_like_cache_names_are_rejected() {
        let storage = FsCacheStorage::new(temp_root());
        assert!(storage.put("../escape", CachedAsset::new("/", "x")).await.is_err());
    }
}
