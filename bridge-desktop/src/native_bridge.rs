//! Native bridge for the desktop shell
//!
//! Mirrors the bearer token into a [`SecureStore`] (the OS keychain by
//! default) and journals write actions to a SQLite `pending_actions` table so
//! the shell can replay them once it is back online.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    native::NativeBridge,
    storage::SecureStore,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePool, Row};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::settings::open_pool;

const TOKEN_KEY: &str = "auth_token";

/// A write action recorded while the shell may be offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournaledAction {
    pub id: String,
    pub method: String,
    pub path: String,
    /// JSON-serialised request body
    pub body: String,
    pub created_at: DateTime<Utc>,
}

pub struct DesktopNativeBridge {
    pool: SqlitePool,
    secure_store: Arc<dyn SecureStore>,
}

impl DesktopNativeBridge {
    /// Open the journal at `db_path`, keeping the token in `secure_store`.
    pub async fn open(db_path: PathBuf, secure_store: Arc<dyn SecureStore>) -> Result<Self> {
        let pool = open_pool(Some(&db_path)).await?;
        Self::create_table(&pool).await?;
        debug!(path = ?db_path, "Initialized pending action journal");
        Ok(Self { pool, secure_store })
    }

    /// In-memory journal (for testing)
    pub async fn in_memory(secure_store: Arc<dyn SecureStore>) -> Result<Self> {
        let pool = open_pool(None).await?;
        Self::create_table(&pool).await?;
        Ok(Self { pool, secure_store })
    }

    async fn create_table(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pending_actions (
                id TEXT PRIMARY KEY,
                method TEXT NOT NULL,
                path TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| BridgeError::Storage(format!("Failed to create journal: {}", e)))?;
        Ok(())
    }

    /// Journaled actions, oldest first.
    pub async fn pending_actions(&self) -> Result<Vec<JournaledAction>> {
        let rows = sqlx::query(
            "SELECT id, method, path, body, created_at FROM pending_actions \
             ORDER BY created_at, rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BridgeError::Storage(format!("Failed to read journal: {}", e)))?;

        rows.into_iter()
            .map(|row| {
                let millis: i64 = row.get(4);
                let created_at = Utc
                    .timestamp_millis_opt(millis)
                    .single()
                    .ok_or_else(|| {
                        BridgeError::Storage(format!("Invalid journal timestamp: {}", millis))
                    })?;
                Ok(JournaledAction {
                    id: row.get(0),
                    method: row.get(1),
                    path: row.get(2),
                    body: row.get(3),
                    created_at,
                })
            })
            .collect()
    }

    /// Remove a replayed action. Returns whether it was present.
    pub async fn acknowledge(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pending_actions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::Storage(format!("Failed to acknowledge action: {}", e)))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl NativeBridge for DesktopNativeBridge {
    async fn log_offline_action(&self, method: &str, path: &str, body: &str) -> Result<()> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO pending_actions (id, method, path, body, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(method)
        .bind(path)
        .bind(body)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::Storage(format!("Failed to journal action: {}", e)))?;

        debug!(id = %id, method, path, "Journaled offline action");
        Ok(())
    }

    async fn save_auth_token(&self, token: &str) -> Result<()> {
        self.secure_store
            .set_secret(TOKEN_KEY, token.as_bytes())
            .await
    }

    async fn get_auth_token(&self) -> Result<Option<String>> {
        match self.secure_store.get_secret(TOKEN_KEY).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| BridgeError::Storage(format!("Token is not UTF-8: {}", e))),
            None => Ok(None),
        }
    }

    async fn clear_auth_token(&self) -> Result<()> {
        self.secure_store.delete_secret(TOKEN_KEY).await
    }
}
