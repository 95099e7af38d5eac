use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    /// A manifest entry could not be downloaded during install
    #[error("Asset unreachable: {url} ({reason})")]
    Unreachable { url: String, reason: String },

    /// The shared cache store rejected an operation
    #[error("Cache storage error: {0}")]
    Storage(#[from] BridgeError),

    #[error("Worker is not installed")]
    NotInstalled,

    /// A network fall-through for an uncached asset failed
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid push payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("Notification surface failed: {0}")]
    Notification(String),

    /// The worker task has exited and can no longer receive messages
    #[error("Asset worker stopped")]
    WorkerStopped,
}

pub type Result<T> = std::result::Result<T, AssetError>;
