use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error(transparent)]
    Config(#[from] core_runtime::Error),

    #[error(transparent)]
    Client(#[from] core_client::ClientError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
