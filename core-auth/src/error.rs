use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// The persisted store rejected a credential write
    #[error("Credential storage failed: {0}")]
    Storage(String),

    /// A login/setup response carried none of the recognised token shapes
    #[error("Invalid response format from server: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
