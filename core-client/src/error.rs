use core_auth::AuthError;
use thiserror::Error;

/// Message used for every connectivity failure.
pub const OFFLINE_MESSAGE: &str = "Offline: No internet connection.";

/// Fallback message for a 401 without a `detail`.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized. Please log in again.";

#[derive(Error, Debug)]
pub enum ClientError {
    /// The network monitor reports no connectivity; nothing was sent.
    #[error("Offline: No internet connection.")]
    Connectivity,

    /// The server answered 401
    #[error("{message}")]
    Unauthorized { message: String },

    /// Any other non-2xx response
    #[error("{message}")]
    Http { status: u16, message: String },

    /// A success response whose shape is not recognised
    #[error("Invalid response format from server: {0}")]
    InvalidResponse(String),

    #[error("{message}")]
    Upload { status: u16, message: String },

    /// The request never produced a response
    #[error("Network error: {0}")]
    Transport(String),

    #[error(transparent)]
    Auth(AuthError),

    /// The persisted settings store failed
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unknown view: {0}")]
    UnknownView(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<AuthError> for ClientError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidResponse(detail) => ClientError::InvalidResponse(detail),
            other => ClientError::Auth(other),
        }
    }
}

/// Who initiated a request. Background calls are not announced to the user
/// when they fail authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestOrigin {
    #[default]
    Interactive,
    Background,
}

impl ClientError {
    /// Whether a failed read may be answered from the offline cache.
    ///
    /// Authentication failures always reach the caller.
    pub fn is_recoverable_from_cache(&self) -> bool {
        matches!(
            self,
            ClientError::Connectivity | ClientError::Transport(_) | ClientError::Http { .. }
        )
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Unauthorized { .. } => Some(401),
            ClientError::Http { status, .. } | ClientError::Upload { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text of the transient notice for a propagated error, or `None` when
    /// the error is silent.
    pub fn user_notice(&self, origin: RequestOrigin) -> Option<String> {
        match self {
            ClientError::Connectivity => None,
            ClientError::Unauthorized { .. } if origin == RequestOrigin::Background => None,
            other => Some(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_message_matches_display() {
        assert_eq!(ClientError::Connectivity.to_string(), OFFLINE_MESSAGE);
    }

    #[test]
    fn test_unauthorized_is_never_recovered() {
        let error = ClientError::Unauthorized {
            message: UNAUTHORIZED_MESSAGE.to_string(),
        };
        assert!(!error.is_recoverable_from_cache());
        assert_eq!(error.status(), Some(401));

        assert!(ClientError::Connectivity.is_recoverable_from_cache());
        assert!(ClientError::Transport("reset".to_string()).is_recoverable_from_cache());
        assert!(ClientError::Http {
            status: 503,
            message: "Error 503: Service Unavailable".to_string()
        }
        .is_recoverable_from_cache());
        assert!(!ClientError::InvalidResponse("x".to_string()).is_recoverable_from_cache());
    }

    #[test]
    fn test_notice_suppression() {
        let unauthorized = ClientError::Unauthorized {
            message: "Token expired".to_string(),
        };
        assert_eq!(
            unauthorized.user_notice(RequestOrigin::Interactive),
            Some("Token expired".to_string())
        );
        assert_eq!(unauthorized.user_notice(RequestOrigin::Background), None);
        assert_eq!(ClientError::Connectivity.user_notice(RequestOrigin::Interactive), None);

        let http = ClientError::Http {
            status: 404,
            message: "Task not found".to_string(),
        };
        assert_eq!(
            http.user_notice(RequestOrigin::Background),
            Some("Task not found".to_string())
        );
    }

    #[test]
    fn test_auth_invalid_response_maps_to_structural_error() {
        let error: ClientError = AuthError::InvalidResponse("no token".to_string()).into();
        assert!(matches!(error, ClientError::InvalidResponse(_)));

        let error: ClientError = AuthError::Storage("disk full".to_string()).into();
        assert!(matches!(error, ClientError::Auth(_)));
    }
}
