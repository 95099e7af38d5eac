//! Credential extraction from login and setup responses
//!
//! The auth endpoints have shipped several response shapes over time:
//!
//! ```text
//! {"status": "success", "data": {"token": "...", "is_admin": true}}
//! {"access_token": "...", "is_admin": false}
//! {"token": "..."}                       // setup only
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AuthError, Result};

/// Token and admin flag issued by the server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub token: String,
    pub is_admin: bool,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"[REDACTED]")
            .field("is_admin", &self.is_admin)
            .finish()
    }
}

impl Credentials {
    pub fn new(token: impl Into<String>, is_admin: bool) -> Self {
        Self {
            token: token.into(),
            is_admin,
        }
    }

    /// Extract credentials from a `/auth/login` response.
    pub fn from_login_response(response: &Value) -> Result<Self> {
        Self::enveloped(response)
            .or_else(|| Self::top_level(response, "access_token"))
            .ok_or_else(|| {
                AuthError::InvalidResponse("no token in login response".to_string())
            })
    }

    /// Extract credentials from a `/auth/setup` response.
    ///
    /// Setup additionally accepts a bare top-level `token`.
    pub fn from_setup_response(response: &Value) -> Result<Self> {
        Self::enveloped(response)
            .or_else(|| Self::top_level(response, "token"))
            .or_else(|| Self::top_level(response, "access_token"))
            .ok_or_else(|| {
                AuthError::InvalidResponse("no token in setup response".to_string())
            })
    }

    fn enveloped(response: &Value) -> Option<Self> {
        if response.get("status").and_then(Value::as_str) != Some("success") {
            return None;
        }
        let data = response.get("data")?;
        let token = non_empty_str(data.get("token"))?;
        Some(Self::new(token, admin_flag(data.get("is_admin"))))
    }

    fn top_level(response: &Value, token_field: &str) -> Option<Self> {
        let token = non_empty_str(response.get(token_field))?;
        Some(Self::new(token, admin_flag(response.get("is_admin"))))
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Missing or unrecognised values mean "not an admin".
fn admin_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}
