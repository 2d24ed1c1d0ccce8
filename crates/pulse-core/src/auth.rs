//! Authentication frame sent right after the socket opens.
//!
//! The user dashboard authenticates with its bearer token, the admin
//! dashboard with its username:
//!
//! ```json
//! {"type":"AUTH","token":"eyJhbGciOi..."}
//! {"type":"ADMIN_AUTH","username":"admin"}
//! ```

use serde::Serialize;

use crate::error::PulseError;

/// Username sent by the admin dashboard when none was stored at login.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// Credential the host supplies to [`connect`](crate::RealtimeChannel::connect).
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Regular user session token.
    Bearer(String),
    /// Admin session, identified by username.
    Admin { username: String },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum AuthFrame<'a> {
    Auth { token: &'a str },
    AdminAuth { username: &'a str },
}

impl Credential {
    /// Admin credential, falling back to [`DEFAULT_ADMIN_USERNAME`].
    pub fn admin(username: Option<String>) -> Self {
        Self::Admin { username: username.unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string()) }
    }

    /// Serialize the authentication frame for this credential.
    pub fn auth_frame(&self) -> Result<String, PulseError> {
        let frame = match self {
            Self::Bearer(token) => AuthFrame::Auth { token: token.as_str() },
            Self::Admin { username } => AuthFrame::AdminAuth { username: username.as_str() },
        };
        serde_json::to_string(&frame).map_err(|e| PulseError::Encode(e.to_string()))
    }

    /// Close reason the dashboards send on logout.
    pub fn logout_reason(&self) -> &'static str {
        match self {
            Self::Bearer(_) => "User logged out",
            Self::Admin { .. } => "Admin logged out",
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
            Self::Admin { username } => f.debug_struct("Admin").field("username", username).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_frame() {
        let frame = Credential::Bearer("tok-123".into()).auth_frame().unwrap();
        assert_eq!(frame, r#"{"type":"AUTH","token":"tok-123"}"#);
    }

    #[test]
    fn admin_frame_with_default_username() {
        let frame = Credential::admin(None).auth_frame().unwrap();
        assert_eq!(frame, r#"{"type":"ADMIN_AUTH","username":"admin"}"#);

        let frame = Credential::admin(Some("ops".into())).auth_frame().unwrap();
        assert_eq!(frame, r#"{"type":"ADMIN_AUTH","username":"ops"}"#);
    }

    #[test]
    fn debug_redacts_token() {
        let dbg = format!("{:?}", Credential::Bearer("secret-token".into()));
        assert!(!dbg.contains("secret-token"));
    }
}
