//! Configuration parsing for the realtime channel.
//!
//! The runner reads one JSON file with logging metadata and a `realtime`
//! block describing the push endpoint, the session role and the reconnect
//! policy.
//!
//! # Example config (user dashboard)
//!
//! ```json
//! {
//!   "Dashboard": { "module_name": "pulse_user", "log_path": "/tmp/log" },
//!   "realtime": {
//!     "origin": "https://invest.example.com",
//!     "role": "user",
//!     "token": "eyJhbGciOi...",
//!     "reconnect": { "max_attempts": 5, "base_delay_ms": 1000, "max_delay_ms": 30000 }
//!   }
//! }
//! ```

use serde::Deserialize;
use url::Url;

use crate::auth::Credential;
use crate::backoff::ReconnectPolicy;
use crate::error::PulseError;
use crate::ws::client::endpoint_url;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Module metadata (name, log path).
    #[serde(rename = "Dashboard")]
    pub dashboard: Option<ModuleMeta>,

    /// Push endpoint and session settings.
    pub realtime: RealtimeConfig,
}

impl AppConfig {
    /// Module name for log files, defaulting to `pulse_<role>`.
    pub fn module_name(&self) -> String {
        self.dashboard
            .as_ref()
            .and_then(|m| m.module_name.clone())
            .unwrap_or_else(|| format!("pulse_{}", self.realtime.role))
    }

    pub fn log_path(&self) -> Option<String> {
        self.dashboard.as_ref().and_then(|m| m.log_path.clone())
    }
}

/// Module metadata block.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

/// Which dashboard the session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// The `realtime` block.
#[derive(Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Page origin the dashboard is served from (e.g. `https://invest.example.com`).
    pub origin: String,

    /// Endpoint path (default: `/ws`).
    pub path: Option<String>,

    /// Session role (default: `user`).
    #[serde(default)]
    pub role: Role,

    /// Bearer token for the user role.
    pub token: Option<String>,

    /// Username for the admin role (default: `admin`).
    pub username: Option<String>,

    /// Reconnect policy (defaults: 5 attempts, 1s base, 30s cap).
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

impl RealtimeConfig {
    /// Resolve the push endpoint URL from the origin.
    pub fn endpoint(&self) -> Result<Url, PulseError> {
        endpoint_url(&self.origin, self.path.as_deref())
    }

    /// Build the credential for the configured role.
    pub fn credential(&self) -> Result<Credential, PulseError> {
        match self.role {
            Role::User => match self.token.as_deref() {
                Some(token) if !token.is_empty() => Ok(Credential::Bearer(token.to_string())),
                _ => Err(PulseError::Config("realtime.token is required for role \"user\"".into())),
            },
            Role::Admin => Ok(Credential::admin(self.username.clone())),
        }
    }

    /// Check everything the channel needs before it is spawned.
    pub fn validate(&self) -> Result<(), PulseError> {
        self.endpoint()?;
        self.credential()?;
        self.reconnect.validate()
    }
}

impl std::fmt::Debug for RealtimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeConfig")
            .field("origin", &self.origin)
            .field("path", &self.path)
            .field("role", &self.role)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

/// Parse a config from JSON text and validate it.
///
/// `token` overrides `realtime.token` when given (e.g. from the command line).
pub fn parse_config(content: &str, token: Option<String>) -> anyhow::Result<AppConfig> {
    let mut config: AppConfig = serde_json::from_str(content)?;
    if token.is_some() {
        config.realtime.token = token;
    }
    config.realtime.validate()?;
    Ok(config)
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path, token: Option<String>) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content, token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_config_with_defaults() {
        let config = parse_config(
            r#"{
                "realtime": { "origin": "https://invest.example.com", "token": "abc" }
            }"#,
            None,
        )
        .unwrap();

        assert_eq!(config.realtime.role, Role::User);
        assert_eq!(config.realtime.reconnect, ReconnectPolicy::default());
        assert_eq!(config.realtime.endpoint().unwrap().as_str(), "wss://invest.example.com/ws");
        assert_eq!(config.realtime.credential().unwrap(), Credential::Bearer("abc".into()));
        assert_eq!(config.module_name(), "pulse_user");
        assert_eq!(config.log_path(), None);
    }

    #[test]
    fn admin_config() {
        let config = parse_config(
            r#"{
                "Dashboard": { "module_name": "pulse_admin", "log_path": "/tmp/log" },
                "realtime": {
                    "origin": "http://localhost:3000",
                    "path": "/push",
                    "role": "admin",
                    "reconnect": { "max_attempts": 10, "base_delay_ms": 500, "max_delay_ms": 8000 }
                }
            }"#,
            None,
        )
        .unwrap();

        assert_eq!(config.realtime.credential().unwrap(), Credential::admin(None));
        assert_eq!(config.realtime.endpoint().unwrap().as_str(), "ws://localhost:3000/push");
        assert_eq!(config.realtime.reconnect.max_attempts, 10);
        assert_eq!(config.module_name(), "pulse_admin");
        assert_eq!(config.log_path().as_deref(), Some("/tmp/log"));
    }

    #[test]
    fn user_without_token_rejected() {
        let err = parse_config(r#"{ "realtime": { "origin": "https://x.example.com" } }"#, None).unwrap_err();
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn invalid_reconnect_policy_rejected() {
        let err = parse_config(
            r#"{
                "realtime": {
                    "origin": "https://x.example.com",
                    "token": "t",
                    "reconnect": { "base_delay_ms": 5000, "max_delay_ms": 1000 }
                }
            }"#,
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_delay_ms"));
    }

    #[test]
    fn token_override_wins() {
        let config = parse_config(
            r#"{ "realtime": { "origin": "https://x.example.com", "token": "from-file" } }"#,
            Some("from-cli".into()),
        )
        .unwrap();
        assert_eq!(config.realtime.credential().unwrap(), Credential::Bearer("from-cli".into()));

        let config =
            parse_config(r#"{ "realtime": { "origin": "https://x.example.com" } }"#, Some("t".into())).unwrap();
        assert_eq!(config.realtime.credential().unwrap(), Credential::Bearer("t".into()));
    }

    #[test]
    fn debug_hides_token() {
        let config = parse_config(
            r#"{ "realtime": { "origin": "https://x.example.com", "token": "s3cret" } }"#,
            None,
        )
        .unwrap();
        assert!(!format!("{config:?}").contains("s3cret"));
    }
}
