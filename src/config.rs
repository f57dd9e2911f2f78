//! Runtime configuration for the identity client and CLI.
//!
//! Loaded from a TOML file; every field has a default so an empty file (or
//! no file at all) yields a working production/US configuration.
//!
//! ```toml
//! environment = "integration"
//! residency = "US"
//! request_timeout_secs = 30
//! session_file = "/home/me/.config/aims-auth/session.json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AuthError, Result};
use crate::locator::{self, Environment, Residency, Service};

/// Settings that decide where and how the identity service is reached.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Deployment environment used to resolve service locations.
    pub environment: Environment,
    /// Data residency used to resolve regional service locations.
    pub residency: Residency,
    /// Explicit base URL for the identity service. Overrides location
    /// resolution when set.
    pub base_url: Option<String>,
    /// TCP + TLS handshake budget.
    pub connect_timeout_secs: u64,
    /// Full round-trip budget for a single request.
    pub request_timeout_secs: u64,
    /// Where a successful session is persisted by the CLI.
    pub session_file: Option<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            environment: Environment::default(),
            residency: Residency::default(),
            base_url: None,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            session_file: None,
        }
    }
}

impl AuthConfig {
    /// Reads and parses a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AuthError::Config {
            message: format!("cannot read {}", path.display()),
            source: Some(Box::new(e)),
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AuthError::Config {
            message: "malformed configuration".to_string(),
            source: Some(Box::new(e)),
        })
    }

    /// Base URL of the identity service, without a trailing slash.
    pub fn aims_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => locator::resolve(Service::InsightApi, self.environment, self.residency)
                .to_string(),
        }
    }

    /// Connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_uses_production_us() {
        let config = AuthConfig::from_toml("").unwrap();
        assert_eq!(config, AuthConfig::default());
        assert_eq!(config.aims_base_url(), "https://api.cloudinsight.alertlogic.com");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn environment_and_residency_select_stack() {
        let config = AuthConfig::from_toml(
            r#"
            environment = "production-staging"
            residency = "EMEA"
            "#,
        )
        .unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.aims_base_url(), "https://api.cloudinsight.alertlogic.co.uk");
    }

    #[test]
    fn base_url_override_wins_and_is_trimmed() {
        let config = AuthConfig::from_toml(
            r#"
            environment = "integration"
            base_url = "http://127.0.0.1:8080/"
            "#,
        )
        .unwrap();
        assert_eq!(config.aims_base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn unknown_environment_is_a_config_error() {
        let err = AuthConfig::from_toml(r#"environment = "moon""#).unwrap_err();
        assert!(matches!(err, AuthError::Config { .. }), "got {err:?}");
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "connect_timeout_secs = 3").unwrap();
        writeln!(file, "session_file = \"/tmp/session.json\"").unwrap();
        let config = AuthConfig::load(file.path()).unwrap();
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.session_file, Some(PathBuf::from("/tmp/session.json")));
    }

    #[test]
    fn load_missing_file_reports_path() {
        let err = AuthConfig::load(Path::new("/nonexistent/aims-auth.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/aims-auth.toml"));
    }
}
