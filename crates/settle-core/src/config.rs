//! Harness configuration.
//!
//! Loaded from a YAML file; every field has a default so a bare
//! `base_url` is a complete config. Poll defaults mirror the backend's
//! observed settlement profile: six attempts five seconds apart with a
//! two-second grace period before the first read.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Top-level configuration for a harness run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Backend base URL, e.g. `http://localhost:8080`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout for actions and observations.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for register/login round-trips. Generous: backend-side
    /// credential hashing is slow by design.
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,

    /// Settlement polling budget.
    #[serde(default)]
    pub poll: PollConfig,

    /// Token denomination parameters.
    #[serde(default)]
    pub token: TokenConfig,

    /// Pre-funded account shared across runs, if the deployment has one.
    #[serde(default)]
    pub seed_account: Option<SeedAccount>,
}

/// Retry budget for settlement polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Optional settle grace before the first observation.
    #[serde(default = "default_grace")]
    pub grace_secs: u64,
}

/// Token denomination: display amount = base units / 10^decimals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_decimals")]
    pub decimals: u32,

    #[serde(default = "default_symbol")]
    pub symbol: String,
}

/// A backend-global identity reused across scenarios. Scenarios that touch
/// it must declare the same serialization group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedAccount {
    pub email: String,
    pub password: String,

    /// Serialization group name; defaults to "seed".
    #[serde(default = "default_seed_group")]
    pub group: String,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_auth_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    6
}

fn default_interval() -> u64 {
    5
}

fn default_grace() -> u64 {
    2
}

fn default_decimals() -> u32 {
    18
}

fn default_symbol() -> String {
    "QXB".to_string()
}

fn default_seed_group() -> String {
    "seed".to_string()
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            auth_timeout_secs: default_auth_timeout(),
            poll: PollConfig::default(),
            token: TokenConfig::default(),
            seed_account: None,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_secs: default_interval(),
            grace_secs: default_grace(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            decimals: default_decimals(),
            symbol: default_symbol(),
        }
    }
}

impl HarnessConfig {
    /// Loads configuration from a YAML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: HarnessConfig = serde_yaml::from_str(&raw)?;
        debug!(base_url = %config.base_url, "loaded harness config");
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".into()));
        }
        if self.poll.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "poll.max_attempts must be at least 1".into(),
            ));
        }
        if self.token.decimals > 28 {
            return Err(ConfigError::Invalid(format!(
                "token.decimals {} exceeds exact-decimal range (max 28)",
                self.token.decimals
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_backend_profile() {
        let config = HarnessConfig::default();
        assert_eq!(config.poll.max_attempts, 6);
        assert_eq!(config.poll.interval_secs, 5);
        assert_eq!(config.token.decimals, 18);
        assert_eq!(config.token.symbol, "QXB");
        assert!(config.seed_account.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn loads_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "base_url: http://ledger.test:9090\nseed_account:\n  email: funded@qq.com\n  password: \"123456\"\n"
        )
        .unwrap();

        let config = HarnessConfig::from_path(file.path()).unwrap();
        assert_eq!(config.base_url, "http://ledger.test:9090");
        let seed = config.seed_account.unwrap();
        assert_eq!(seed.email, "funded@qq.com");
        assert_eq!(seed.group, "seed");
        // Untouched sections keep defaults.
        assert_eq!(config.poll.grace_secs, 2);
    }

    #[test]
    fn rejects_zero_attempts() {
        let config: HarnessConfig =
            serde_yaml::from_str("poll:\n  max_attempts: 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_out_of_range_decimals() {
        let config: HarnessConfig = serde_yaml::from_str("token:\n  decimals: 40\n").unwrap();
        assert!(config.validate().is_err());
    }
}
