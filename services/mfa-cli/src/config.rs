//! CLI configuration
//!
//! Precedence: `--config` flag > `MFA_CLI_CONFIG` env var > `./oauth2-mfa-cli.toml`
//! > built-in defaults. The file is optional: without one the CLI behaves like
//! the classic demo, keeping `.settings` and `.access-token` in the working
//! directory. Tenant settings (domain, client ID) are not part of this file;
//! they are created interactively by `setup`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mfa_auth::constants::{DEFAULT_SCOPE, POLL_INTERVAL};

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "oauth2-mfa-cli.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub grant: GrantConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where persisted state lives
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_settings_file")]
    pub settings_file: PathBuf,
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
}

/// Password grant and polling parameters
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantConfig {
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Defaults to `https://{domain}/mfa/`
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Per-request HTTP timeout. Does not bound the OOB polling loop.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_settings_file() -> PathBuf {
    PathBuf::from(".settings")
}

fn default_token_file() -> PathBuf {
    PathBuf::from(".access-token")
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_owned()
}

fn default_poll_interval() -> u64 {
    POLL_INTERVAL.as_secs()
}

fn default_timeout() -> u64 {
    30
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            settings_file: default_settings_file(),
            token_file: default_token_file(),
        }
    }
}

impl Default for GrantConfig {
    fn default() -> Self {
        Self {
            scope: default_scope(),
            audience: None,
            poll_interval_secs: default_poll_interval(),
            timeout_secs: default_timeout(),
        }
    }
}

impl GrantConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the explicitly requested file, else the default file if present,
    /// else defaults. An explicit path that does not exist is an error.
    pub fn load_or_default(explicit: Option<&Path>) -> common::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Self::load(default_path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> common::Result<()> {
        if self.grant.scope.trim().is_empty() {
            return Err(common::Error::Config("scope must not be empty".into()));
        }

        if self.grant.poll_interval_secs == 0 {
            return Err(common::Error::Config(
                "poll_interval_secs must be greater than 0".into(),
            ));
        }

        if self.grant.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if let Some(audience) = &self.grant.audience
            && !audience.starts_with("http://")
            && !audience.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "audience must start with http:// or https://, got: {audience}"
            )));
        }

        Ok(())
    }
}
