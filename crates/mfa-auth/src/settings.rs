//! Tenant settings: authorization server domain and client ID
//!
//! Stored as a small JSON file (`{"domain": ..., "clientId": ...}`) created by
//! interactive setup and read by every other command.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::credentials::write_atomic;
use crate::error::{Error, Result};
use crate::prompt::{Prompter, non_empty};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub domain: String,
    #[serde(rename = "clientId")]
    pub client_id: String,
}

impl Settings {
    /// Validate and build settings. The domain may carry an explicit
    /// `http://`/`https://` scheme; a bare host means HTTPS.
    pub fn new(domain: impl Into<String>, client_id: impl Into<String>) -> Result<Self> {
        let settings = Self {
            domain: domain.into().trim().trim_end_matches('/').to_owned(),
            client_id: client_id.into().trim().to_owned(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.domain.is_empty() {
            return Err(Error::InvalidSettings("domain must not be empty".into()));
        }
        if self.domain.chars().any(char::is_whitespace) {
            return Err(Error::InvalidSettings(format!(
                "domain must be a host name, got: {:?}",
                self.domain
            )));
        }
        if self.client_id.is_empty() {
            return Err(Error::InvalidSettings("client ID must not be empty".into()));
        }
        Ok(())
    }

    /// `https://{domain}` unless the domain already names a scheme.
    pub fn base_url(&self) -> String {
        if self.domain.starts_with("http://") || self.domain.starts_with("https://") {
            self.domain.clone()
        } else {
            format!("https://{}", self.domain)
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url())
    }

    /// Audience of the MFA authenticator management API.
    pub fn mfa_audience(&self) -> String {
        self.endpoint("/mfa/")
    }
}

/// JSON settings file.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the settings file.
    ///
    /// A missing, unparsable or invalid file yields `None` so the caller can
    /// run setup again.
    pub async fn load(&self) -> Result<Option<Settings>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(format!("reading settings file: {e}"))),
        };

        match serde_json::from_str::<Settings>(&contents) {
            Ok(settings) if settings.validate().is_ok() => Ok(Some(settings)),
            Ok(_) => {
                warn!(path = %self.path.display(), "settings file has empty fields, ignoring it");
                Ok(None)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "settings file is not valid JSON, ignoring it");
                Ok(None)
            }
        }
    }

    pub async fn save(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| Error::Encode(format!("serializing settings: {e}")))?;
        write_atomic(&self.path, json.as_bytes()).await?;
        info!(path = %self.path.display(), "saved settings");
        Ok(())
    }

    /// Ask the operator for the domain and client ID, then persist them.
    pub async fn setup(&self, prompter: &dyn Prompter) -> Result<Settings> {
        let settings = loop {
            let domain = prompter.input_validated("Please enter your Auth0 Domain", &non_empty)?;
            let client_id =
                prompter.input_validated("Please enter your Auth0 client ID", &non_empty)?;
            match Settings::new(domain, client_id) {
                Ok(settings) => break settings,
                Err(e) => prompter.show(&e.to_string()),
            }
        };
        self.save(&settings).await?;
        Ok(settings)
    }

    /// Load the settings, running setup when there are none.
    pub async fn load_or_setup(&self, prompter: &dyn Prompter) -> Result<Settings> {
        match self.load().await? {
            Some(settings) => Ok(settings),
            None => {
                info!("no usable settings found, starting setup");
                self.setup(prompter).await
            }
        }
    }
}
