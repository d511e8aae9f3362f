//! Per-invocation client state shared by the grant, association and
//! management operations.

use std::time::Duration;

use tracing::info;

use crate::constants::{DEFAULT_SCOPE, POLL_INTERVAL};
use crate::credentials::TokenStore;
use crate::error::Result;
use crate::grant::TokenGrant;
use crate::http::HttpClient;
use crate::settings::Settings;

/// Everything one command needs to talk to the authorization server.
///
/// The `mfa_token` of an in-progress flow is deliberately not stored here: it
/// is threaded through the flow functions and dropped with them.
pub struct MfaClient {
    pub(crate) http: HttpClient,
    pub(crate) settings: Settings,
    pub(crate) tokens: TokenStore,
    pub(crate) scope: String,
    pub(crate) audience: Option<String>,
    pub(crate) poll_interval: Duration,
}

impl MfaClient {
    pub fn new(http: HttpClient, settings: Settings, tokens: TokenStore) -> Self {
        Self {
            http,
            settings,
            tokens,
            scope: DEFAULT_SCOPE.to_owned(),
            audience: None,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Override the password grant audience (defaults to `https://{domain}/mfa/`).
    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.tokens
    }

    pub(crate) fn audience(&self) -> String {
        self.audience
            .clone()
            .unwrap_or_else(|| self.settings.mfa_audience())
    }

    /// Persist a granted token. Only called once a grant fully succeeded.
    pub(crate) async fn persist(&self, grant: &TokenGrant) -> Result<()> {
        self.tokens.save(&grant.access_token).await?;
        match grant.expires_in {
            Some(secs) => info!(expires_in_secs = secs, "got access token"),
            None => info!("got access token"),
        }
        Ok(())
    }
}
