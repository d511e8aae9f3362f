//! MFA grant state machine
//!
//! ```text
//! CheckStoredToken ──valid──▶ done
//!        │ missing/invalid
//!        ▼
//! PasswordGrant ──access_token──▶ persist
//!        │ mfa_required            other error ──▶ failed
//!        ▼
//! Challenge ──association_required──▶ association flow
//!        │ otp | oob
//!        ▼
//! StrongAuthGrant ──authorization_pending──▶ sleep, same request again
//!        │ access_token            other error ──▶ failed
//!        ▼
//!     persist
//! ```
//!
//! Server-reported errors end the flow as [`LoginOutcome::Failed`]; only
//! transport and local failures are returned as `Err`. Nothing is persisted
//! unless the last step produced an access token.

use std::fmt;

use tracing::{info, instrument};

use crate::client::MfaClient;
use crate::constants::CHALLENGE_TYPES;
use crate::error::Result;
use crate::grant::{
    self, ApiError, Challenge, ChallengeOutcome, GrantOutcome, GrantResponse, TokenGrant,
};
use crate::poll;
use crate::prompt::{self, Credentials, Prompter};

/// Why a grant flow stopped without a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowFailure {
    PasswordGrant(ApiError),
    Challenge(ApiError),
    StrongAuth(ApiError),
    Association(ApiError),
    /// A response lacked the fields needed to continue.
    Malformed(&'static str),
}

impl fmt::Display for FlowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowFailure::PasswordGrant(e) => write!(f, "password grant failed: {e}"),
            FlowFailure::Challenge(e) => write!(f, "MFA challenge failed: {e}"),
            FlowFailure::StrongAuth(e) => write!(f, "strong authentication grant failed: {e}"),
            FlowFailure::Association(e) => write!(f, "authenticator association failed: {e}"),
            FlowFailure::Malformed(what) => write!(f, "malformed response: {what}"),
        }
    }
}

/// Result of a login or association flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The persisted token passed validation; no grant was attempted.
    StoredToken(String),
    /// A new token was granted and persisted.
    Granted(TokenGrant),
    Failed(FlowFailure),
}

impl LoginOutcome {
    pub fn access_token(&self) -> Option<&str> {
        match self {
            LoginOutcome::StoredToken(token) => Some(token),
            LoginOutcome::Granted(grant) => Some(&grant.access_token),
            LoginOutcome::Failed(_) => None,
        }
    }
}

impl MfaClient {
    /// True iff `/userinfo` accepts the token. Never touches the token store.
    pub async fn validate_stored_token(&self, access_token: &str) -> bool {
        grant::validate_token(&self.http, &self.settings, access_token).await
    }

    /// Reuse the stored token if it still validates, otherwise run the
    /// password + MFA grant.
    #[instrument(skip_all, fields(domain = %self.settings.domain))]
    pub async fn login(&self, prompter: &dyn Prompter) -> Result<LoginOutcome> {
        if let Some(token) = self.tokens.load().await? {
            if self.validate_stored_token(&token).await {
                info!("found valid access token in storage, using that");
                return Ok(LoginOutcome::StoredToken(token));
            }
            info!("stored access token is no longer valid");
        }

        info!("performing a resource owner password credentials grant");
        let credentials = prompt::credentials(prompter)?;
        self.authenticate(&credentials, prompter).await
    }

    /// The grant proper, starting from the password grant.
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
        prompter: &dyn Prompter,
    ) -> Result<LoginOutcome> {
        let audience = self.audience();
        let response = grant::password_grant(
            &self.http,
            &self.settings,
            credentials,
            &self.scope,
            Some(&audience),
        )
        .await?;

        let mfa_token = match response.outcome() {
            GrantOutcome::Token(token) => {
                info!("logged in, MFA is disabled for this user");
                self.persist(&token).await?;
                return Ok(LoginOutcome::Granted(token));
            }
            GrantOutcome::MfaRequired { mfa_token } => mfa_token,
            GrantOutcome::Rejected(e) => {
                return Ok(LoginOutcome::Failed(FlowFailure::PasswordGrant(e)));
            }
            GrantOutcome::Pending => {
                return Ok(LoginOutcome::Failed(FlowFailure::Malformed(
                    "password grant answered authorization_pending",
                )));
            }
            GrantOutcome::Malformed => {
                return Ok(LoginOutcome::Failed(FlowFailure::Malformed(
                    "password grant returned neither a token nor an mfa_token",
                )));
            }
        };

        info!("MFA required, got MFA token");
        let challenge =
            grant::challenge(&self.http, &self.settings, &mfa_token, CHALLENGE_TYPES).await?;

        let challenge = match challenge.outcome() {
            ChallengeOutcome::Challenge(challenge) => challenge,
            ChallengeOutcome::AssociationRequired => {
                info!("an authenticator must be associated to continue, starting association");
                return self.associate_new(&mfa_token, prompter).await;
            }
            ChallengeOutcome::Rejected(e) => {
                return Ok(LoginOutcome::Failed(FlowFailure::Challenge(e)));
            }
            ChallengeOutcome::Malformed => {
                return Ok(LoginOutcome::Failed(FlowFailure::Malformed(
                    "challenge response has no usable challenge_type",
                )));
            }
        };

        info!(challenge_type = %challenge.challenge_type, "selected MFA type");
        self.confirm(&mfa_token, &challenge, prompter).await
    }

    /// Strong-auth grant, repeated while the server reports
    /// `authorization_pending`. Persists the token on success.
    pub(crate) async fn confirm(
        &self,
        mfa_token: &str,
        challenge: &Challenge,
        prompter: &dyn Prompter,
    ) -> Result<LoginOutcome> {
        let http = &self.http;
        let settings = &self.settings;
        let response = poll::retry_while(
            move || grant::strong_auth_grant(http, settings, mfa_token, challenge, prompter),
            GrantResponse::is_pending,
            self.poll_interval,
        )
        .await?;

        match response.outcome() {
            GrantOutcome::Token(token) => {
                self.persist(&token).await?;
                Ok(LoginOutcome::Granted(token))
            }
            GrantOutcome::Rejected(e) => Ok(LoginOutcome::Failed(FlowFailure::StrongAuth(e))),
            GrantOutcome::MfaRequired { .. } | GrantOutcome::Pending | GrantOutcome::Malformed => {
                Ok(LoginOutcome::Failed(FlowFailure::Malformed(
                    "strong authentication grant returned no access_token",
                )))
            }
        }
    }

    /// Stored token for the management API, logging in first when there is
    /// none. `None` when the login flow failed.
    pub async fn access_token(&self, prompter: &dyn Prompter) -> Result<Option<String>> {
        if let Some(token) = self.tokens.load().await? {
            return Ok(Some(token));
        }
        info!("to use the authenticator API you must be logged in, attempting to log in");
        let outcome = self.login(prompter).await?;
        Ok(outcome.access_token().map(str::to_owned))
    }
}
