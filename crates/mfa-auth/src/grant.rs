//! Token endpoint and challenge endpoint requests
//!
//! Three requests make up the MFA grant:
//! 1. Password grant: `POST /oauth/token` with `grant_type=password`
//! 2. Challenge: `POST /mfa/challenge` with the `mfa_token` from step 1
//! 3. Strong-auth grant: `POST /oauth/token` with an MFA grant type
//!
//! Responses are decoded into one canonical shape per endpoint and classified
//! into outcomes the flow branches on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::constants::{
    CHALLENGE_PATH, MFA_OOB_GRANT, MFA_OTP_GRANT, PASSWORD_GRANT, TOKEN_PATH, USERINFO_PATH,
    error_codes,
};
use crate::error::{Error, Result};
use crate::http::{ApiRequest, HttpClient};
use crate::prompt::{self, Credentials, Prompter};
use crate::settings::Settings;

/// Body returned by `/oauth/token`, successful or not.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GrantResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    /// Seconds until the access token expires
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub mfa_token: Option<String>,
}

/// A server-reported OAuth error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub error: String,
    pub description: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{}: {description}", self.error),
            None => f.write_str(&self.error),
        }
    }
}

/// Access token granted by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: Option<u64>,
}

/// Classification of a [`GrantResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    Token(TokenGrant),
    MfaRequired { mfa_token: String },
    /// Out-of-band confirmation has not happened yet.
    Pending,
    Rejected(ApiError),
    /// Neither a token, an error, nor an MFA token.
    Malformed,
}

impl GrantResponse {
    pub fn is_pending(&self) -> bool {
        self.error.as_deref() == Some(error_codes::AUTHORIZATION_PENDING)
    }

    /// `access_token` wins over everything else; any error other than
    /// `mfa_required`/`authorization_pending` is terminal.
    pub fn outcome(self) -> GrantOutcome {
        if let Some(access_token) = self.access_token {
            return GrantOutcome::Token(TokenGrant {
                access_token,
                expires_in: self.expires_in,
            });
        }
        match self.error {
            Some(ref error) if error == error_codes::AUTHORIZATION_PENDING => {
                return GrantOutcome::Pending;
            }
            Some(ref error) if error != error_codes::MFA_REQUIRED => {
                return GrantOutcome::Rejected(ApiError {
                    error: error.clone(),
                    description: self.error_description,
                });
            }
            _ => {}
        }
        match self.mfa_token {
            Some(mfa_token) => GrantOutcome::MfaRequired { mfa_token },
            None => GrantOutcome::Malformed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeType {
    Otp,
    Oob,
}

impl ChallengeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeType::Otp => "otp",
            ChallengeType::Oob => "oob",
        }
    }

    fn grant_type(&self) -> &'static str {
        match self {
            ChallengeType::Otp => MFA_OTP_GRANT,
            ChallengeType::Oob => MFA_OOB_GRANT,
        }
    }
}

impl FromStr for ChallengeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "otp" => Ok(ChallengeType::Otp),
            "oob" => Ok(ChallengeType::Oob),
            other => Err(Error::UnexpectedResponse(format!(
                "unknown challenge type {other:?}"
            ))),
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the operator proves possession of an OOB channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMethod {
    /// The server sent a code the operator must type back.
    Prompt,
    None,
}

impl BindingMethod {
    fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("prompt") => BindingMethod::Prompt,
            _ => BindingMethod::None,
        }
    }
}

/// Body returned by `/mfa/challenge`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChallengeResponse {
    #[serde(default)]
    pub challenge_type: Option<String>,
    #[serde(default)]
    pub binding_method: Option<String>,
    #[serde(default)]
    pub oob_code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Parameters of a strong-auth grant, from a challenge or an association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub challenge_type: ChallengeType,
    pub binding_method: BindingMethod,
    pub oob_code: Option<String>,
}

/// Classification of a [`ChallengeResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeOutcome {
    Challenge(Challenge),
    /// The user has no authenticator yet and must enroll one.
    AssociationRequired,
    Rejected(ApiError),
    Malformed,
}

impl ChallengeResponse {
    pub fn outcome(self) -> ChallengeOutcome {
        match self.error.as_deref() {
            Some(error_codes::ASSOCIATION_REQUIRED) => return ChallengeOutcome::AssociationRequired,
            Some(error) => {
                return ChallengeOutcome::Rejected(ApiError {
                    error: error.to_owned(),
                    description: self.error_description,
                });
            }
            None => {}
        }
        let Some(challenge_type) = self
            .challenge_type
            .as_deref()
            .and_then(|t| t.parse::<ChallengeType>().ok())
        else {
            return ChallengeOutcome::Malformed;
        };
        ChallengeOutcome::Challenge(Challenge {
            challenge_type,
            binding_method: BindingMethod::from_wire(self.binding_method.as_deref()),
            oob_code: self.oob_code,
        })
    }
}

/// Body of a strong-auth grant request.
#[derive(Debug, Serialize)]
pub struct StrongAuthRequest<'a> {
    pub mfa_token: &'a str,
    pub client_id: &'a str,
    pub grant_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oob_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding_code: Option<String>,
}

impl<'a> StrongAuthRequest<'a> {
    /// Build the request body, prompting for whatever code the challenge needs.
    pub fn build(
        settings: &'a Settings,
        mfa_token: &'a str,
        challenge: &'a Challenge,
        prompter: &dyn Prompter,
    ) -> Result<Self> {
        let mut request = Self {
            mfa_token,
            client_id: &settings.client_id,
            grant_type: challenge.challenge_type.grant_type(),
            otp: None,
            oob_code: None,
            binding_code: None,
        };

        match challenge.challenge_type {
            ChallengeType::Otp => {
                info!("MFA mechanism is: TOTP");
                request.otp = Some(prompt::code(prompter)?);
            }
            ChallengeType::Oob => {
                request.oob_code = challenge.oob_code.as_deref();
                if challenge.binding_method == BindingMethod::Prompt {
                    info!("MFA mechanism is: OOB with binding code prompt");
                    request.binding_code = Some(prompt::code(prompter)?);
                } else {
                    info!("MFA mechanism is: OOB without binding code");
                }
            }
        }
        Ok(request)
    }
}

fn to_body<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::Encode(format!("encoding body: {e}")))
}

/// Probe `/userinfo` with the token. Any failure means "not valid".
pub async fn validate_token(http: &HttpClient, settings: &Settings, access_token: &str) -> bool {
    let request = ApiRequest::get(settings.endpoint(USERINFO_PATH)).bearer(access_token);
    match http.send(&request).await {
        Ok(response) if response.is_success() => true,
        Ok(response) => {
            debug!(status = response.status.as_u16(), "stored token rejected by /userinfo");
            false
        }
        Err(e) => {
            debug!(error = %e, "token validation request failed");
            false
        }
    }
}

/// Resource owner password credentials grant.
pub async fn password_grant(
    http: &HttpClient,
    settings: &Settings,
    credentials: &Credentials,
    scope: &str,
    audience: Option<&str>,
) -> Result<GrantResponse> {
    let mut body = serde_json::json!({
        "grant_type": PASSWORD_GRANT,
        "username": credentials.username,
        "password": credentials.password.expose(),
        "scope": scope,
        "client_id": settings.client_id,
    });
    if let Some(audience) = audience {
        body["audience"] = Value::String(audience.to_owned());
    }

    let response = http
        .send(&ApiRequest::post(settings.endpoint(TOKEN_PATH), body))
        .await?;
    response.parse()
}

/// Ask the server which of `challenge_types` (space separated) to use.
pub async fn challenge(
    http: &HttpClient,
    settings: &Settings,
    mfa_token: &str,
    challenge_types: &str,
) -> Result<ChallengeResponse> {
    let body = serde_json::json!({
        "mfa_token": mfa_token,
        "challenge_type": challenge_types,
        "client_id": settings.client_id,
    });
    let response = http
        .send(&ApiRequest::post(settings.endpoint(CHALLENGE_PATH), body))
        .await?;
    response.parse()
}

/// Strong-auth grant for a challenge, prompting for codes as needed.
pub async fn strong_auth_grant(
    http: &HttpClient,
    settings: &Settings,
    mfa_token: &str,
    challenge: &Challenge,
    prompter: &dyn Prompter,
) -> Result<GrantResponse> {
    let request = StrongAuthRequest::build(settings, mfa_token, challenge, prompter)?;
    let response = http
        .send(&ApiRequest::post(
            settings.endpoint(TOKEN_PATH),
            to_body(&request)?,
        ))
        .await?;
    response.parse()
}
