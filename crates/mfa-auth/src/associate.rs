//! Authenticator association (enrollment)
//!
//! `POST /mfa/associate` registers a new authenticator in a pending state.
//! The enrollment is confirmed with the same strong-auth grant used for login:
//! for OTP the operator types a code from the freshly scanned authenticator,
//! for OOB the server sends a push/SMS/email and the grant is polled.
//!
//! The bearer is either an access token (explicit `associate new`) or the
//! `mfa_token` of a login flow that hit `association_required`.

use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::client::MfaClient;
use crate::constants::{ASSOCIATE_PATH, QR_CHART_ENDPOINT};
use crate::error::Result;
use crate::flow::{FlowFailure, LoginOutcome};
use crate::grant::{ApiError, BindingMethod, Challenge, ChallengeType};
use crate::http::{ApiRequest, ApiResponse};
use crate::prompt::{Prompter, non_empty};

/// Delivery channel of an out-of-band authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OobChannel {
    Sms { phone_number: String },
    Email { email: String },
    /// Push notifications through the Guardian app.
    Auth0,
}

impl OobChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OobChannel::Sms { .. } => "sms",
            OobChannel::Email { .. } => "email",
            OobChannel::Auth0 => "auth0",
        }
    }
}

/// What the operator asked to enroll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationRequest {
    Otp,
    Oob(OobChannel),
}

const TYPE_CHOICES: &[&str] = &["otp", "oob"];
const CHANNEL_CHOICES: &[&str] = &["sms", "email", "auth0"];

/// Loose phone number check: anything with a digit or a `+` in it. The server
/// does the real validation.
pub fn is_phone_number(input: &str) -> bool {
    input.chars().any(|c| c.is_ascii_digit() || c == '+')
}

impl AssociationRequest {
    /// Ask the operator which authenticator to enroll.
    pub fn prompt(prompter: &dyn Prompter) -> Result<Self> {
        let kind = prompter.select(
            "What type of MFA mechanism would you like to enable?",
            TYPE_CHOICES,
        )?;
        if TYPE_CHOICES[kind] == "otp" {
            return Ok(AssociationRequest::Otp);
        }

        let channel = prompter.select(
            "What type of OOB authenticator would you like to use?",
            CHANNEL_CHOICES,
        )?;
        let channel = match CHANNEL_CHOICES[channel] {
            "sms" => OobChannel::Sms {
                phone_number: prompter
                    .input_validated(
                        "Please enter your cellphone number (only numbers and plus sign)",
                        &is_phone_number,
                    )?
                    .trim()
                    .to_owned(),
            },
            "email" => OobChannel::Email {
                email: prompter
                    .input_validated("Please enter your e-mail address", &non_empty)?
                    .trim()
                    .to_owned(),
            },
            _ => OobChannel::Auth0,
        };
        Ok(AssociationRequest::Oob(channel))
    }

    pub fn challenge_type(&self) -> ChallengeType {
        match self {
            AssociationRequest::Otp => ChallengeType::Otp,
            AssociationRequest::Oob(_) => ChallengeType::Oob,
        }
    }

    /// SMS enrollments are confirmed with the code the operator received.
    pub fn binding_method(&self) -> BindingMethod {
        match self {
            AssociationRequest::Oob(OobChannel::Sms { .. }) => BindingMethod::Prompt,
            _ => BindingMethod::None,
        }
    }

    pub fn body(&self) -> Value {
        let mut body = json!({ "authenticator_types": [self.challenge_type().as_str()] });
        if let AssociationRequest::Oob(channel) = self {
            body["oob_channels"] = json!([channel.as_str()]);
            match channel {
                OobChannel::Sms { phone_number } => body["phone_number"] = json!(phone_number),
                OobChannel::Email { email } => body["email"] = json!(email),
                OobChannel::Auth0 => {}
            }
        }
        body
    }
}

/// Body returned by a successful `/mfa/associate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssociationResponse {
    #[serde(default)]
    pub authenticator_type: Option<String>,
    #[serde(default)]
    pub oob_code: Option<String>,
    #[serde(default)]
    pub barcode_uri: Option<String>,
    #[serde(default)]
    pub recovery_codes: Option<Vec<String>>,
}

/// QR image URL for an `otpauth://` barcode URI.
///
/// The URI embeds the TOTP secret, so sending it to a third-party chart
/// service is only acceptable for a demo tenant.
pub fn qr_chart_url(barcode_uri: &str) -> String {
    Url::parse_with_params(
        QR_CHART_ENDPOINT,
        &[
            ("chs", "166x166"),
            ("chld", "L|0"),
            ("cht", "qr"),
            ("chl", barcode_uri),
        ],
    )
    .map(String::from)
    .unwrap_or_else(|_| QR_CHART_ENDPOINT.to_owned())
}

fn association_error(response: ApiResponse) -> ApiError {
    let field = |key: &str| {
        response
            .body
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_owned)
    };
    ApiError {
        error: field("error").unwrap_or_else(|| format!("http_{}", response.status.as_u16())),
        description: field("error_description").or_else(|| field("message")),
    }
}

impl MfaClient {
    /// Prompt for an authenticator, enroll it and confirm the enrollment.
    pub async fn associate_new(&self, bearer: &str, prompter: &dyn Prompter) -> Result<LoginOutcome> {
        let request = AssociationRequest::prompt(prompter)?;
        self.associate(bearer, &request, prompter).await
    }

    /// Enroll `request` and confirm it. A confirmed enrollment persists the
    /// returned access token.
    #[instrument(skip_all, fields(authenticator_type = %request.challenge_type()))]
    pub async fn associate(
        &self,
        bearer: &str,
        request: &AssociationRequest,
        prompter: &dyn Prompter,
    ) -> Result<LoginOutcome> {
        let response = self
            .http
            .send(
                &ApiRequest::post(self.settings.endpoint(ASSOCIATE_PATH), request.body())
                    .bearer(bearer),
            )
            .await?;

        if !response.is_success() {
            return Ok(LoginOutcome::Failed(FlowFailure::Association(
                association_error(response),
            )));
        }
        let association: AssociationResponse = match response.parse() {
            Ok(association) => association,
            Err(_) => {
                return Ok(LoginOutcome::Failed(FlowFailure::Malformed(
                    "association response is not a JSON object",
                )));
            }
        };

        prompter.show("Authenticator partially associated, confirmation required.");
        if let Some(kind) = &association.authenticator_type {
            prompter.show(&format!("- Authenticator type: {kind}"));
        }
        if let Some(barcode_uri) = &association.barcode_uri {
            prompter.show(&format!("- Barcode/QR URL: {barcode_uri}"));
            prompter.show(&format!(
                "Use this URL in your browser:\n\n{}\n",
                qr_chart_url(barcode_uri)
            ));
        }
        if let Some(codes) = &association.recovery_codes {
            prompter.show(&format!("- Recovery codes: {}", codes.join(", ")));
        }

        let challenge = Challenge {
            challenge_type: request.challenge_type(),
            binding_method: request.binding_method(),
            oob_code: association.oob_code,
        };
        let outcome = self.confirm(bearer, &challenge, prompter).await?;
        if let LoginOutcome::Granted(_) = outcome {
            info!("association confirmed");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::TokenStore;
    use crate::http::HttpClient;
    use crate::testing::{MockServer, ScriptedPrompter};
    use std::time::{Duration, Instant};

    async fn client(server: &MockServer, dir: &tempfile::TempDir) -> MfaClient {
        MfaClient::new(
            HttpClient::new(reqwest::Client::new()),
            server.settings(),
            TokenStore::new(dir.path().join(".access-token")),
        )
        .with_poll_interval(Duration::from_millis(50))
    }

    #[test]
    fn phone_validation() {
        assert!(is_phone_number("+15551234567"));
        assert!(is_phone_number(" 5551234 "));
        assert!(is_phone_number("555-1234"));
        assert!(is_phone_number("+1 555 1234"));
        assert!(is_phone_number("+"));
        assert!(!is_phone_number(""));
        assert!(!is_phone_number("call me"));
    }

    #[test]
    fn prompt_collects_channel_details() {
        let prompter = ScriptedPrompter::new(&["oob", "sms", "nope", "+15551234567"]);
        let request = AssociationRequest::prompt(&prompter).unwrap();
        assert_eq!(
            request,
            AssociationRequest::Oob(OobChannel::Sms {
                phone_number: "+15551234567".into()
            })
        );
        assert_eq!(request.binding_method(), BindingMethod::Prompt);

        let prompter = ScriptedPrompter::new(&["oob", "email", "", "a@example.com"]);
        let request = AssociationRequest::prompt(&prompter).unwrap();
        assert_eq!(request.binding_method(), BindingMethod::None);
        assert_eq!(request.body()["email"], "a@example.com");
    }

    #[test]
    fn request_bodies() {
        assert_eq!(
            AssociationRequest::Otp.body(),
            json!({"authenticator_types": ["otp"]})
        );
        assert_eq!(
            AssociationRequest::Oob(OobChannel::Sms {
                phone_number: "+1555".into()
            })
            .body(),
            json!({"authenticator_types": ["oob"], "oob_channels": ["sms"], "phone_number": "+1555"})
        );
        assert_eq!(
            AssociationRequest::Oob(OobChannel::Auth0).body(),
            json!({"authenticator_types": ["oob"], "oob_channels": ["auth0"]})
        );
    }

    #[test]
    fn qr_url_escapes_barcode() {
        let url = qr_chart_url("otpauth://totp/tenant:alice?secret=ABC&issuer=tenant");
        assert!(url.starts_with("https://chart.googleapis.com/chart?chs=166x166"));
        assert!(url.contains("chl=otpauth%3A%2F%2Ftotp%2Ftenant%3Aalice%3Fsecret%3DABC%26issuer%3Dtenant"));
    }

    #[tokio::test]
    async fn oob_association_polls_once_then_persists() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let client = client(&server, &dir).await;
        server.respond(
            "POST",
            "/mfa/associate",
            200,
            json!({"authenticator_type": "oob", "oob_code": "oob1", "barcode_uri": "https://x"}),
        );
        server.respond(
            "POST",
            "/oauth/token",
            400,
            json!({"error": "authorization_pending"}),
        );
        server.respond("POST", "/oauth/token", 200, json!({"access_token": "tok2"}));
        let prompter = ScriptedPrompter::new(&[]);

        let started = Instant::now();
        let outcome = client
            .associate(
                "access",
                &AssociationRequest::Oob(OobChannel::Auth0),
                &prompter,
            )
            .await
            .unwrap();

        assert_eq!(outcome.access_token(), Some("tok2"));
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(server.hits("POST", "/oauth/token"), 2);
        for grant in server.requests().iter().filter(|r| r.path == "/oauth/token") {
            assert_eq!(grant.body["oob_code"], "oob1");
            assert_eq!(grant.body["mfa_token"], "access");
        }
        assert_eq!(
            client.token_store().load().await.unwrap().as_deref(),
            Some("tok2")
        );
        let shown = prompter.shown().join("\n");
        assert!(shown.contains("- Authenticator type: oob"));
        assert!(shown.contains("- Barcode/QR URL: https://x"));
    }

    #[tokio::test]
    async fn association_rejection_aborts_without_confirmation() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let client = client(&server, &dir).await;
        server.respond(
            "POST",
            "/mfa/associate",
            401,
            json!({"error": "invalid_token", "error_description": "Expired token"}),
        );
        let prompter = ScriptedPrompter::new(&[]);

        let outcome = client
            .associate("expired", &AssociationRequest::Otp, &prompter)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            LoginOutcome::Failed(FlowFailure::Association(ApiError {
                error: "invalid_token".into(),
                description: Some("Expired token".into()),
            }))
        );
        assert_eq!(server.hits("POST", "/oauth/token"), 0);
        assert!(client.token_store().load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sms_association_prompts_for_binding_code() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let client = client(&server, &dir).await;
        server.respond(
            "POST",
            "/mfa/associate",
            200,
            json!({"oob_code": "oob-sms", "recovery_codes": ["R1", "R2"]}),
        );
        server.respond("POST", "/oauth/token", 200, json!({"access_token": "tok3"}));
        let prompter = ScriptedPrompter::new(&["oob", "sms", "+15551234567", "424242"]);

        let outcome = client.associate_new("access", &prompter).await.unwrap();

        assert_eq!(outcome.access_token(), Some("tok3"));
        let requests = server.requests();
        assert_eq!(requests[0].body["phone_number"], "+15551234567");
        assert_eq!(requests[0].body["oob_channels"][0], "sms");
        assert_eq!(requests[1].body["binding_code"], "424242");
        assert!(
            prompter
                .shown()
                .iter()
                .any(|line| line == "- Recovery codes: R1, R2")
        );
    }

    #[tokio::test]
    async fn confirmation_without_token_fails() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let client = client(&server, &dir).await;
        server.respond("POST", "/mfa/associate", 200, json!({"oob_code": "o"}));
        server.respond("POST", "/oauth/token", 200, json!({"token_type": "Bearer"}));
        let prompter = ScriptedPrompter::new(&[]);

        let outcome = client
            .associate("access", &AssociationRequest::Oob(OobChannel::Auth0), &prompter)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            LoginOutcome::Failed(FlowFailure::Malformed(_))
        ));
        assert!(client.token_store().load().await.unwrap().is_none());
    }
}
