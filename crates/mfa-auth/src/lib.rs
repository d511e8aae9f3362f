//! OAuth 2.0 password grant with multi-factor authentication
//!
//! Client side of the Auth0-style MFA API: password grant, MFA challenge,
//! strong-auth grants (OTP and out-of-band with polling), authenticator
//! association, and authenticator management. The crate owns the protocol
//! and the flow logic; the binary supplies the terminal prompter and
//! configuration.
//!
//! Login flow:
//! 1. `MfaClient::login` checks the stored token against `/userinfo`
//! 2. Password grant via `grant::password_grant`
//! 3. On `mfa_required`, `grant::challenge` picks OTP or OOB
//! 4. `grant::strong_auth_grant`, repeated by `poll::retry_while` while pending
//! 5. On `association_required`, `MfaClient::associate_new` enrolls first
//! 6. The granted token is saved with `credentials::TokenStore::save`

pub mod associate;
pub mod authenticators;
pub mod client;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod flow;
pub mod grant;
pub mod http;
pub mod poll;
pub mod prompt;
pub mod settings;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use associate::{AssociationRequest, OobChannel};
pub use authenticators::{Authenticator, DeleteAllReport};
pub use client::MfaClient;
pub use credentials::TokenStore;
pub use error::{Error, Result};
pub use flow::{FlowFailure, LoginOutcome};
pub use grant::{ApiError, ChallengeType, GrantResponse, TokenGrant};
pub use http::{ApiRequest, ApiResponse, HttpClient, RequestPrinter};
pub use prompt::{Credentials, Prompter};
pub use settings::{Settings, SettingsStore};
