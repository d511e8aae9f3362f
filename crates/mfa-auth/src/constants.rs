//! Protocol constants for the Auth0-style MFA endpoints
//!
//! Grant type identifiers are opaque strings the authorization server matches
//! verbatim in `grant_type`.

use std::time::Duration;

/// Resource owner password credentials grant
pub const PASSWORD_GRANT: &str = "password";

/// Strong authentication grant using a one-time password
pub const MFA_OTP_GRANT: &str = "http://auth0.com/oauth/grant-type/mfa-otp";

/// Strong authentication grant using an out-of-band code
pub const MFA_OOB_GRANT: &str = "http://auth0.com/oauth/grant-type/mfa-oob";

/// Scope requested by the password grant. `enroll`, `read:authenticators` and
/// `remove:authenticators` are what the authenticator management API checks.
pub const DEFAULT_SCOPE: &str = "openid profile enroll read:authenticators remove:authenticators";

/// Challenge types offered to `/mfa/challenge`, space separated.
pub const CHALLENGE_TYPES: &str = "otp oob";

/// Delay between strong-auth attempts while the server answers
/// `authorization_pending`.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Authenticators whose id contains this marker are never bulk-deleted.
pub const RECOVERY_CODE_MARKER: &str = "recovery-code";

/// Chart service used to render the enrollment barcode as a QR image URL.
pub const QR_CHART_ENDPOINT: &str = "https://chart.googleapis.com/chart";

pub const TOKEN_PATH: &str = "/oauth/token";
pub const CHALLENGE_PATH: &str = "/mfa/challenge";
pub const ASSOCIATE_PATH: &str = "/mfa/associate";
pub const AUTHENTICATORS_PATH: &str = "/mfa/authenticators";
pub const USERINFO_PATH: &str = "/userinfo";

/// Server error codes that drive the grant state machine.
pub mod error_codes {
    pub const MFA_REQUIRED: &str = "mfa_required";
    pub const AUTHORIZATION_PENDING: &str = "authorization_pending";
    pub const ASSOCIATION_REQUIRED: &str = "association_required";
}
