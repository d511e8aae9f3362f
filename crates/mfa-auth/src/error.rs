//! Error types for MFA client operations
//!
//! Server-reported grant errors (`mfa_required`, `invalid_grant`, ...) are not
//! errors here: they are classified into outcomes and drive the flow. This enum
//! covers transport failures, failed management calls, and local problems.

/// Errors from MFA client operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("encoding error: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Whether the CLI should report this error and still exit successfully.
    ///
    /// Network and server failures are expected outcomes of a demo client talking
    /// to a live tenant; local I/O and prompt failures are not.
    pub fn is_reportable(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::Api { .. } | Error::UnexpectedResponse(_)
        )
    }
}

/// Result alias for MFA client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_and_server_errors_are_reportable() {
        assert!(Error::Http("connection refused".into()).is_reportable());
        assert!(
            Error::Api {
                status: 403,
                message: "insufficient_scope".into()
            }
            .is_reportable()
        );
        assert!(Error::UnexpectedResponse("missing id".into()).is_reportable());
    }

    #[test]
    fn local_failures_are_not_reportable() {
        assert!(!Error::Io("disk full".into()).is_reportable());
        assert!(!Error::Prompt("input closed".into()).is_reportable());
        assert!(!Error::InvalidSettings("empty domain".into()).is_reportable());
        assert!(!Error::Encode("encoding body: key must be a string".into()).is_reportable());
    }

    #[test]
    fn api_error_display_includes_status() {
        let err = Error::Api {
            status: 401,
            message: "invalid_token".into(),
        };
        assert_eq!(err.to_string(), "server returned 401: invalid_token");
    }

    #[test]
    fn encode_error_display() {
        let err = Error::Encode("serializing settings: key must be a string".into());
        assert_eq!(
            err.to_string(),
            "encoding error: serializing settings: key must be a string"
        );
    }
}
