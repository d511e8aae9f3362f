//! Authenticator management API
//!
//! List and delete enrolled authenticators with an access token carrying the
//! `read:authenticators` / `remove:authenticators` scopes.

use futures_util::future::join_all;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use crate::client::MfaClient;
use crate::constants::{AUTHENTICATORS_PATH, RECOVERY_CODE_MARKER};
use crate::error::Result;
use crate::http::ApiRequest;

/// Characters left as-is in an id path segment (same set as JavaScript's
/// `encodeURIComponent`).
const ID_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// An enrolled authenticator. Everything except `id` is passed through as-is.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Authenticator {
    pub id: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Authenticator {
    pub fn is_recovery_code(&self) -> bool {
        self.id.contains(RECOVERY_CODE_MARKER)
    }
}

/// What a bulk delete did, per authenticator id.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteAllReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
    /// Recovery codes, never bulk-deleted.
    pub skipped: Vec<String>,
}

impl DeleteAllReport {
    pub fn attempted(&self) -> usize {
        self.deleted.len() + self.failed.len()
    }
}

impl MfaClient {
    fn authenticator_url(&self, id: &str) -> String {
        format!(
            "{}/{}",
            self.settings.endpoint(AUTHENTICATORS_PATH),
            utf8_percent_encode(id, ID_SEGMENT)
        )
    }

    pub async fn list_authenticators(&self, access_token: &str) -> Result<Vec<Authenticator>> {
        info!("getting list of authenticators");
        let response = self
            .http
            .send(&ApiRequest::get(self.settings.endpoint(AUTHENTICATORS_PATH)).bearer(access_token))
            .await?;
        if !response.is_success() {
            return Err(response.into_error());
        }
        response.parse()
    }

    /// Delete one authenticator. `Ok(false)` when the server answered
    /// anything but 204.
    pub async fn delete_authenticator(&self, access_token: &str, id: &str) -> Result<bool> {
        let response = self
            .http
            .send(&ApiRequest::delete(self.authenticator_url(id)).bearer(access_token))
            .await?;

        if response.status.as_u16() == 204 {
            info!(id, "deleted authenticator");
            Ok(true)
        } else {
            warn!(
                id,
                status = response.status.as_u16(),
                body = %response.body,
                "failed to delete authenticator"
            );
            Ok(false)
        }
    }

    /// Delete every authenticator except recovery codes.
    ///
    /// Deletes run concurrently and each settles on its own: a failed delete
    /// does not stop the others.
    #[instrument(skip_all)]
    pub async fn delete_all_authenticators(&self, access_token: &str) -> Result<DeleteAllReport> {
        let authenticators = self.list_authenticators(access_token).await?;

        let mut report = DeleteAllReport::default();
        let (skipped, targets): (Vec<_>, Vec<_>) = authenticators
            .into_iter()
            .partition(Authenticator::is_recovery_code);
        report.skipped = skipped.into_iter().map(|a| a.id).collect();

        info!(count = targets.len(), "deleting all authenticators");
        let results = join_all(
            targets
                .iter()
                .map(|a| self.delete_authenticator(access_token, &a.id)),
        )
        .await;

        for (authenticator, result) in targets.into_iter().zip(results) {
            match result {
                Ok(true) => report.deleted.push(authenticator.id),
                Ok(false) => report.failed.push(authenticator.id),
                Err(e) => {
                    warn!(id = %authenticator.id, error = %e, "delete request failed");
                    report.failed.push(authenticator.id);
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::TokenStore;
    use crate::error::Error;
    use crate::http::HttpClient;
    use crate::testing::MockServer;
    use serde_json::json;

    fn client(server: &MockServer, dir: &tempfile::TempDir) -> MfaClient {
        MfaClient::new(
            HttpClient::new(reqwest::Client::new()),
            server.settings(),
            TokenStore::new(dir.path().join(".access-token")),
        )
    }

    #[test]
    fn recovery_codes_are_recognised() {
        let a: Authenticator =
            serde_json::from_value(json!({"id": "recovery-code|dev_1", "active": true})).unwrap();
        assert!(a.is_recovery_code());
        assert_eq!(a.details["active"], true);
    }

    #[tokio::test]
    async fn list_passes_records_through() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        server.respond(
            "GET",
            "/mfa/authenticators",
            200,
            json!([{"id": "totp|dev_1", "authenticator_type": "otp", "active": true}]),
        );

        let list = client(&server, &dir)
            .list_authenticators("tok")
            .await
            .unwrap();

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "totp|dev_1");
        assert_eq!(list[0].details["authenticator_type"], "otp");
        assert_eq!(
            server.requests()[0].authorization.as_deref(),
            Some("Bearer tok")
        );
    }

    #[tokio::test]
    async fn list_failure_is_an_api_error() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        server.respond(
            "GET",
            "/mfa/authenticators",
            403,
            json!({"error": "insufficient_scope"}),
        );

        let err = client(&server, &dir)
            .list_authenticators("tok")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api { status: 403, .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn delete_escapes_id_and_requires_204() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let client = client(&server, &dir);
        server.respond("DELETE", "/mfa/authenticators/totp%7Cdev_1", 204, Value::Null);
        server.respond(
            "DELETE",
            "/mfa/authenticators/sms%7Cdev_2",
            404,
            json!({"error": "not_found"}),
        );

        assert!(client.delete_authenticator("tok", "totp|dev_1").await.unwrap());
        assert!(!client.delete_authenticator("tok", "sms|dev_2").await.unwrap());
    }

    #[tokio::test]
    async fn delete_all_skips_recovery_codes_and_survives_failures() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        server.respond(
            "GET",
            "/mfa/authenticators",
            200,
            json!([
                {"id": "recovery-code|dev_0"},
                {"id": "totp|dev_1"},
                {"id": "sms|dev_2"},
                {"id": "push|dev_3"},
            ]),
        );
        server.respond("DELETE", "/mfa/authenticators/totp%7Cdev_1", 204, Value::Null);
        server.respond(
            "DELETE",
            "/mfa/authenticators/sms%7Cdev_2",
            500,
            json!({"error": "server_error"}),
        );
        server.respond("DELETE", "/mfa/authenticators/push%7Cdev_3", 204, Value::Null);

        let report = client(&server, &dir)
            .delete_all_authenticators("tok")
            .await
            .unwrap();

        let deletes = server
            .requests()
            .iter()
            .filter(|r| r.method == "DELETE")
            .count();
        assert_eq!(deletes, 3);
        assert_eq!(report.attempted(), 3);
        assert_eq!(report.skipped, vec!["recovery-code|dev_0"]);
        assert_eq!(report.failed, vec!["sms|dev_2"]);
        assert_eq!(report.deleted, vec!["totp|dev_1", "push|dev_3"]);
        assert_eq!(server.hits("DELETE", "/mfa/authenticators/recovery-code%7Cdev_0"), 0);
    }
}
