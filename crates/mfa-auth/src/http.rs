//! HTTP client adapter
//!
//! Every call to the authorization server goes through [`HttpClient::send`]
//! with an [`ApiRequest`] descriptor. Non-2xx responses are returned, not
//! raised: the grant endpoints report `mfa_required` and
//! `authorization_pending` with 4xx statuses and the flow branches on them.
//! Only transport failures become [`Error::Http`].
//!
//! When constructed with a printer, the adapter writes each request and
//! response in a wire-like format with secrets truncated or masked.

use std::sync::Arc;

use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Body fields shortened to their first 32 characters when printed.
const TRUNCATED_FIELDS: &[&str] = &["mfa_token", "oob_code", "access_token", "id_token"];

/// Body fields replaced entirely when printed.
const MASKED_FIELDS: &[&str] = &["password"];

const TRUNCATE_AT: usize = 32;

/// Destination for verbose request/response dumps.
pub type RequestPrinter = Arc<dyn Fn(&str) + Send + Sync>;

/// A single outbound request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            bearer: None,
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, url).json(body)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach `Authorization: Bearer <token>`.
    pub fn bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_owned());
        self
    }
}

/// Status plus decoded body of a completed request.
///
/// An empty body decodes to `Value::Null`; a body that is not JSON is kept as
/// `Value::String` so it can still be reported.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Deserialize the body into a typed response.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone()).map_err(|e| {
            Error::UnexpectedResponse(format!("cannot decode {} body: {e}", self.status))
        })
    }

    /// Convert a failed response into [`Error::Api`], preferring the OAuth
    /// `error_description`/`error` fields over the raw body.
    pub fn into_error(self) -> Error {
        let message = ["error_description", "error", "message"]
            .iter()
            .find_map(|key| self.body.get(key).and_then(Value::as_str))
            .map(str::to_owned)
            .unwrap_or_else(|| match &self.body {
                Value::Null => String::from("<no body>"),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        Error::Api {
            status: self.status.as_u16(),
            message,
        }
    }
}

/// Outbound HTTP with optional verbose printing.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    printer: Option<RequestPrinter>,
}

impl HttpClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            printer: None,
        }
    }

    /// Build a client that dumps every exchange to `printer`.
    pub fn with_printer(client: reqwest::Client, printer: RequestPrinter) -> Self {
        Self {
            client,
            printer: Some(printer),
        }
    }

    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = Url::parse(&request.url)
            .map_err(|e| Error::Http(format!("invalid URL {}: {e}", request.url)))?;

        if let Some(printer) = &self.printer {
            printer(&format_request(request, &url));
        }

        let mut builder = self.client.request(request.method.clone(), url.clone());
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            Error::Http(format!("{} {} failed: {e}", request.method, url.path()))
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("reading {} response body: {e}", url.path())))?;
        let body = decode_body(&text);

        debug!(method = %request.method, path = url.path(), status = status.as_u16(), "request completed");

        let response = ApiResponse { status, body };
        if let Some(printer) = &self.printer {
            printer(&format_response(&response));
        }
        Ok(response)
    }
}

fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()))
}

/// Copy of `body` safe to print: tokens truncated, passwords masked.
pub fn redact(body: &Value) -> Value {
    let mut redacted = body.clone();
    if let Value::Object(map) = &mut redacted {
        for field in TRUNCATED_FIELDS {
            if let Some(Value::String(s)) = map.get_mut(*field) {
                *s = format!("{}...", s.chars().take(TRUNCATE_AT).collect::<String>());
            }
        }
        for field in MASKED_FIELDS {
            if let Some(value) = map.get_mut(*field) {
                *value = Value::String("********".into());
            }
        }
    }
    redacted
}

fn format_request(request: &ApiRequest, url: &Url) -> String {
    let mut path = url.path().to_owned();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    let host = match url.port() {
        Some(port) => format!("{}:{port}", url.host_str().unwrap_or_default()),
        None => url.host_str().unwrap_or_default().to_owned(),
    };

    let mut msg = format!(
        ">>> {} {path} HTTP/1.1\n    Host: {host}\n    Content-Type: application/json\n",
        request.method
    );
    if let Some(body) = &request.body {
        msg.push_str(&pretty(&redact(body)));
        msg.push('\n');
    }
    msg
}

fn format_response(response: &ApiResponse) -> String {
    let mut msg = format!(
        "<<< HTTP/1.1 {} {}\n",
        response.status.as_u16(),
        response.status.canonical_reason().unwrap_or_default()
    );
    if !response.body.is_null() {
        msg.push_str(&pretty(&redact(&response.body)));
        msg.push('\n');
    }
    msg
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockServer;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn redact_truncates_tokens_and_masks_password() {
        let long = "a".repeat(40);
        let body = json!({
            "mfa_token": long,
            "access_token": "short",
            "password": "hunter2",
            "username": "alice",
        });

        let redacted = redact(&body);
        assert_eq!(redacted["mfa_token"], format!("{}...", "a".repeat(32)));
        assert_eq!(redacted["access_token"], "short...");
        assert_eq!(redacted["password"], "********");
        assert_eq!(redacted["username"], "alice");
        // Original untouched
        assert_eq!(body["password"], "hunter2");
    }

    #[test]
    fn redact_leaves_non_objects_alone() {
        assert_eq!(redact(&json!([1, 2])), json!([1, 2]));
        assert_eq!(redact(&Value::Null), Value::Null);
    }

    #[test]
    fn into_error_prefers_error_description() {
        let response = ApiResponse {
            status: StatusCode::FORBIDDEN,
            body: json!({"error": "access_denied", "error_description": "Wrong email or password."}),
        };
        match response.into_error() {
            Error::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Wrong email or password.");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn into_error_falls_back_to_raw_body() {
        let response = ApiResponse {
            status: StatusCode::BAD_GATEWAY,
            body: Value::String("upstream down".into()),
        };
        assert_eq!(
            response.into_error().to_string(),
            "server returned 502: upstream down"
        );
    }

    #[test]
    fn request_format_matches_wire_layout() {
        let request = ApiRequest::post(
            "https://tenant.example.com/oauth/token?x=1",
            json!({"password": "hunter2"}),
        );
        let url = Url::parse(&request.url).unwrap();
        let printed = format_request(&request, &url);
        assert!(printed.starts_with(">>> POST /oauth/token?x=1 HTTP/1.1\n"));
        assert!(printed.contains("    Host: tenant.example.com\n"));
        assert!(printed.contains("\"********\""));
        assert!(!printed.contains("hunter2"));
    }

    #[tokio::test]
    async fn send_returns_error_statuses_without_raising() {
        let server = MockServer::start().await;
        server.respond(
            "POST",
            "/oauth/token",
            403,
            json!({"error": "mfa_required", "mfa_token": "m"}),
        );

        let http = HttpClient::new(reqwest::Client::new());
        let response = http
            .send(&ApiRequest::post(
                format!("{}/oauth/token", server.url),
                json!({"grant_type": "password"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(response.body["error"], "mfa_required");
    }

    #[tokio::test]
    async fn send_attaches_bearer_and_body() {
        let server = MockServer::start().await;
        server.respond("POST", "/mfa/associate", 200, json!({}));

        let http = HttpClient::new(reqwest::Client::new());
        http.send(
            &ApiRequest::post(
                format!("{}/mfa/associate", server.url),
                json!({"authenticator_types": ["otp"]}),
            )
            .bearer("tok"),
        )
        .await
        .unwrap();

        let recorded = server.requests();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].authorization.as_deref(), Some("Bearer tok"));
        assert_eq!(recorded[0].body["authenticator_types"][0], "otp");
    }

    #[tokio::test]
    async fn printer_receives_redacted_exchange() {
        let server = MockServer::start().await;
        server.respond(
            "POST",
            "/oauth/token",
            200,
            json!({"access_token": "x".repeat(64), "expires_in": 86400}),
        );

        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = lines.clone();
        let http = HttpClient::with_printer(
            reqwest::Client::new(),
            Arc::new(move |msg: &str| sink.lock().unwrap().push(msg.to_owned())),
        );
        http.send(&ApiRequest::post(
            format!("{}/oauth/token", server.url),
            json!({"username": "alice", "password": "hunter2"}),
        ))
        .await
        .unwrap();

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(">>> POST /oauth/token HTTP/1.1"));
        assert!(!lines[0].contains("hunter2"));
        assert!(lines[1].starts_with("<<< HTTP/1.1 200 OK"));
        assert!(lines[1].contains(&format!("{}...", "x".repeat(32))));
        assert!(!lines[1].contains(&"x".repeat(33)));
    }

    #[tokio::test]
    async fn connection_failure_is_http_error() {
        let http = HttpClient::new(reqwest::Client::new());
        let err = http
            .send(&ApiRequest::get("http://127.0.0.1:1/userinfo"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)), "got {err:?}");
    }
}
