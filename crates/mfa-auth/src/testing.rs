//! Test doubles: an in-process authorization server and a scripted operator.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::error::{Error, Result};
use crate::prompt::Prompter;
use crate::settings::Settings;

/// A request as seen by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct MockState {
    responses: Mutex<HashMap<String, VecDeque<(u16, Value)>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Authorization server stub answering from per-route response queues.
///
/// Unscripted requests get a 500 with `{"error": "unexpected_request"}`.
pub struct MockServer {
    pub url: String,
    state: Arc<MockState>,
    _handle: tokio::task::JoinHandle<()>,
}

fn route_key(method: &str, path: &str) -> String {
    format!("{method} {path}")
}

impl MockServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState::default());

        let shared = state.clone();
        let handle = tokio::spawn(async move {
            let app = axum::Router::new().fallback(move |request: Request<Body>| {
                let state = shared.clone();
                async move { handle(state, request).await }
            });
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            state,
            _handle: handle,
        }
    }

    /// Queue a response for the next `method path` request.
    pub fn respond(&self, method: &str, path: &str, status: u16, body: Value) {
        self.state
            .responses
            .lock()
            .unwrap()
            .entry(route_key(method, path))
            .or_default()
            .push_back((status, body));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn hits(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn settings(&self) -> Settings {
        Settings::new(self.url.clone(), "abc").unwrap()
    }
}

async fn handle(state: Arc<MockState>, request: Request<Body>) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let authorization = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let bytes = axum::body::to_bytes(request.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        authorization,
        body,
    });

    let scripted = state
        .responses
        .lock()
        .unwrap()
        .get_mut(&route_key(&method, &path))
        .and_then(VecDeque::pop_front);

    match scripted {
        Some((status, body)) => {
            let status = StatusCode::from_u16(status).unwrap();
            if body.is_null() {
                status.into_response()
            } else {
                (status, axum::Json(body)).into_response()
            }
        }
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({"error": "unexpected_request"})),
        )
            .into_response(),
    }
}

/// Prompter that replays canned answers in order.
///
/// `select` answers are matched against the offered choices by name.
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
    shown: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }

    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().unwrap().clone()
    }

    fn next(&self, message: &str) -> Result<String> {
        self.asked.lock().unwrap().push(message.to_owned());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Prompt(format!("no scripted answer for {message:?}")))
    }
}

impl Prompter for ScriptedPrompter {
    fn input(&self, message: &str) -> Result<String> {
        self.next(message)
    }

    fn password(&self, message: &str) -> Result<String> {
        self.next(message)
    }

    fn select(&self, message: &str, choices: &[&str]) -> Result<usize> {
        let answer = self.next(message)?;
        choices
            .iter()
            .position(|c| *c == answer)
            .ok_or_else(|| Error::Prompt(format!("{answer:?} is not one of {choices:?}")))
    }

    fn show(&self, message: &str) {
        self.shown.lock().unwrap().push(message.to_owned());
    }
}
