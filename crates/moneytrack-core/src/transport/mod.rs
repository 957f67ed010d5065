//! HTTP transport layer.
//!
//! Two seams live here:
//! - [`HttpSend`]: a raw request/response exchange with no session logic.
//!   [`ReqwestSender`] is the production implementation.
//! - [`AuthenticatedTransport`]: the single injectable interface used by
//!   everything that talks to protected endpoints. [`SessionTransport`]
//!   implements it on top of any `HttpSend`.
//!
//! Requests and responses are plain values so the session logic can be
//! exercised without a network.

pub mod http;
pub mod navigator;
pub mod refresh;
pub mod session;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub use http::ReqwestSender;
pub use navigator::{is_auth_page, Navigator, RouteTracker, AUTH_ROUTES, LOGIN_ROUTE};
pub use refresh::RefreshGate;
pub use session::{Exchange, Outcome, SessionTransport, SuppressReason};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// An outbound request. Passed through the transport unchanged apart from
/// credential headers.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Never navigate to the login route on definitive session loss.
    pub skip_redirect: bool,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            skip_redirect: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Serialize `body` as JSON and set the content type.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, TransportError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| TransportError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Some(bytes);
        Ok(self)
    }

    pub fn skip_redirect(mut self, skip: bool) -> Self {
        self.skip_redirect = skip;
        self
    }
}

/// A fully buffered response. The transport only ever looks at the status
/// and credential headers; bodies are decoded by callers.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Raw request execution, no session handling.
#[async_trait]
pub trait HttpSend: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Sends a request with session credentials attached, recovering from an
/// expired session where possible. Never fails on a 401; only network
/// failures are errors.
#[async_trait]
pub trait AuthenticatedTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory sender shared by the transport and client tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// What a scripted call should produce.
    pub enum Reply {
        Status(u16),
        Response(ApiResponse),
        NetworkDown,
    }

    /// Replies are matched by URL suffix, in order. Every executed request
    /// is recorded.
    #[derive(Default)]
    pub struct ScriptedSender {
        script: Mutex<Vec<(String, VecDeque<Reply>)>>,
        fallback: Mutex<Option<u16>>,
        log: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedSender {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(self, url_suffix: &str, reply: Reply) -> Self {
            {
                let mut script = self.script.lock().unwrap();
                match script.iter_mut().find(|entry| entry.0 == url_suffix) {
                    Some(entry) => entry.1.push_back(reply),
                    None => script.push((url_suffix.to_string(), VecDeque::from([reply]))),
                }
            }
            self
        }

        pub fn status(self, url_suffix: &str, status: u16) -> Self {
            self.on(url_suffix, Reply::Status(status))
        }

        /// Status used once a suffix has run out of scripted replies.
        pub fn otherwise(self, status: u16) -> Self {
            *self.fallback.lock().unwrap() = Some(status);
            self
        }

        pub fn requests(&self) -> Vec<ApiRequest> {
            self.log.lock().unwrap().clone()
        }

        pub fn calls(&self) -> usize {
            self.log.lock().unwrap().len()
        }

        pub fn calls_to(&self, url_suffix: &str) -> usize {
            self.log
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.url.ends_with(url_suffix))
                .count()
        }
    }

    #[async_trait]
    impl HttpSend for ScriptedSender {
        async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
            self.log.lock().unwrap().push(request.clone());
            tokio::task::yield_now().await;

            let reply = {
                let mut script = self.script.lock().unwrap();
                script
                    .iter_mut()
                    .filter(|entry| request.url.ends_with(entry.0.as_str()))
                    .max_by_key(|entry| entry.0.len())
                    .and_then(|entry| entry.1.pop_front())
            };

            match reply {
                Some(Reply::Status(code)) => Ok(ApiResponse::new(StatusCode::from_u16(code).unwrap())),
                Some(Reply::Response(response)) => Ok(response),
                Some(Reply::NetworkDown) => Err(TransportError::Network("connection refused".into())),
                None => match *self.fallback.lock().unwrap() {
                    Some(code) => Ok(ApiResponse::new(StatusCode::from_u16(code).unwrap())),
                    None => panic!("unscripted request to {}", request.url),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_body_sets_content_type() {
        let request = ApiRequest::post("http://localhost/api/login")
            .json(&serde_json::json!({"username": "dana"}))
            .unwrap();

        assert_eq!(
            request.headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(request.body.as_deref(), Some(br#"{"username":"dana"}"#.as_slice()));
        assert!(!request.skip_redirect);
    }

    #[test]
    fn test_response_helpers() {
        let response = ApiResponse::new(StatusCode::UNAUTHORIZED).with_body(r#"{"error":"expired"}"#);
        assert!(response.is_unauthorized());
        assert!(!response.is_success());

        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["error"], "expired");
        assert_eq!(response.text(), r#"{"error":"expired"}"#);
    }
}
