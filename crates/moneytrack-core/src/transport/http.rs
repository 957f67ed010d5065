//! `reqwest`-backed implementation of [`HttpSend`].

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{ApiRequest, ApiResponse, HttpSend, TransportError};

/// HTTP request timeout in seconds.
/// Hosted backends can take a while on cold start; the wake-up poller
/// handles that case, so individual requests can fail reasonably fast.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestSender {
    client: Client,
}

impl ReqwestSender {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpSend for ReqwestSender {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        debug!(method = %request.method, url = %request.url, %status, "Request completed");

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::header::{HeaderValue, COOKIE};

    #[tokio::test]
    async fn test_execute_passes_request_through() {
        let server = MockServer::start_async().await;

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/transactions")
                    .header("cookie", "sid=abc")
                    .json_body(serde_json::json!({"amount": 12.5}));
                then.status(201)
                    .header("set-cookie", "sid=def; Path=/; HttpOnly")
                    .json_body(serde_json::json!({"id": 7}));
            })
            .await;

        let sender = ReqwestSender::new().unwrap();
        let request = ApiRequest::post(server.url("/api/transactions"))
            .header(COOKIE, HeaderValue::from_static("sid=abc"))
            .json(&serde_json::json!({"amount": 12.5}))
            .unwrap();

        let response = sender.execute(request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status.as_u16(), 201);
        assert_eq!(
            response.headers.get("set-cookie").unwrap(),
            "sid=def; Path=/; HttpOnly"
        );
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["id"], 7);
    }

    #[tokio::test]
    async fn test_execute_reports_connection_failure() {
        let sender = ReqwestSender::new().unwrap();
        // Port 9 (discard) is not expected to accept HTTP connections.
        let result = sender.execute(ApiRequest::get("http://127.0.0.1:9/api/me")).await;

        assert!(matches!(result, Err(TransportError::Http(_))));
    }
}
