use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::transport::{ApiResponse, TransportError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Rejected(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - session may have expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Shown instead of the transport detail when the backend was unreachable.
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please try again.";

/// The backend reports failures as `{"error": ...}` or `{"message": ...}`.
#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Server-provided message from a JSON error body, if any.
    pub fn server_message(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        parsed
            .error
            .or(parsed.message)
            .filter(|m| !m.trim().is_empty())
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = Self::server_message(body).unwrap_or_else(|| Self::truncate_body(body));
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(detail),
            404 => ApiError::NotFound(detail),
            429 => ApiError::RateLimited,
            400 | 409 | 422 if !detail.is_empty() => ApiError::Rejected(detail),
            500..=599 => ApiError::ServerError(detail),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, detail)),
        }
    }

    pub fn from_response(response: &ApiResponse) -> Self {
        Self::from_status(response.status, &response.text())
    }

    /// Whether the failure never reached the backend.
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }

    /// Text for the user. Transport details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Transport(_) => NETWORK_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}
