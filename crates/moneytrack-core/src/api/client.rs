//! Typed client for the finance backend.
//!
//! Protected endpoints go through the [`SessionTransport`]; the auth
//! endpoints (login, signup, password reset, logout) are sent directly
//! since a 401 there means wrong credentials, not an expired session.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::auth::{SessionCredential, SessionState, SessionStrategy};
use crate::backend;
use crate::config::Config;
use crate::models::transaction::NewCategory;
use crate::models::user::{Credentials, MessageBody, NewPassword, ResetRequest};
use crate::models::{
    AnalyticsReport, CategoryFilter, PasswordResetTicket, Transaction, TransactionInput,
    TransactionKind, User,
};
use crate::transport::{
    ApiRequest, ApiResponse, AuthenticatedTransport, HttpSend, Navigator, ReqwestSender,
    SessionTransport, LOGIN_ROUTE,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Login attempts once the backend is up. A freshly woken backend may
/// reject the first attempt while it finishes starting.
pub const LOGIN_ATTEMPTS: u32 = 3;

/// Delay between login attempts.
pub const LOGIN_RETRY_DELAY: Duration = Duration::from_millis(1500);

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const SIGNUP_FAILED: &str = "Signup failed";
const RESET_FAILED: &str = "Password reset failed";

/// Clone is cheap; the sender and session state are shared.
#[derive(Clone)]
pub struct FinanceClient {
    base_url: Url,
    sender: Arc<dyn HttpSend>,
    transport: SessionTransport,
}

impl FinanceClient {
    pub fn new(
        base_url: &str,
        sender: Arc<dyn HttpSend>,
        session: Arc<SessionState>,
        navigator: Arc<dyn Navigator>,
        strategy: SessionStrategy,
    ) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .with_context(|| format!("Invalid backend URL: {}", base_url))?;
        if parsed.cannot_be_a_base() {
            anyhow::bail!("Invalid backend URL: {}", base_url);
        }

        let transport = SessionTransport::new(
            Arc::clone(&sender),
            session,
            navigator,
            strategy,
            parsed.as_str(),
        );

        Ok(Self {
            base_url: parsed,
            sender,
            transport,
        })
    }

    /// Client for the configured backend, using the configured strategy.
    pub fn from_config(
        config: &Config,
        session: Arc<SessionState>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let sender: Arc<dyn HttpSend> =
            Arc::new(ReqwestSender::new().context("Failed to create HTTP client")?);
        let client = Self::new(
            &config.backend_url(),
            sender,
            session,
            navigator,
            config.strategy,
        )?;
        Ok(client.with_shared_refresh(config.shared_refresh))
    }

    pub fn with_shared_refresh(mut self, enabled: bool) -> Self {
        self.transport = self.transport.with_shared_refresh(enabled);
        self
    }

    pub fn session(&self) -> &Arc<SessionState> {
        self.transport.session()
    }

    pub fn transport(&self) -> &SessionTransport {
        &self.transport
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Absolute URL for `segments`, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    // ===== Unwrapped auth endpoints =====

    /// Poll the health endpoint until the backend answers.
    pub async fn wait_for_backend(&self, timeout: Duration, interval: Duration) -> bool {
        backend::wait_for_backend(self.sender.as_ref(), self.base_url.as_str(), timeout, interval)
            .await
    }

    /// Log in and start the settling window.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post(self.endpoint(&["api", "login"]))
            .json(&Credentials { username, password })?
            .skip_redirect(true);

        let response = self.sender.execute(request).await?;
        if !response.is_success() {
            debug!(status = %response.status, "Login rejected");
            return Err(Self::rejected(&response, INVALID_CREDENTIALS));
        }

        let strategy = self.transport.strategy();
        let credential = strategy
            .capture(&SessionCredential::None, &response)
            .filter(|c| !c.is_none());

        let credential = match (strategy, credential) {
            (_, Some(credential)) => credential,
            (SessionStrategy::Bearer, None) => {
                return Err(ApiError::InvalidResponse(
                    "Login response did not include a token".to_string(),
                ));
            }
            (SessionStrategy::Cookie, None) => {
                warn!("Login response set no cookies; session will not survive a restart");
                SessionCredential::None
            }
        };

        let session = self.session();
        session.establish(username, credential);
        session.arm_settling();
        info!(username, strategy = %strategy, "Logged in");
        Ok(())
    }

    /// [`login`](Self::login), retried on any failure. The last failure is
    /// returned.
    pub async fn login_with_retry(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let mut attempt = 1;
        loop {
            match self.login(username, password).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < LOGIN_ATTEMPTS => {
                    debug!(attempt, error = %e, "Login attempt failed, retrying");
                    tokio::time::sleep(LOGIN_RETRY_DELAY).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempts = attempt, error = %e, "Login failed");
                    return Err(e);
                }
            }
        }
    }

    pub async fn signup(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post(self.endpoint(&["api", "signup"]))
            .json(&Credentials { username, password })?
            .skip_redirect(true);

        let response = self.sender.execute(request).await?;
        if !response.is_success() {
            return Err(Self::rejected(&response, SIGNUP_FAILED));
        }
        info!(username, "Account created");
        Ok(())
    }

    pub async fn request_password_reset(&self, username: &str) -> Result<PasswordResetTicket, ApiError> {
        let request = ApiRequest::post(self.endpoint(&["api", "request_password_reset"]))
            .json(&ResetRequest { username })?
            .skip_redirect(true);

        let response = self.sender.execute(request).await?;
        if !response.is_success() {
            return Err(Self::rejected(&response, RESET_FAILED));
        }
        response
            .json()
            .map_err(|e| ApiError::InvalidResponse(format!("Password reset response: {}", e)))
    }

    /// Set a new password with a reset token. Returns the server's message.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<String, ApiError> {
        let request = ApiRequest::post(self.endpoint(&["api", "reset_password"]))
            .json(&NewPassword {
                token,
                new_password,
            })?
            .skip_redirect(true);

        let response = self.sender.execute(request).await?;
        if !response.is_success() {
            return Err(Self::rejected(&response, RESET_FAILED));
        }
        let body: MessageBody = response.json().unwrap_or_default();
        Ok(body
            .message
            .unwrap_or_else(|| "Password updated".to_string()))
    }

    /// End the session locally and on the server, then go to the login
    /// route. Server-side failures are logged only.
    pub async fn logout(&self) {
        let mut request = ApiRequest::post(self.endpoint(&["api", "logout"])).skip_redirect(true);
        self.transport
            .strategy()
            .attach(&self.session().credential(), &mut request.headers);

        match self.sender.execute(request).await {
            Ok(response) if response.is_success() => debug!("Server session closed"),
            Ok(response) => warn!(status = %response.status, "Logout rejected by server"),
            Err(e) => warn!(error = %e, "Logout request failed"),
        }

        self.session().end();
        self.transport.navigator().navigate(LOGIN_ROUTE);
        info!("Logged out");
    }

    fn rejected(response: &ApiResponse, fallback: &str) -> ApiError {
        ApiError::Rejected(
            ApiError::server_message(&response.text()).unwrap_or_else(|| fallback.to_string()),
        )
    }

    // ===== Protected endpoints =====

    /// Send through the session transport. Non-2xx becomes an [`ApiError`].
    async fn call(&self, request: ApiRequest) -> Result<ApiResponse> {
        let method = request.method.clone();
        let url = request.url.clone();

        let response = self
            .transport
            .send(request)
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send {} request to {}", method, url))?;

        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_response(&response).into())
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.call(ApiRequest::get(url.as_str())).await?;
        response
            .json()
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    pub async fn me(&self) -> Result<User> {
        self.get(self.endpoint(&["api", "me"])).await
    }

    pub async fn categories(&self, kind: TransactionKind) -> Result<Vec<String>> {
        self.get(self.endpoint(&["api", "categories", kind.as_str()]))
            .await
    }

    /// Add a category and return the updated list for its type.
    pub async fn add_category(&self, kind: TransactionKind, name: &str) -> Result<Vec<String>> {
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("Category name is required");
        }

        let url = self.endpoint(&["api", "categories"]);
        let request = ApiRequest::post(url.as_str())
            .json(&NewCategory { kind, name })
            .map_err(ApiError::from)?;
        let response = self.call(request).await?;
        response
            .json()
            .with_context(|| format!("Failed to parse JSON response from {}", url))
    }

    pub async fn delete_category(&self, name: &str) -> Result<()> {
        let url = self.endpoint(&["api", "category", "delete", name]);
        self.call(ApiRequest::delete(url.as_str())).await?;
        debug!(category = name, "Category deleted");
        Ok(())
    }

    pub async fn transaction(&self, id: i64) -> Result<Transaction> {
        self.get(self.endpoint(&["api", "transactions", id.to_string().as_str()]))
            .await
    }

    pub async fn create_transaction(&self, input: &TransactionInput) -> Result<()> {
        input.validate().map_err(anyhow::Error::msg)?;
        let request = ApiRequest::post(self.endpoint(&["api", "transactions"]).as_str())
            .json(input)
            .map_err(ApiError::from)?;
        self.call(request).await?;
        info!(kind = %input.kind, category = %input.category, "Transaction added");
        Ok(())
    }

    pub async fn update_transaction(&self, id: i64, input: &TransactionInput) -> Result<()> {
        input.validate().map_err(anyhow::Error::msg)?;
        let request = ApiRequest::put(self.endpoint(&["api", "transactions", id.to_string().as_str()]).as_str())
            .json(input)
            .map_err(ApiError::from)?;
        self.call(request).await?;
        info!(id, "Transaction updated");
        Ok(())
    }

    pub async fn delete_transaction(&self, id: i64) -> Result<()> {
        let url = self.endpoint(&["api", "transactions", id.to_string().as_str()]);
        self.call(ApiRequest::delete(url.as_str())).await?;
        info!(id, "Transaction deleted");
        Ok(())
    }

    /// Monthly analytics, optionally narrowed to one category.
    pub async fn analytics(&self, filter: &CategoryFilter) -> Result<AnalyticsReport> {
        let mut url = self.endpoint(&["api", "analytics"]);
        url.query_pairs_mut()
            .append_pair("period", "monthly")
            .append_pair("categories", filter.as_query());
        self.get(url).await
    }
}
