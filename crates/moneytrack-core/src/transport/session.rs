//! The authenticated request wrapper.
//!
//! Per call:
//!
//! ```text
//! INIT -> SENT -> OK                       (any status but 401)
//!              -> UNAUTHORIZED -> REFRESHING -> RETRY_SENT -> OK | FAIL
//!                                           -> REFRESH_FAILED -> REDIRECT | SUPPRESSED
//! ```
//!
//! At most one refresh and one retry happen per call. A 401 on the retry is
//! returned as-is (`FAIL`); nothing loops.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::FutureExt;
use tracing::{debug, info, warn};

use crate::auth::{SessionState, SessionStrategy};

use super::navigator::{is_auth_page, Navigator, LOGIN_ROUTE};
use super::refresh::RefreshGate;
use super::{ApiRequest, ApiResponse, AuthenticatedTransport, HttpSend, TransportError};

/// Refresh endpoint, relative to the backend base URL.
pub const REFRESH_PATH: &str = "/api/refresh";

/// Terminal state of one wrapped call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The final response is not a 401 (it may still be a 4xx/5xx).
    Ok,
    /// The refresh succeeded but the retry was rejected again.
    Fail,
    /// The refresh failed and the user was sent to the login route.
    Redirect,
    /// The refresh failed but the redirect was suppressed.
    Suppressed,
}

/// Why a redirect was not performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    SkipRedirect,
    AuthPage,
    Settling,
}

/// The final response of a wrapped call plus how the call ended.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub response: ApiResponse,
    pub outcome: Outcome,
}

/// Clone is cheap; all shared state is behind `Arc`.
#[derive(Clone)]
pub struct SessionTransport {
    sender: Arc<dyn HttpSend>,
    session: Arc<SessionState>,
    navigator: Arc<dyn Navigator>,
    strategy: SessionStrategy,
    refresh_url: String,
    refresh_gate: Option<Arc<RefreshGate>>,
}

impl SessionTransport {
    pub fn new(
        sender: Arc<dyn HttpSend>,
        session: Arc<SessionState>,
        navigator: Arc<dyn Navigator>,
        strategy: SessionStrategy,
        base_url: &str,
    ) -> Self {
        Self {
            sender,
            session,
            navigator,
            strategy,
            refresh_url: format!("{}{}", base_url.trim_end_matches('/'), REFRESH_PATH),
            refresh_gate: None,
        }
    }

    /// Share one in-flight refresh between concurrent callers.
    pub fn with_shared_refresh(mut self, enabled: bool) -> Self {
        self.refresh_gate = enabled.then(|| Arc::new(RefreshGate::new()));
        self
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    pub fn strategy(&self) -> SessionStrategy {
        self.strategy
    }

    /// Run one wrapped call and report its terminal state.
    pub async fn exchange(&self, request: ApiRequest) -> Result<Exchange, TransportError> {
        let skip_redirect = request.skip_redirect;
        let url = request.url.clone();

        let response = self.dispatch(request.clone()).await?;
        if !response.is_unauthorized() {
            self.settle_on_success(&response);
            return Ok(Exchange {
                response,
                outcome: Outcome::Ok,
            });
        }

        debug!(url = %url, "Unauthorized, attempting silent refresh");

        if self.refresh().await {
            let retried = self.dispatch(request).await?;
            let outcome = if retried.is_unauthorized() {
                warn!(url = %url, "Request rejected again after refresh");
                Outcome::Fail
            } else {
                self.settle_on_success(&retried);
                Outcome::Ok
            };
            return Ok(Exchange {
                response: retried,
                outcome,
            });
        }

        let outcome = match self.suppression(skip_redirect) {
            Some(reason) => {
                debug!(url = %url, ?reason, "Session refresh failed, redirect suppressed");
                Outcome::Suppressed
            }
            None => {
                warn!(url = %url, "Session refresh failed, redirecting to login");
                self.session.invalidate();
                self.navigator.navigate(LOGIN_ROUTE);
                Outcome::Redirect
            }
        };

        Ok(Exchange { response, outcome })
    }

    /// Why a redirect should not happen right now, if any.
    pub fn suppression(&self, skip_redirect: bool) -> Option<SuppressReason> {
        if skip_redirect {
            Some(SuppressReason::SkipRedirect)
        } else if is_auth_page(&self.navigator.current_route()) {
            Some(SuppressReason::AuthPage)
        } else if self.session.is_settling() {
            Some(SuppressReason::Settling)
        } else {
            None
        }
    }

    /// Attach the current credential and send, picking up any cookies the
    /// response sets.
    async fn dispatch(&self, mut request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.strategy
            .attach(&self.session.credential(), &mut request.headers);
        let response = self.sender.execute(request).await?;

        if let Some(updated) = self
            .strategy
            .passive_capture(&self.session.credential(), &response)
        {
            self.session.update_credential(updated);
        }

        Ok(response)
    }

    async fn refresh(&self) -> bool {
        let sender = Arc::clone(&self.sender);
        let session = Arc::clone(&self.session);
        let strategy = self.strategy;
        let url = self.refresh_url.clone();

        match self.refresh_gate {
            Some(ref gate) => {
                gate.run(move || refresh_session(sender, session, strategy, url).boxed())
                    .await
            }
            None => refresh_session(sender, session, strategy, url).await,
        }
    }

    /// The first successful authenticated response ends the settling window.
    fn settle_on_success(&self, response: &ApiResponse) {
        if response.is_success() && self.session.clear_settling() {
            debug!("Authenticated request succeeded, settling window cleared");
        }
    }
}

#[async_trait]
impl AuthenticatedTransport for SessionTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        Ok(self.exchange(request).await?.response)
    }
}

/// One refresh call. Network failures count as a failed refresh.
async fn refresh_session(
    sender: Arc<dyn HttpSend>,
    session: Arc<SessionState>,
    strategy: SessionStrategy,
    url: String,
) -> bool {
    let mut request = ApiRequest::post(url);
    strategy.attach(&session.credential(), &mut request.headers);

    match sender.execute(request).await {
        Ok(response) if response.is_success() => {
            if let Some(updated) = strategy.capture(&session.credential(), &response) {
                session.update_credential(updated);
            }
            info!("Session refreshed");
            true
        }
        Ok(response) => {
            debug!(status = %response.status, "Session refresh rejected");
            false
        }
        Err(e) => {
            warn!(error = %e, "Session refresh request failed");
            false
        }
    }
}
