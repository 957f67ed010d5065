//! Backend wake-up polling.
//!
//! Hosted backends may be asleep on the first request. Before login the
//! client polls the health endpoint until it answers or a deadline passes.

use std::time::Duration;

use reqwest::header::{HeaderValue, CACHE_CONTROL};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::transport::{ApiRequest, HttpSend};

pub const HEALTH_PATH: &str = "/api/health";

/// How long login waits for a cold backend.
pub const DEFAULT_WAKE_TIMEOUT: Duration = Duration::from_secs(25);

/// Delay between health checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Poll `GET /api/health` until it returns 2xx. Returns false once
/// `timeout` has elapsed without a healthy answer.
pub async fn wait_for_backend(
    sender: &dyn HttpSend,
    base_url: &str,
    timeout: Duration,
    interval: Duration,
) -> bool {
    let url = format!("{}{}", base_url.trim_end_matches('/'), HEALTH_PATH);
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;

    while Instant::now() < deadline {
        attempt += 1;
        let request = ApiRequest::get(url.as_str())
            .header(CACHE_CONTROL, HeaderValue::from_static("no-store"))
            .skip_redirect(true);

        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, sender.execute(request)).await {
            Ok(Ok(response)) if response.is_success() => {
                info!(attempt, "Backend is up");
                return true;
            }
            Ok(Ok(response)) => debug!(attempt, status = %response.status, "Backend not ready"),
            Ok(Err(e)) => debug!(attempt, error = %e, "Backend unreachable"),
            Err(_) => debug!(attempt, "Health check timed out"),
        }

        tokio::time::sleep(interval).await;
    }

    warn!(attempts = attempt, "Backend did not wake up in time");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{Reply, ScriptedSender};

    const BASE: &str = "http://backend.test/";

    #[tokio::test(start_paused = true)]
    async fn test_healthy_backend_answers_first_time() {
        let sender = ScriptedSender::new().status(HEALTH_PATH, 200);

        assert!(wait_for_backend(&sender, BASE, DEFAULT_WAKE_TIMEOUT, DEFAULT_POLL_INTERVAL).await);
        assert_eq!(sender.calls(), 1);

        let request = &sender.requests()[0];
        assert_eq!(request.url, "http://backend.test/api/health");
        assert_eq!(request.headers.get(CACHE_CONTROL).unwrap(), "no-store");
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_through_cold_start() {
        let sender = ScriptedSender::new()
            .on(HEALTH_PATH, Reply::NetworkDown)
            .status(HEALTH_PATH, 503)
            .status(HEALTH_PATH, 200);

        assert!(wait_for_backend(&sender, BASE, DEFAULT_WAKE_TIMEOUT, DEFAULT_POLL_INTERVAL).await);
        assert_eq!(sender.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_timeout() {
        let sender = ScriptedSender::new().otherwise(503);

        let up = wait_for_backend(
            &sender,
            BASE,
            Duration::from_secs(5),
            Duration::from_secs(2),
        )
        .await;

        assert!(!up);
        // Checks at 0s, 2s and 4s; the deadline passes during the last sleep.
        assert_eq!(sender.calls(), 3);
    }
}
