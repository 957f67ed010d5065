//! Client for the finance backend's REST API.
//!
//! [`FinanceClient`] wraps every protected endpoint in the session
//! transport and sends the auth endpoints directly. Failures are reported
//! as [`ApiError`], usually inside an `anyhow` context chain.

pub mod client;
pub mod error;

pub use client::{FinanceClient, LOGIN_ATTEMPTS, LOGIN_RETRY_DELAY};
pub use error::{ApiError, NETWORK_ERROR_MESSAGE};
