//! Core library for the Money Tracker client.
//!
//! The interesting part lives in [`transport`]: every call to a protected
//! backend endpoint goes through [`transport::SessionTransport`], which
//! attaches the session credential, recovers from a single expired-session
//! response with a silent refresh, and decides whether the user must be
//! sent back to the login route. [`auth`] holds the shared session state,
//! including the post-login settling window that suppresses that redirect.
//!
//! [`api::FinanceClient`] is the typed consumer used by front ends.

pub mod api;
pub mod auth;
pub mod backend;
pub mod config;
pub mod models;
pub mod transport;
pub mod utils;

pub use api::{ApiError, FinanceClient};
pub use auth::{SessionCredential, SessionState, SessionStrategy, SettlingWindow};
pub use config::Config;
pub use transport::{
    ApiRequest, ApiResponse, AuthenticatedTransport, HttpSend, Navigator, Outcome,
    SessionTransport, TransportError,
};
