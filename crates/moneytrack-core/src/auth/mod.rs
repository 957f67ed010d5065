//! Authentication state for the client.
//!
//! This module provides:
//! - `SessionState`: the shared session (credential, user, settling window)
//!   with write-through persistence via `SessionStore`
//! - `SettlingWindow`: the post-login grace period that suppresses
//!   redirects while a new credential settles
//! - `SessionStrategy`: cookie or bearer credential handling
//! - `CredentialStore`: optional remembered passwords in the OS keychain,
//!   one set per backend

pub mod credentials;
pub mod session;
pub mod settling;
pub mod strategy;

pub use credentials::CredentialStore;
pub use session::{SessionData, SessionState, SessionStore};
pub use settling::{SettlingWindow, DEFAULT_SETTLE_WINDOW_SECS};
pub use strategy::{SessionCredential, SessionStrategy};
