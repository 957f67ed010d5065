use serde::{Deserialize, Serialize};

/// The signed-in user as reported by `GET /api/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    pub username: String,
}

/// Credentials posted to `/api/login` and `/api/signup`.
#[derive(Serialize)]
pub(crate) struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Body of `POST /api/request_password_reset`.
#[derive(Serialize)]
pub(crate) struct ResetRequest<'a> {
    pub username: &'a str,
}

/// Body of `POST /api/reset_password`.
#[derive(Serialize)]
pub(crate) struct NewPassword<'a> {
    pub token: &'a str,
    pub new_password: &'a str,
}

/// Response of `POST /api/request_password_reset`. Some deployments hand
/// the reset token straight back instead of emailing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PasswordResetTicket {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reset_token: Option<String>,
}

/// Generic `{"message": ...}` body returned by the auth endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct MessageBody {
    #[serde(default)]
    pub message: Option<String>,
}
