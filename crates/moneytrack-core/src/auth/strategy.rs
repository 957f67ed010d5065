//! Session strategies: how a credential is attached to outbound requests
//! and how a fresh one is picked up from login/refresh responses.
//!
//! Exactly one strategy is active per process, chosen from config.

use std::collections::BTreeMap;
use std::fmt;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::transport::ApiResponse;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStrategy {
    /// Backend-issued cookies, replayed on every request (the browser's
    /// `credentials: include`).
    #[default]
    Cookie,
    /// A token from the login/refresh response body, sent as
    /// `Authorization: Bearer`.
    Bearer,
}

/// Opaque proof of identity. Contents are never inspected or logged.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SessionCredential {
    #[default]
    None,
    Cookies { jar: BTreeMap<String, String> },
    Bearer { token: String },
}

impl SessionCredential {
    pub fn is_none(&self) -> bool {
        matches!(self, SessionCredential::None)
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionCredential::None => write!(f, "None"),
            SessionCredential::Cookies { jar } => {
                let names: Vec<&str> = jar.keys().map(String::as_str).collect();
                write!(f, "Cookies({})", names.join(", "))
            }
            SessionCredential::Bearer { .. } => write!(f, "Bearer(<redacted>)"),
        }
    }
}

#[derive(Deserialize)]
struct TokenBody {
    #[serde(alias = "access_token", alias = "accessToken")]
    token: String,
}

impl SessionStrategy {
    /// Add the credential headers for this strategy. A credential of the
    /// other kind is ignored.
    pub fn attach(&self, credential: &SessionCredential, headers: &mut HeaderMap) {
        match (self, credential) {
            (SessionStrategy::Cookie, SessionCredential::Cookies { jar }) if !jar.is_empty() => {
                let pairs: Vec<String> = jar.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                match HeaderValue::from_str(&pairs.join("; ")) {
                    Ok(value) => {
                        headers.insert(COOKIE, value);
                    }
                    Err(_) => warn!("Stored cookies are not a valid header value, not attaching"),
                }
            }
            (SessionStrategy::Bearer, SessionCredential::Bearer { token }) => {
                match HeaderValue::from_str(&format!("Bearer {}", token)) {
                    Ok(mut value) => {
                        value.set_sensitive(true);
                        headers.insert(AUTHORIZATION, value);
                    }
                    Err(_) => warn!("Stored token is not a valid header value, not attaching"),
                }
            }
            _ => {}
        }
    }

    /// Credential carried by a login or refresh response, merged with the
    /// current one. `None` if the response carries nothing new.
    pub fn capture(
        &self,
        current: &SessionCredential,
        response: &ApiResponse,
    ) -> Option<SessionCredential> {
        match self {
            SessionStrategy::Cookie => merge_cookies(current, &response.headers),
            SessionStrategy::Bearer => match response.json::<TokenBody>() {
                Ok(body) if !body.token.is_empty() => {
                    Some(SessionCredential::Bearer { token: body.token })
                }
                _ => None,
            },
        }
    }

    /// Credential updates any response may carry (cookies set outside the
    /// auth endpoints). Bearer tokens are only taken from auth endpoints.
    pub fn passive_capture(
        &self,
        current: &SessionCredential,
        response: &ApiResponse,
    ) -> Option<SessionCredential> {
        match self {
            SessionStrategy::Cookie => merge_cookies(current, &response.headers),
            SessionStrategy::Bearer => None,
        }
    }
}

impl fmt::Display for SessionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStrategy::Cookie => write!(f, "cookie"),
            SessionStrategy::Bearer => write!(f, "bearer"),
        }
    }
}

/// Apply `Set-Cookie` headers to the current jar. Cookies set with
/// `Max-Age=0` or an empty value are removed.
fn merge_cookies(current: &SessionCredential, headers: &HeaderMap) -> Option<SessionCredential> {
    let mut set_cookies = headers.get_all(SET_COOKIE).iter().peekable();
    set_cookies.peek()?;

    let mut jar = match current {
        SessionCredential::Cookies { jar } => jar.clone(),
        _ => BTreeMap::new(),
    };

    for value in set_cookies {
        let Ok(raw) = value.to_str() else {
            continue;
        };
        let mut parts = raw.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() {
            continue;
        }

        let expired = parts.any(|attr| attr.trim().eq_ignore_ascii_case("max-age=0"));
        if expired || value.is_empty() {
            jar.remove(name);
            debug!(cookie = name, "Cookie cleared by server");
        } else {
            jar.insert(name.to_string(), value.to_string());
            debug!(cookie = name, "Cookie stored");
        }
    }

    Some(if jar.is_empty() {
        SessionCredential::None
    } else {
        SessionCredential::Cookies { jar }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn jar(pairs: &[(&str, &str)]) -> SessionCredential {
        SessionCredential::Cookies {
            jar: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn ok_with_cookies(cookies: &[&'static str]) -> ApiResponse {
        cookies.iter().fold(ApiResponse::new(StatusCode::OK), |r, c| {
            r.with_header(SET_COOKIE, HeaderValue::from_static(*c))
        })
    }

    #[test]
    fn test_cookie_attach() {
        let mut headers = HeaderMap::new();
        SessionStrategy::Cookie.attach(&jar(&[("access", "a1"), ("refresh", "r1")]), &mut headers);
        assert_eq!(headers.get(COOKIE).unwrap(), "access=a1; refresh=r1");
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_bearer_attach() {
        let mut headers = HeaderMap::new();
        let credential = SessionCredential::Bearer { token: "tok".into() };
        SessionStrategy::Bearer.attach(&credential, &mut headers);
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer tok");
    }

    #[test]
    fn test_attach_ignores_mismatched_credential() {
        let mut headers = HeaderMap::new();
        SessionStrategy::Cookie.attach(&SessionCredential::Bearer { token: "tok".into() }, &mut headers);
        SessionStrategy::Bearer.attach(&jar(&[("sid", "1")]), &mut headers);
        SessionStrategy::Cookie.attach(&SessionCredential::None, &mut headers);
        assert!(headers.is_empty());
    }

    #[test]
    fn test_capture_cookies_merges_into_jar() {
        let response = ok_with_cookies(&[
            "access=a2; Path=/; HttpOnly; Secure",
            "csrf=c1; Path=/",
        ]);

        let updated = SessionStrategy::Cookie
            .capture(&jar(&[("access", "a1"), ("refresh", "r1")]), &response)
            .unwrap();

        assert_eq!(updated, jar(&[("access", "a2"), ("csrf", "c1"), ("refresh", "r1")]));
    }

    #[test]
    fn test_capture_cookies_removes_expired() {
        let response = ok_with_cookies(&["access=; Max-Age=0; Path=/", "refresh=gone; max-age=0"]);

        let updated = SessionStrategy::Cookie
            .capture(&jar(&[("access", "a1"), ("refresh", "r1")]), &response)
            .unwrap();

        assert_eq!(updated, SessionCredential::None);
    }

    #[test]
    fn test_capture_without_set_cookie_is_none() {
        let response = ApiResponse::new(StatusCode::OK);
        assert!(SessionStrategy::Cookie.capture(&jar(&[("a", "1")]), &response).is_none());
    }

    #[test]
    fn test_capture_bearer_token_from_body() {
        let response = ApiResponse::new(StatusCode::OK).with_body(r#"{"access_token":"fresh"}"#);
        let updated = SessionStrategy::Bearer
            .capture(&SessionCredential::None, &response)
            .unwrap();
        assert_eq!(updated, SessionCredential::Bearer { token: "fresh".into() });

        let response = ApiResponse::new(StatusCode::OK).with_body(r#"{"token":"t2"}"#);
        assert_eq!(
            SessionStrategy::Bearer.capture(&updated, &response),
            Some(SessionCredential::Bearer { token: "t2".into() })
        );
    }

    #[test]
    fn test_bearer_ignores_bodies_without_token() {
        let response = ApiResponse::new(StatusCode::OK).with_body(r#"{"message":"ok"}"#);
        assert!(SessionStrategy::Bearer.capture(&SessionCredential::None, &response).is_none());
        assert!(SessionStrategy::Bearer
            .passive_capture(&SessionCredential::None, &response)
            .is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let bearer = SessionCredential::Bearer { token: "secret".into() };
        assert!(!format!("{:?}", bearer).contains("secret"));

        let cookies = jar(&[("sid", "secret")]);
        let rendered = format!("{:?}", cookies);
        assert!(rendered.contains("sid"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_strategy_serde() {
        assert_eq!(serde_json::to_string(&SessionStrategy::Bearer).unwrap(), "\"bearer\"");
        let parsed: SessionStrategy = serde_json::from_str("\"cookie\"").unwrap();
        assert_eq!(parsed, SessionStrategy::Cookie);
    }
}
