//! Navigation seam.
//!
//! In the browser this was a full-page navigation; here it is whatever the
//! front end decides "go to the login screen" means. The transport only
//! needs to know the current route and how to leave it.

use std::sync::{Mutex, PoisonError, RwLock};

use tracing::info;

/// Route the transport navigates to on definitive session loss.
pub const LOGIN_ROUTE: &str = "/login";

/// Routes where a failed refresh must never trigger a redirect.
pub const AUTH_ROUTES: &[&str] = &["/login", "/signup", "/reset-password", "/forgot-password"];

/// Whether `route` is one of the auth pages (or nested under one).
/// Query strings and fragments are ignored.
pub fn is_auth_page(route: &str) -> bool {
    let path = route.split(['?', '#']).next().unwrap_or(route);
    let path = if path.len() > 1 { path.trim_end_matches('/') } else { path };

    AUTH_ROUTES.iter().any(|auth| {
        path == *auth
            || path
                .strip_prefix(auth)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

pub trait Navigator: Send + Sync {
    /// The route the user is currently on.
    fn current_route(&self) -> String;

    /// Leave the current route. Irreversible from the caller's point of view.
    fn navigate(&self, route: &str);
}

/// In-process navigator: tracks the current route and remembers every
/// navigation so the front end can act on it after a command completes.
pub struct RouteTracker {
    current: RwLock<String>,
    history: Mutex<Vec<String>>,
}

impl RouteTracker {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(initial.into()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Move to `route` without recording it as a navigation (e.g. the
    /// front end opening a screen itself).
    pub fn enter(&self, route: impl Into<String>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = route.into();
    }

    /// All navigations performed through [`Navigator::navigate`], oldest first.
    pub fn navigations(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether anything navigated to the login route.
    pub fn sent_to_login(&self) -> bool {
        self.navigations().iter().any(|r| r == LOGIN_ROUTE)
    }
}

impl Default for RouteTracker {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for RouteTracker {
    fn current_route(&self) -> String {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn navigate(&self, route: &str) {
        info!(from = %self.current_route(), to = route, "Navigating");
        self.enter(route);
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_auth_page() {
        assert!(is_auth_page("/login"));
        assert!(is_auth_page("/signup"));
        assert!(is_auth_page("/reset-password?token=abc"));
        assert!(is_auth_page("/forgot-password/"));
        assert!(is_auth_page("/login#top"));

        assert!(!is_auth_page("/"));
        assert!(!is_auth_page("/analytics"));
        assert!(!is_auth_page("/loginx")); // prefix only, not a nested route
        assert!(!is_auth_page(""));
    }

    #[test]
    fn test_route_tracker_records_navigations() {
        let tracker = RouteTracker::default();
        assert_eq!(tracker.current_route(), "/");
        assert!(!tracker.sent_to_login());

        tracker.enter("/analytics");
        assert!(tracker.navigations().is_empty());

        tracker.navigate(LOGIN_ROUTE);
        assert_eq!(tracker.current_route(), "/login");
        assert_eq!(tracker.navigations(), vec!["/login".to_string()]);
        assert!(tracker.sent_to_login());
    }
}
