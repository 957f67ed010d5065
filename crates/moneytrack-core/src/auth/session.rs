use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::settling::SettlingWindow;
use super::strategy::SessionCredential;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// What survives between runs. The settling window is deliberately not
/// part of it: it is scoped to the running process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub username: String,
    pub credential: SessionCredential,
    pub created_at: DateTime<Utc>,
}

/// On-disk persistence for [`SessionData`].
#[derive(Debug, Clone)]
pub struct SessionStore {
    cache_dir: PathBuf,
}

impl SessionStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Load session from disk
    pub fn load(&self) -> Result<Option<SessionData>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let data: SessionData =
            serde_json::from_str(&contents).context("Failed to parse session file")?;

        if data.credential.is_none() {
            return Ok(None);
        }
        Ok(Some(data))
    }

    /// Save session to disk
    pub fn save(&self, data: &SessionData) -> Result<()> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(data)?;
        std::fs::write(&path, contents).context("Failed to write session file")?;
        Ok(())
    }

    /// Remove the session file if present
    pub fn clear(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

#[derive(Debug, Default)]
struct SessionInner {
    username: Option<String>,
    credential: SessionCredential,
    created_at: Option<DateTime<Utc>>,
    settling: SettlingWindow,
}

/// Shared, process-wide session state.
///
/// Held behind an `Arc` by the transport and every consumer. Credential
/// changes are written through to the optional [`SessionStore`]; a failed
/// write is logged and does not fail the request that caused it.
#[derive(Debug, Default)]
pub struct SessionState {
    inner: RwLock<SessionInner>,
    store: Option<SessionStore>,
}

impl SessionState {
    /// In-memory session with the given settling window length.
    pub fn new(settle_window: Duration) -> Self {
        Self {
            inner: RwLock::new(SessionInner {
                settling: SettlingWindow::new(settle_window),
                ..Default::default()
            }),
            store: None,
        }
    }

    /// Session backed by `store`, restoring whatever it holds.
    pub fn restore(store: SessionStore, settle_window: Duration) -> Result<Self> {
        let mut state = Self::new(settle_window);
        if let Some(data) = store.load()? {
            debug!(username = %data.username, "Restored saved session");
            let inner = state.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
            inner.username = Some(data.username);
            inner.credential = data.credential;
            inner.created_at = Some(data.created_at);
        }
        state.store = Some(store);
        Ok(state)
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn credential(&self) -> SessionCredential {
        self.read().credential.clone()
    }

    pub fn username(&self) -> Option<String> {
        self.read().username.clone()
    }

    /// Whether a credential is held. Says nothing about whether the backend
    /// still accepts it.
    pub fn has_credential(&self) -> bool {
        !self.read().credential.is_none()
    }

    pub fn snapshot(&self) -> Option<SessionData> {
        let inner = self.read();
        match (&inner.username, inner.created_at) {
            (Some(username), Some(created_at)) if !inner.credential.is_none() => Some(SessionData {
                username: username.clone(),
                credential: inner.credential.clone(),
                created_at,
            }),
            _ => None,
        }
    }

    /// Record a fresh login.
    pub fn establish(&self, username: &str, credential: SessionCredential) {
        {
            let mut inner = self.write();
            inner.username = Some(username.to_string());
            inner.credential = credential;
            inner.created_at = Some(Utc::now());
        }
        self.persist();
    }

    /// Replace the credential after a refresh (or any response that set one).
    pub fn update_credential(&self, credential: SessionCredential) {
        {
            let mut inner = self.write();
            if inner.credential == credential {
                return;
            }
            inner.credential = credential;
        }
        self.persist();
    }

    /// Drop the credential after definitive session loss.
    pub fn invalidate(&self) {
        {
            let mut inner = self.write();
            inner.credential = SessionCredential::None;
            inner.created_at = None;
        }
        self.forget();
    }

    /// Logout: drop the credential, the user and the settling window.
    pub fn end(&self) {
        {
            let mut inner = self.write();
            inner.username = None;
            inner.credential = SessionCredential::None;
            inner.created_at = None;
            inner.settling.clear();
        }
        self.forget();
    }

    pub fn arm_settling(&self) {
        self.write().settling.arm();
    }

    pub fn arm_settling_at(&self, now: DateTime<Utc>) {
        self.write().settling.arm_at(now);
    }

    /// Clear the settling window. Returns whether it was armed.
    pub fn clear_settling(&self) -> bool {
        let mut inner = self.write();
        let was_armed = inner.settling.is_armed();
        inner.settling.clear();
        was_armed
    }

    pub fn is_settling(&self) -> bool {
        self.read().settling.is_active()
    }

    pub fn is_settling_at(&self, now: DateTime<Utc>) -> bool {
        self.read().settling.is_active_at(now)
    }

    fn persist(&self) {
        let (Some(store), Some(data)) = (&self.store, self.snapshot()) else {
            return;
        };
        if let Err(e) = store.save(&data) {
            warn!(error = %e, "Failed to save session");
        }
    }

    fn forget(&self) {
        if let Some(ref store) = self.store {
            if let Err(e) = store.clear() {
                warn!(error = %e, "Failed to remove saved session");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn cookies(value: &str) -> SessionCredential {
        SessionCredential::Cookies {
            jar: BTreeMap::from([("sid".to_string(), value.to_string())]),
        }
    }

    #[test]
    fn test_store_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested"));
        assert!(store.load().unwrap().is_none());

        let data = SessionData {
            username: "dana".into(),
            credential: cookies("abc"),
            created_at: Utc::now(),
        };
        store.save(&data).unwrap();
        assert_eq!(store.load().unwrap(), Some(data));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn test_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SESSION_FILE), "{not json").unwrap();

        let err = SessionStore::new(dir.path().to_path_buf()).load().unwrap_err();
        assert!(err.to_string().contains("Failed to parse session file"));
    }

    #[test]
    fn test_state_writes_through_to_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().to_path_buf());

        let state = SessionState::restore(store.clone(), Duration::seconds(10)).unwrap();
        assert!(!state.has_credential());

        state.establish("dana", cookies("one"));
        assert_eq!(store.load().unwrap().unwrap().credential, cookies("one"));

        state.update_credential(cookies("two"));
        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.credential, cookies("two"));
        assert_eq!(saved.username, "dana");

        let restored = SessionState::restore(store.clone(), Duration::seconds(10)).unwrap();
        assert_eq!(restored.username().as_deref(), Some("dana"));
        assert_eq!(restored.credential(), cookies("two"));

        state.invalidate();
        assert!(store.load().unwrap().is_none());
        assert!(!state.has_credential());
        assert_eq!(state.username().as_deref(), Some("dana"));
    }

    #[test]
    fn test_settling_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().to_path_buf());

        let state = SessionState::restore(store.clone(), Duration::seconds(60)).unwrap();
        state.establish("dana", cookies("one"));
        state.arm_settling();
        assert!(state.is_settling());

        let restored = SessionState::restore(store, Duration::seconds(60)).unwrap();
        assert!(!restored.is_settling());
    }

    #[test]
    fn test_end_clears_everything() {
        let state = SessionState::new(Duration::seconds(10));
        state.establish("dana", cookies("one"));
        state.arm_settling();

        state.end();

        assert!(!state.has_credential());
        assert!(state.username().is_none());
        assert!(!state.is_settling());
        assert!(state.snapshot().is_none());
    }

    #[test]
    fn test_clear_settling_reports_previous_state() {
        let state = SessionState::new(Duration::seconds(10));
        assert!(!state.clear_settling());

        let now = Utc::now();
        state.arm_settling_at(now);
        assert!(state.is_settling_at(now + Duration::seconds(5)));
        assert!(!state.is_settling_at(now + Duration::seconds(11)));
        assert!(state.clear_settling());
        assert!(!state.is_settling_at(now));
    }
}
