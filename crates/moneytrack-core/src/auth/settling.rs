use chrono::{DateTime, Duration, Utc};

/// Default grace window after a successful login, in seconds.
/// Long enough to cover a freshly issued cookie reaching the backend on
/// the first authenticated call, short enough that a genuinely dead
/// session still redirects promptly.
pub const DEFAULT_SETTLE_WINDOW_SECS: i64 = 10;

/// Post-login grace window.
///
/// While active, the transport must not redirect to the login route even
/// if a refresh fails. The window is a timestamp plus a fixed duration, so
/// it ends on its own even when nobody clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlingWindow {
    armed_at: Option<DateTime<Utc>>,
    duration: Duration,
}

impl SettlingWindow {
    pub fn new(duration: Duration) -> Self {
        Self {
            armed_at: None,
            duration,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn arm(&mut self) {
        self.arm_at(Utc::now());
    }

    pub fn arm_at(&mut self, now: DateTime<Utc>) {
        self.armed_at = Some(now);
    }

    pub fn clear(&mut self) {
        self.armed_at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.remaining_at(now).is_some()
    }

    /// Time left in the window, or `None` if it is not active.
    ///
    /// A window whose end lies past the last representable instant stays
    /// active until cleared.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        let armed_at = self.armed_at?;
        let remaining = match armed_at.checked_add_signed(self.duration) {
            Some(ends_at) => ends_at.signed_duration_since(now),
            None => return Some(self.duration),
        };
        (remaining > Duration::zero()).then_some(remaining)
    }
}

impl Default for SettlingWindow {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_SETTLE_WINDOW_SECS))
    }
}
