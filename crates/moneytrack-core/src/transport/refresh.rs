//! Singleflight for session refreshes.
//!
//! Concurrent callers that hit a 401 at the same time share one in-flight
//! refresh instead of each sending their own.

use std::sync::{Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

type InFlight = Shared<BoxFuture<'static, bool>>;

#[derive(Default)]
pub struct RefreshGate {
    in_flight: Mutex<Option<InFlight>>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Await the refresh already in flight, or start one with `start`.
    /// Resolves to whether the refresh succeeded.
    pub async fn run<F>(&self, start: F) -> bool
    where
        F: FnOnce() -> BoxFuture<'static, bool>,
    {
        let (flight, joined) = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(existing) => (existing.clone(), true),
                None => {
                    let flight = start().shared();
                    *slot = Some(flight.clone());
                    (flight, false)
                }
            }
        };

        if joined {
            debug!("Joining in-flight session refresh");
        }

        let refreshed = flight.clone().await;

        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&flight)) {
            *slot = None;
        }

        refreshed
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let gate = Arc::new(RefreshGate::new());
        let started = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let spawn_caller = || {
            let gate = Arc::clone(&gate);
            let started = Arc::clone(&started);
            let release = Arc::clone(&release);
            tokio::spawn(async move {
                gate.run(move || {
                    started.fetch_add(1, Ordering::SeqCst);
                    async move {
                        release.notified().await;
                        true
                    }
                    .boxed()
                })
                .await
            })
        };

        let first = spawn_caller();
        let second = spawn_caller();

        // Let both callers reach the gate before the refresh completes.
        while started.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        release.notify_one();

        assert!(first.await.unwrap());
        assert!(second.await.unwrap());
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert!(gate.is_idle());
    }

    #[tokio::test]
    async fn test_sequential_callers_refresh_again() {
        let gate = RefreshGate::new();
        let started = AtomicUsize::new(0);

        for expected in [false, true] {
            let result = gate
                .run(|| {
                    started.fetch_add(1, Ordering::SeqCst);
                    async move { expected }.boxed()
                })
                .await;
            assert_eq!(result, expected);
        }

        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert!(gate.is_idle());
    }
}
