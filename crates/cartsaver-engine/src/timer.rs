//! Timer primitives shared by the detectors and the overlay.
//!
//! [`Debounce`] is a trailing deadline owned by a task and polled inside
//! `tokio::select!`. [`TimerHandle`] is a detached one-shot action that can be
//! called off explicitly.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Instant, Sleep};
use tokio_util::sync::CancellationToken;

/// Roughly 30 years; stands in for deadlines too far out to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + wait`, saturating instead of panicking on overflow.
pub fn deadline_after(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Restartable trailing deadline.
///
/// Disarmed until the first [`kick`](Self::kick). Every kick pushes the
/// deadline to `now + wait`. [`elapsed`](Self::elapsed) resolves once the
/// deadline passes and disarms the debounce; while disarmed it never resolves,
/// so it can sit in a `select!` arm unconditionally.
#[derive(Debug)]
pub struct Debounce {
    wait: Duration,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl Debounce {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            deadline: None,
        }
    }

    pub fn kick(&mut self) {
        let at = deadline_after(self.wait);
        if let Some(sleep) = self.deadline.as_mut() {
            sleep.as_mut().reset(at);
        } else {
            self.deadline = Some(Box::pin(tokio::time::sleep_until(at)));
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Cancel-safe: dropping the future before it resolves leaves the deadline armed.
    pub async fn elapsed(&mut self) {
        match self.deadline.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.deadline = None;
            }
            None => pending::<()>().await,
        }
    }
}

/// A scheduled one-shot action with explicit cancellation.
///
/// Dropping the handle does not cancel the action.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    cancel: CancellationToken,
}

impl TimerHandle {
    /// Run `action` after `delay` unless cancelled first. Must be called inside a runtime.
    pub fn schedule<F>(delay: Duration, action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        drop(tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                () = sleep(delay) => action(),
            }
        }));
        Self { cancel }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
