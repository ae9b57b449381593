//! Admission control: at most one overlay at a time, each nudge once per
//! session, at most `max_per_session` nudges per session, and a durable
//! per-nudge cooldown.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use cartsaver_core::clock::Clock;
use cartsaver_core::config::{NudgeDefinition, Policy};
use cartsaver_core::ids::SessionId;
use cartsaver_store::{CooldownStore, SessionStore};

/// Why a firing was turned away. Rejections have no side effects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectReason {
    AlreadyActive,
    AlreadyShown,
    SessionCapReached { shown: usize, max: usize },
    CoolingDown { remaining: Duration },
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyActive => "already_active",
            Self::AlreadyShown => "already_shown",
            Self::SessionCapReached { .. } => "session_cap_reached",
            Self::CoolingDown { .. } => "cooling_down",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionCapReached { shown, max } => {
                write!(f, "session cap reached ({shown}/{max})")
            }
            Self::CoolingDown { remaining } => {
                write!(f, "cooling down ({}s left)", remaining.as_secs())
            }
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug)]
pub enum Admission {
    Admitted(Arc<ActiveNudge>),
    Rejected(RejectReason),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }
}

/// The one display currently holding the overlay slot.
#[derive(Debug)]
pub struct ActiveNudge {
    pub display_id: u64,
    pub nudge: NudgeDefinition,
    pub session_id: SessionId,
    coupon: Mutex<Option<String>>,
    terminated: AtomicBool,
    dismiss: CancellationToken,
}

impl ActiveNudge {
    pub fn coupon(&self) -> Option<String> {
        self.coupon.lock().clone()
    }

    pub fn set_coupon(&self, code: Option<String>) {
        *self.coupon.lock() = code;
    }

    /// Claims the single terminal transition. Only the first caller gets `true`.
    pub fn begin_termination(&self) -> bool {
        self.terminated
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Ask the controller to dismiss this display as if the visitor closed it.
    pub fn request_dismiss(&self) {
        self.dismiss.cancel();
    }

    pub async fn dismiss_requested(&self) {
        self.dismiss.cancelled().await;
    }
}

pub struct TriggerCoordinator {
    policy: Policy,
    sessions: Arc<SessionStore>,
    cooldowns: Arc<CooldownStore>,
    clock: Arc<dyn Clock>,
    active: Mutex<Option<Arc<ActiveNudge>>>,
    next_display: AtomicU64,
}

impl TriggerCoordinator {
    pub fn new(
        policy: Policy,
        sessions: Arc<SessionStore>,
        cooldowns: Arc<CooldownStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            policy,
            sessions,
            cooldowns,
            clock,
            active: Mutex::new(None),
            next_display: AtomicU64::new(1),
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Decide and, on admission, record the display before returning.
    ///
    /// The slot lock is held from the first check through the session and
    /// cooldown writes, so two firings can never both be admitted.
    pub fn request_display(&self, nudge: &NudgeDefinition) -> Admission {
        let mut slot = self.active.lock();

        if let Some(active) = slot.as_ref() {
            return self.reject(nudge, RejectReason::AlreadyActive, Some(active.display_id));
        }

        let session = self.sessions.get_session();
        if session.has_shown(&nudge.id) {
            return self.reject(nudge, RejectReason::AlreadyShown, None);
        }

        let max = self.policy.max_per_session();
        if session.shown_count() >= max {
            return self.reject(
                nudge,
                RejectReason::SessionCapReached {
                    shown: session.shown_count(),
                    max,
                },
                None,
            );
        }

        let now = self.clock.now_ms();
        if let Some(last) = self.cooldowns.last_shown(&nudge.id) {
            let cooldown_ms = i64::try_from(self.policy.cooldown().as_millis()).unwrap_or(i64::MAX);
            let since = now.saturating_sub(last);
            if since < cooldown_ms {
                let remaining = cooldown_ms.saturating_sub(since.max(0));
                return self.reject(
                    nudge,
                    RejectReason::CoolingDown {
                        remaining: Duration::from_millis(remaining.unsigned_abs()),
                    },
                    None,
                );
            }
        }

        let shown = Arc::new(ActiveNudge {
            display_id: self.next_display.fetch_add(1, Ordering::Relaxed),
            nudge: nudge.clone(),
            session_id: session.id.clone(),
            coupon: Mutex::new(None),
            terminated: AtomicBool::new(false),
            dismiss: CancellationToken::new(),
        });
        *slot = Some(shown.clone());
        let _ = self.sessions.mark_shown(&nudge.id);
        self.cooldowns.set_shown(&nudge.id, now);

        info!(
            nudge_id = %nudge.id,
            nudge_type = %nudge.nudge_type,
            session_id = %session.id,
            display_id = shown.display_id,
            "nudge admitted"
        );
        Admission::Admitted(shown)
    }

    /// Free the slot if `display_id` still holds it.
    pub fn release(&self, display_id: u64) -> bool {
        let mut slot = self.active.lock();
        if !slot.as_ref().is_some_and(|a| a.display_id == display_id) {
            return false;
        }
        *slot = None;
        debug!(display_id, "overlay slot released");
        true
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    pub fn active(&self) -> Option<Arc<ActiveNudge>> {
        self.active.lock().clone()
    }

    fn reject(
        &self,
        nudge: &NudgeDefinition,
        reason: RejectReason,
        blocking_display: Option<u64>,
    ) -> Admission {
        debug!(
            nudge_id = %nudge.id,
            nudge_type = %nudge.nudge_type,
            reason = reason.as_str(),
            blocking_display,
            "nudge rejected: {reason}"
        );
        Admission::Rejected(reason)
    }
}
