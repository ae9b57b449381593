//! Trigger detectors.
//!
//! Each detector watches page signals for one condition and asks the
//! coordinator for a display exactly once. Detectors never re-arm and do not
//! look at the admission outcome.

mod exit_intent;
mod hesitant;
mod shipping_shock;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use cartsaver_core::config::{NudgeDefinition, NudgeType};
use cartsaver_core::signals::PageSignal;

use crate::page::{PageContext, Viewport};

pub use exit_intent::ExitIntentDetector;
pub use hesitant::HesitantBrowserDetector;
pub use shipping_shock::ShippingShockDetector;

/// Where detectors send their firing.
pub trait TriggerSink: Send + Sync {
    fn fire(&self, nudge: &NudgeDefinition);
    /// Whether an overlay currently holds the display slot.
    fn overlay_active(&self) -> bool;
}

/// Everything a detector may observe. The receiver is subscribed before
/// `arm` is called, so nothing dispatched after arming is missed.
pub struct DetectorContext {
    pub signals: broadcast::Receiver<PageSignal>,
    pub page: Arc<PageContext>,
    pub viewport: Arc<dyn Viewport>,
    pub sink: Arc<dyn TriggerSink>,
}

pub trait Detector: Send + Sync {
    fn nudge_type(&self) -> NudgeType;

    /// Start watching. `None` when the condition cannot occur on this page.
    fn arm(&self, nudge: NudgeDefinition, ctx: DetectorContext) -> Option<DetectorHandle>;
}

pub fn detector_for(nudge_type: NudgeType) -> Box<dyn Detector> {
    match nudge_type {
        NudgeType::ExitIntent => Box::new(ExitIntentDetector),
        NudgeType::HesitantBrowser => Box::new(HesitantBrowserDetector),
        NudgeType::ShippingShock => Box::new(ShippingShockDetector),
    }
}

/// Disposable watcher. Dropping the handle disposes of it too.
#[derive(Debug)]
pub struct DetectorHandle {
    nudge_type: NudgeType,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl DetectorHandle {
    pub fn nudge_type(&self) -> NudgeType {
        self.nudge_type
    }

    pub fn dispose(&self) {
        self.cancel.cancel();
    }

    /// Fired, disposed, or the signal hub went away.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for DetectorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Sleep for `delay`; a zero delay does not yield to the timer.
pub(crate) async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Run `watch` until it reports the condition met (then fire once) or the
/// handle is disposed. `watch` resolves to `false` when signals stop.
pub(crate) fn spawn_watch<F>(
    nudge: NudgeDefinition,
    sink: Arc<dyn TriggerSink>,
    watch: F,
) -> DetectorHandle
where
    F: Future<Output = bool> + Send + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let nudge_type = nudge.nudge_type;
    debug!(nudge_id = %nudge.id, %nudge_type, "detector armed");
    let task = tokio::spawn(async move {
        tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!(nudge_id = %nudge.id, %nudge_type, "detector disposed");
            }
            met = watch => {
                if met {
                    debug!(nudge_id = %nudge.id, %nudge_type, "trigger condition met");
                    sink.fire(&nudge);
                }
            }
        }
    });
    DetectorHandle {
        nudge_type,
        cancel,
        task,
    }
}
