use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::sleep;

use cartsaver_core::config::{NudgeDefinition, NudgeType};
use cartsaver_core::signals::PageSignal;

use super::{spawn_watch, Detector, DetectorContext, DetectorHandle};
use crate::signals::next_signal;
use crate::timer::{deadline_after, Debounce};

const DEFAULT_DWELL: Duration = Duration::from_secs(45);
/// Quiet period after activity before the dwell countdown starts over.
const ACTIVITY_SETTLE: Duration = Duration::from_secs(1);

/// Visitor lingering without acting.
pub struct HesitantBrowserDetector;

impl Detector for HesitantBrowserDetector {
    fn nudge_type(&self) -> NudgeType {
        NudgeType::HesitantBrowser
    }

    fn arm(&self, nudge: NudgeDefinition, ctx: DetectorContext) -> Option<DetectorHandle> {
        let dwell = nudge.trigger_config.seconds_or("time_seconds", DEFAULT_DWELL);
        Some(spawn_watch(nudge, ctx.sink, watch(ctx.signals, dwell)))
    }
}

async fn watch(mut signals: broadcast::Receiver<PageSignal>, dwell: Duration) -> bool {
    let countdown = sleep(dwell);
    tokio::pin!(countdown);
    let mut settle = Debounce::new(ACTIVITY_SETTLE);

    loop {
        tokio::select! {
            () = &mut countdown => return true,
            () = settle.elapsed() => {
                countdown.as_mut().reset(deadline_after(dwell));
            }
            signal = next_signal(&mut signals) => match signal {
                Some(signal) if signal.is_activity() => settle.kick(),
                Some(_) => {}
                None => return false,
            },
        }
    }
}
