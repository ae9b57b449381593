use std::time::Duration;

use tokio::sync::broadcast;

use cartsaver_core::config::{NudgeDefinition, NudgeType};
use cartsaver_core::signals::PageSignal;

use super::{pause, spawn_watch, Detector, DetectorContext, DetectorHandle};
use crate::signals::next_signal;

/// Pointer leaving through the top edge of the viewport.
pub struct ExitIntentDetector;

impl Detector for ExitIntentDetector {
    fn nudge_type(&self) -> NudgeType {
        NudgeType::ExitIntent
    }

    fn arm(&self, nudge: NudgeDefinition, ctx: DetectorContext) -> Option<DetectorHandle> {
        let delay = nudge.delay_or(Duration::ZERO);
        Some(spawn_watch(nudge, ctx.sink, watch(ctx.signals, delay)))
    }
}

async fn watch(mut signals: broadcast::Receiver<PageSignal>, delay: Duration) -> bool {
    loop {
        match next_signal(&mut signals).await {
            Some(signal) if signal.is_exit_gesture() => break,
            Some(_) => {}
            None => return false,
        }
    }
    // Later exit gestures are ignored once the first one is seen.
    drop(signals);
    pause(delay).await;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::testing::{settle, Rig};
    use tokio::time::{sleep, Instant};

    fn nudge(delay: Option<i64>) -> NudgeDefinition {
        let mut nudge = NudgeDefinition::new("exit", NudgeType::ExitIntent);
        nudge.delay_seconds = delay;
        nudge
    }

    #[tokio::test(start_paused = true)]
    async fn fires_immediately_without_delay() {
        let rig = Rig::on("/products/mug");
        let _handle = rig.arm(nudge(None)).unwrap();
        rig.hub.dispatch(PageSignal::PointerLeave { y: 4.0 });
        settle().await;
        assert_eq!(rig.sink.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ignores_sideways_exits() {
        let rig = Rig::on("/");
        let _handle = rig.arm(nudge(None)).unwrap();
        rig.hub.dispatch(PageSignal::PointerLeave { y: 300.0 });
        rig.hub.dispatch(PageSignal::PointerMove);
        settle().await;
        assert_eq!(rig.sink.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn honours_delay_and_fires_once() {
        let rig = Rig::on("/");
        let handle = rig.arm(nudge(Some(2))).unwrap();
        let start = Instant::now();
        rig.hub.dispatch(PageSignal::PointerLeave { y: 0.0 });
        rig.hub.dispatch(PageSignal::PointerLeave { y: 1.0 });
        settle().await;
        assert_eq!(rig.sink.count(), 0);

        sleep(Duration::from_secs(3)).await;
        rig.hub.dispatch(PageSignal::PointerLeave { y: 0.0 });
        sleep(Duration::from_secs(3)).await;
        assert_eq!(rig.sink.count(), 1);
        let waited = rig.sink.fired_at().unwrap() - start;
        assert!(waited >= Duration::from_secs(2) && waited < Duration::from_millis(2010));
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_means_immediate() {
        let rig = Rig::on("/");
        let _handle = rig.arm(nudge(Some(0))).unwrap();
        rig.hub.dispatch(PageSignal::PointerLeave { y: 10.0 });
        settle().await;
        assert_eq!(rig.sink.count(), 1);
    }
}
