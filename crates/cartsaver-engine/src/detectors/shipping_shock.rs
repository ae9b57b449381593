use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::debug;

use cartsaver_core::config::{NudgeDefinition, NudgeType};
use cartsaver_core::signals::PageSignal;

use super::{pause, spawn_watch, Detector, DetectorContext, DetectorHandle, TriggerSink};
use crate::page::{Viewport, SHIPPING_SELECTORS};
use crate::signals::next_signal;
use crate::timer::Debounce;

/// Scroll pause after which the shipping line is looked for.
const SCROLL_SETTLE: Duration = Duration::from_secs(2);
const DEFAULT_FALLBACK: Duration = Duration::from_secs(8);
const DEFAULT_DETECTED_DELAY: Duration = Duration::from_secs(3);

/// Visitor on the cart page looking at (or sitting in front of) shipping costs.
pub struct ShippingShockDetector;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Timings {
    fallback: Duration,
    detected_delay: Duration,
    fallback_delay: Duration,
}

impl Timings {
    fn for_nudge(nudge: &NudgeDefinition) -> Self {
        Self {
            fallback: nudge
                .trigger_config
                .seconds_or("fallback_seconds", DEFAULT_FALLBACK),
            detected_delay: nudge.delay_or(DEFAULT_DETECTED_DELAY),
            fallback_delay: nudge.delay_or(Duration::ZERO),
        }
    }
}

impl Detector for ShippingShockDetector {
    fn nudge_type(&self) -> NudgeType {
        NudgeType::ShippingShock
    }

    fn arm(&self, nudge: NudgeDefinition, ctx: DetectorContext) -> Option<DetectorHandle> {
        if !ctx.page.is_cart_page() {
            debug!(nudge_id = %nudge.id, path = %ctx.page.path, "not a cart page, shipping shock stays idle");
            return None;
        }
        let timings = Timings::for_nudge(&nudge);
        let watch = watch(ctx.signals, ctx.viewport, ctx.sink.clone(), timings);
        Some(spawn_watch(nudge, ctx.sink, watch))
    }
}

async fn watch(
    mut signals: broadcast::Receiver<PageSignal>,
    viewport: Arc<dyn Viewport>,
    sink: Arc<dyn TriggerSink>,
    timings: Timings,
) -> bool {
    let fallback = sleep(timings.fallback);
    tokio::pin!(fallback);
    let mut fallback_armed = true;
    let mut scroll = Debounce::new(SCROLL_SETTLE);

    let delay = loop {
        tokio::select! {
            () = &mut fallback, if fallback_armed => {
                fallback_armed = false;
                if sink.overlay_active() {
                    debug!("shipping fallback elapsed under an open overlay, still watching scroll");
                    continue;
                }
                break timings.fallback_delay;
            }
            () = scroll.elapsed() => {
                if viewport.element_fully_visible(&SHIPPING_SELECTORS) {
                    break timings.detected_delay;
                }
            }
            signal = next_signal(&mut signals) => match signal {
                Some(PageSignal::Scroll { .. }) => scroll.kick(),
                Some(_) => {}
                None => return false,
            },
        }
    };
    drop(signals);
    pause(delay).await;
    true
}
