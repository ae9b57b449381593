use std::sync::Arc;

use serde_json::json;
use tracing::{debug, trace};

use cartsaver_api::events::EventSink;
use cartsaver_core::clock::Clock;
use cartsaver_core::events::{EventType, FunnelEvent};

use crate::coordinator::ActiveNudge;
use crate::error::EngineError;
use crate::page::PageContext;

/// Builds funnel events for a display and hands them to the sink.
pub struct EventReporter {
    sink: Arc<dyn EventSink>,
    page: Arc<PageContext>,
    clock: Arc<dyn Clock>,
}

impl EventReporter {
    pub fn new(sink: Arc<dyn EventSink>, page: Arc<PageContext>, clock: Arc<dyn Clock>) -> Self {
        Self { sink, page, clock }
    }

    /// Hand the event to the sink now and let its delivery finish in the
    /// background. Failures are logged and dropped.
    pub fn report(&self, shown: &ActiveNudge, event_type: EventType, coupon_used: Option<String>) {
        let event = FunnelEvent {
            shop_domain: self.page.shop_domain.clone(),
            nudge_id: shown.nudge.id.clone(),
            event_type,
            session_id: shown.session_id.clone(),
            cart_token: self.page.cart_token(),
            cart_value: self.page.cart_value(),
            coupon_used,
            metadata: json!({ "trigger": shown.nudge.nudge_type.as_str() }),
            timestamp: self.clock.now_ms(),
        };
        trace!(
            nudge_id = %event.nudge_id,
            event_type = event_type.as_str(),
            display_id = shown.display_id,
            "reporting funnel event"
        );
        let nudge_id = event.nudge_id.clone();
        let delivery = self.sink.send(event);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(nudge_id = %nudge_id, "no runtime, funnel event not delivered");
            return;
        };
        drop(runtime.spawn(async move {
            match delivery.await {
                Ok(()) => trace!(
                    nudge_id = %nudge_id,
                    event_type = event_type.as_str(),
                    "funnel event delivered"
                ),
                Err(e) => {
                    let err = EngineError::delivery(&e);
                    debug!(
                        nudge_id = %nudge_id,
                        event_type = event_type.as_str(),
                        error = %err,
                        error_kind = err.error_kind(),
                        "funnel event dropped"
                    );
                }
            }
        }));
    }
}
