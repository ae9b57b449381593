use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use cartsaver_core::config::Configuration;
use cartsaver_core::events::{EventType, FunnelEvent};
use cartsaver_core::ids::{NudgeId, SessionId};

use crate::cart::{CartSnapshot, CartSource};
use crate::config::ConfigSource;
use crate::coupons::{CouponGrant, CouponSource};
use crate::error::ApiError;
use crate::events::{Delivery, EventSink};

/// Configuration source returning a fixed answer.
pub struct MockConfigSource {
    response: Result<Configuration, ApiError>,
    call_count: AtomicUsize,
}

impl MockConfigSource {
    pub fn new(config: Configuration) -> Self {
        Self {
            response: Ok(config),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: ApiError) -> Self {
        Self {
            response: Err(error),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ConfigSource for MockConfigSource {
    async fn fetch(&self, _shop_domain: &str) -> Result<Configuration, ApiError> {
        let _ = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.response.clone()
    }
}

/// Pre-programmed coupon outcomes, consumed in order.
#[derive(Clone, Debug)]
pub enum MockCoupon {
    Grant(String),
    Error(ApiError),
    /// Wait a duration, then resolve the inner outcome.
    Delay(Duration, Box<MockCoupon>),
    /// Never resolves.
    Hang,
}

impl MockCoupon {
    pub fn grant(code: &str) -> Self {
        Self::Grant(code.to_string())
    }

    pub fn delayed(delay: Duration, inner: MockCoupon) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

pub struct MockCouponSource {
    responses: Mutex<VecDeque<MockCoupon>>,
    call_count: AtomicUsize,
}

impl MockCouponSource {
    pub fn new(responses: Vec<MockCoupon>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CouponSource for MockCouponSource {
    async fn request(
        &self,
        _nudge_id: &NudgeId,
        _session_id: &SessionId,
    ) -> Result<CouponGrant, ApiError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        let next = self.responses.lock().pop_front();
        let mut response = next.ok_or_else(|| {
            ApiError::Rejected {
                status: 0,
                body: format!("MockCouponSource: no response configured for call {idx}"),
            }
        })?;
        loop {
            match response {
                MockCoupon::Grant(code) => {
                    return Ok(CouponGrant {
                        code,
                        expires_at: None,
                    })
                }
                MockCoupon::Error(e) => return Err(e),
                MockCoupon::Delay(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    response = *inner;
                }
                MockCoupon::Hang => std::future::pending::<()>().await,
            }
        }
    }
}

/// Event sink that keeps everything it is sent. Deliveries resolve
/// immediately, to `Ok` or to the configured failure.
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<FunnelEvent>>,
    failure: Option<ApiError>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every event but fails each delivery with `error`.
    pub fn failing(error: ApiError) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failure: Some(error),
        }
    }

    pub fn events(&self) -> Vec<FunnelEvent> {
        self.events.lock().clone()
    }

    pub fn types(&self) -> Vec<EventType> {
        self.events.lock().iter().map(|e| e.event_type).collect()
    }

    pub fn count(&self, nudge_id: &str, event_type: EventType) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.nudge_id.as_str() == nudge_id && e.event_type == event_type)
            .count()
    }
}

impl EventSink for RecordingEventSink {
    fn send(&self, event: FunnelEvent) -> Delivery {
        self.events.lock().push(event);
        let outcome = match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        };
        Box::pin(std::future::ready(outcome))
    }
}

pub struct MockCartSource {
    response: Result<CartSnapshot, ApiError>,
}

impl MockCartSource {
    pub fn new(total_cents: f64, token: Option<&str>) -> Self {
        Self {
            response: Ok(CartSnapshot {
                token: token.map(str::to_string),
                total_price: Some(total_cents),
            }),
        }
    }

    pub fn failing(error: ApiError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

#[async_trait]
impl CartSource for MockCartSource {
    async fn snapshot(&self) -> Result<CartSnapshot, ApiError> {
        self.response.clone()
    }
}
