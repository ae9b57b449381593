use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use cartsaver_api::coupons::CouponSource;
use cartsaver_core::config::NudgeDefinition;
use cartsaver_core::ids::SessionId;

use crate::error::EngineError;

/// Bounded, best-effort coupon acquisition for one display.
pub struct CouponProvisioner {
    source: Arc<dyn CouponSource>,
    timeout: Duration,
}

impl CouponProvisioner {
    pub fn new(source: Arc<dyn CouponSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// A code, or `None` when coupons are off for the nudge or the request
    /// fails, comes back empty, or outlasts the timeout.
    pub async fn provision(&self, nudge: &NudgeDefinition, session_id: &SessionId) -> Option<String> {
        if !nudge.coupon_enabled {
            return None;
        }
        let outcome = tokio::time::timeout(self.timeout, self.source.request(&nudge.id, session_id)).await;
        let err = match outcome {
            Ok(Ok(grant)) if !grant.code.trim().is_empty() => {
                debug!(nudge_id = %nudge.id, expires_at = ?grant.expires_at, "coupon issued");
                return Some(grant.code);
            }
            Ok(Ok(_)) => EngineError::CouponUnavailable("empty code".into()),
            Ok(Err(e)) => EngineError::coupon(&e),
            Err(_) => EngineError::CouponUnavailable(format!("no answer within {:?}", self.timeout)),
        };
        warn!(
            nudge_id = %nudge.id,
            error = %err,
            error_kind = err.error_kind(),
            "showing nudge without coupon"
        );
        None
    }
}
