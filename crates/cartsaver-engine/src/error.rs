use cartsaver_api::ApiError;
use cartsaver_store::StoreError;

/// Degradations the engine can hit during a visit. None of them is fatal:
/// each one ends in "show nothing" or "show without the enhancement".
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("configuration unavailable: {0}")]
    ConfigUnavailable(String),

    #[error("coupon unavailable: {0}")]
    CouponUnavailable(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),

    #[error("event delivery failed: {0}")]
    EventDeliveryFailure(String),

    #[error("render failed: {0}")]
    RenderFailed(#[from] SurfaceError),
}

impl EngineError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::ConfigUnavailable(_) => "config_unavailable",
            Self::CouponUnavailable(_) => "coupon_unavailable",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::EventDeliveryFailure(_) => "event_delivery_failure",
            Self::RenderFailed(_) => "render_failed",
        }
    }

    pub fn config(e: &ApiError) -> Self {
        Self::ConfigUnavailable(format!("{} ({})", e, e.error_kind()))
    }

    pub fn coupon(e: &ApiError) -> Self {
        Self::CouponUnavailable(format!("{} ({})", e, e.error_kind()))
    }

    pub fn delivery(e: &ApiError) -> Self {
        Self::EventDeliveryFailure(format!("{} ({})", e, e.error_kind()))
    }
}

/// Failure reported by an [`OverlaySurface`](crate::overlay::OverlaySurface).
#[derive(Debug, Clone, thiserror::Error)]
pub enum SurfaceError {
    #[error("no document body to attach to")]
    Detached,
    #[error("{0}")]
    Other(String),
}
