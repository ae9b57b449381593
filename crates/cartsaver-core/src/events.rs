use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{NudgeId, SessionId};

/// Funnel stage reported for a display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// First successful render of a nudge.
    Impression,
    /// Call-to-action accepted.
    Click,
    /// Backdrop, close control or Escape.
    Dismissed,
    /// Order placed with a nudge coupon. Reported by the backend, never by the engine.
    Converted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Impression => "impression",
            Self::Click => "click",
            Self::Dismissed => "dismissed",
            Self::Converted => "converted",
        }
    }
}

/// Body of `POST /api/events`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunnelEvent {
    pub shop_domain: String,
    pub nudge_id: NudgeId,
    pub event_type: EventType,
    pub session_id: SessionId,
    pub cart_token: Option<String>,
    pub cart_value: Option<f64>,
    pub coupon_used: Option<String>,
    #[serde(default)]
    pub metadata: Value,
    /// Epoch milliseconds at which the engine observed the transition.
    pub timestamp: i64,
}
