pub mod clock;
pub mod config;
pub mod events;
pub mod ids;
pub mod signals;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Configuration, CouponType, NudgeDefinition, NudgeType, Policy, TriggerConfig};
pub use events::{EventType, FunnelEvent};
pub use ids::{NudgeId, SessionId};
pub use signals::PageSignal;
