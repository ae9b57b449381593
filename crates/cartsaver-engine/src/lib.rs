//! # cartsaver-engine
//!
//! Storefront nudge engine: watches a page for abandonment signals, decides
//! whether a nudge may be shown, and drives the overlay through its lifecycle.
//!
//! - [`detectors`]: exit intent, hesitant browsing, shipping-cost shock
//! - [`coordinator`]: one overlay at a time, session cap, per-nudge cooldown
//! - [`coupons`]: bounded coupon acquisition
//! - [`overlay`]: view model, host surface, display lifecycle
//! - [`engine`]: the per-page context wiring it together

#![deny(unsafe_code)]

pub mod coordinator;
pub mod coupons;
pub mod detectors;
pub mod engine;
pub mod error;
pub mod overlay;
pub mod page;
pub mod reporter;
pub mod signals;
pub mod timer;

pub mod mock;

pub use coordinator::{ActiveNudge, Admission, RejectReason, TriggerCoordinator};
pub use engine::{Engine, EngineDeps};
pub use error::{EngineError, SurfaceError};
pub use overlay::{OverlaySurface, OverlayView, PresentOutcome};
pub use page::{ElementBox, PageContext, PageLayout, Viewport, SHIPPING_SELECTORS};
pub use signals::SignalHub;
