//! Clients for the collaborators around the engine: the CartSaver backend
//! (configuration, coupons, funnel events) and the storefront's cart endpoint.
//!
//! Each collaborator is a trait so the engine can run against the HTTP
//! implementations in production and against [`mock`] in tests.

pub mod cart;
pub mod client;
pub mod config;
pub mod coupons;
pub mod error;
pub mod events;

pub mod mock;

pub use cart::{CartSource, HttpCartSource};
pub use client::ApiClient;
pub use config::{ConfigSource, HttpConfigSource};
pub use coupons::{CouponGrant, CouponSource, HttpCouponSource};
pub use error::ApiError;
pub use events::{Delivery, EventSink, HttpEventSink};
