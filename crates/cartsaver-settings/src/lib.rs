//! # cartsaver-settings
//!
//! Host settings for the CartSaver engine, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`CartsaverSettings::default()`]
//! 2. **User file**: `~/.cartsaver/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `CARTSAVER_*` overrides (highest priority)
//!
//! These are the host's knobs (endpoints, timeouts, storage). The per-shop
//! nudge configuration is fetched from the backend at visit time instead.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
