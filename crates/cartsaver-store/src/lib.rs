//! Visit-scoped and durable state for the nudge engine.
//!
//! Both stores sit on a [`KeyValueStore`], the engine's stand-in for browser
//! session/local storage. Every failure in here degrades instead of
//! propagating: the session falls back to memory, cooldowns fail open.

pub mod cooldown;
pub mod database;
pub mod error;
pub mod kv;
pub mod schema;
pub mod session;

pub use cooldown::CooldownStore;
pub use database::{Database, SqliteKv};
pub use error::StoreError;
pub use kv::{KeyValueStore, MemoryStore, UnavailableStore};
pub use session::{SessionState, SessionStore};
