//! Settings type definitions.
//!
//! Field names are camelCase in `settings.json`. Every section is
//! `#[serde(default)]`, so a partial file only overrides what it names.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root settings for a CartSaver engine host.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CartsaverSettings {
    /// Backend endpoints and HTTP limits.
    pub api: ApiSettings,
    /// Storefront this host is running inside.
    pub shop: ShopSettings,
    /// Engine timing knobs.
    pub engine: EngineSettings,
    /// Local persistence.
    pub storage: StorageSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Base URL of the CartSaver backend (`{host}/api/...`).
    pub host: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            host: "http://localhost:3000".to_string(),
            connect_timeout_ms: 5_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl ApiSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShopSettings {
    /// `*.myshopify.com` domain used to key the configuration fetch.
    pub domain: Option<String>,
    /// Storefront origin for `/cart.js`; no cart probe when unset.
    pub storefront_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Upper bound on waiting for a coupon before rendering without one.
    pub coupon_timeout_ms: u64,
    /// How long a closing overlay stays active while its exit animation plays.
    pub exit_animation_ms: u64,
    /// How long the copy button shows "Copied!".
    pub copy_feedback_ms: u64,
    /// Path the call-to-action navigates to.
    pub cart_path: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            coupon_timeout_ms: 4_000,
            exit_animation_ms: 350,
            copy_feedback_ms: 2_000,
            cart_path: "/cart".to_string(),
        }
    }
}

impl EngineSettings {
    pub fn coupon_timeout(&self) -> Duration {
        Duration::from_millis(self.coupon_timeout_ms)
    }

    pub fn exit_animation(&self) -> Duration {
        Duration::from_millis(self.exit_animation_ms)
    }

    pub fn copy_feedback(&self) -> Duration {
        Duration::from_millis(self.copy_feedback_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// SQLite file backing session and cooldown storage.
    pub db_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: crate::loader::cartsaver_dir()
                .join("storage.db")
                .to_string_lossy()
                .into_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_defaults() {
        let engine = EngineSettings::default();
        assert_eq!(engine.coupon_timeout(), Duration::from_secs(4));
        assert_eq!(engine.exit_animation(), Duration::from_millis(350));
        assert_eq!(engine.copy_feedback(), Duration::from_secs(2));
        assert_eq!(engine.cart_path, "/cart");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: CartsaverSettings =
            serde_json::from_str(r#"{"engine": {"couponTimeoutMs": 1500}}"#).unwrap();
        assert_eq!(settings.engine.coupon_timeout_ms, 1500);
        assert_eq!(settings.engine.exit_animation_ms, 350);
        assert_eq!(settings.api, ApiSettings::default());
    }

    #[test]
    fn camel_case_wire_names() {
        let json = serde_json::to_value(CartsaverSettings::default()).unwrap();
        assert!(json["api"].get("requestTimeoutMs").is_some());
        assert!(json["shop"].get("storefrontUrl").is_some());
        assert!(json["storage"].get("dbPath").is_some());
    }
}
