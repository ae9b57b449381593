//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`CartsaverSettings::default()`]
//! 2. If `~/.cartsaver/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `CARTSAVER_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::CartsaverSettings;

/// `~/.cartsaver`, falling back to `/tmp/.cartsaver` without a home directory.
pub fn cartsaver_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".cartsaver")
}

/// Resolve the path to the settings file (`~/.cartsaver/settings.json`).
pub fn settings_path() -> PathBuf {
    cartsaver_dir().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<CartsaverSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<CartsaverSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn load_file_layer(path: &Path) -> Result<CartsaverSettings> {
    let defaults = serde_json::to_value(CartsaverSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut CartsaverSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
///
/// Invalid values are ignored with a warning and the file/default value stays.
pub fn apply_overrides<F>(settings: &mut CartsaverSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── API ─────────────────────────────────────────────────────────
    if let Some(v) = env.string("CARTSAVER_HOST") {
        settings.api.host = v.trim_end_matches('/').to_string();
    }
    if let Some(v) = env.u64_in("CARTSAVER_REQUEST_TIMEOUT_MS", 100, 120_000) {
        settings.api.request_timeout_ms = v;
    }

    // ── Shop ────────────────────────────────────────────────────────
    if let Some(v) = env.string("CARTSAVER_SHOP") {
        settings.shop.domain = Some(v);
    }
    if let Some(v) = env.string("CARTSAVER_STOREFRONT_URL") {
        settings.shop.storefront_url = Some(v.trim_end_matches('/').to_string());
    }

    // ── Engine ──────────────────────────────────────────────────────
    if let Some(v) = env.u64_in("CARTSAVER_COUPON_TIMEOUT_MS", 100, 60_000) {
        settings.engine.coupon_timeout_ms = v;
    }
    if let Some(v) = env.u64_in("CARTSAVER_EXIT_ANIMATION_MS", 0, 10_000) {
        settings.engine.exit_animation_ms = v;
    }

    // ── Storage / logging ───────────────────────────────────────────
    if let Some(v) = env.string("CARTSAVER_DB_PATH") {
        settings.storage.db_path = v;
    }
    if let Some(v) = env.string("CARTSAVER_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("CARTSAVER_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = self.string(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64_in(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = self.string(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, min, max, "invalid integer env var, ignoring");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"engine": {"a": 1, "b": 2}});
        let source = serde_json::json!({"engine": {"a": 10}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["engine"]["a"], 10);
        assert_eq!(merged["engine"]["b"], 2);
    }

    #[test]
    fn merge_skips_nulls_and_replaces_arrays() {
        let target = serde_json::json!({"a": 1, "list": [1, 2, 3]});
        let source = serde_json::json!({"a": null, "list": [9]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["list"], serde_json::json!([9]));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_file_layer(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, CartsaverSettings::default());
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"api": {"host": "https://cs.example.com"}, "shop": {"domain": "demo.myshopify.com"}}"#,
        )
        .unwrap();
        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.api.host, "https://cs.example.com");
        assert_eq!(settings.api.request_timeout_ms, 10_000);
        assert_eq!(settings.shop.domain.as_deref(), Some("demo.myshopify.com"));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_file_layer(&path), Err(SettingsError::Json(_))));
    }

    #[test]
    fn overrides_apply_valid_values() {
        let mut settings = CartsaverSettings::default();
        apply_overrides(
            &mut settings,
            vars(&[
                ("CARTSAVER_HOST", "https://cs.example.com/"),
                ("CARTSAVER_SHOP", "demo.myshopify.com"),
                ("CARTSAVER_COUPON_TIMEOUT_MS", "2500"),
                ("CARTSAVER_EXIT_ANIMATION_MS", "0"),
                ("CARTSAVER_LOG_JSON", "yes"),
            ]),
        );
        assert_eq!(settings.api.host, "https://cs.example.com");
        assert_eq!(settings.shop.domain.as_deref(), Some("demo.myshopify.com"));
        assert_eq!(settings.engine.coupon_timeout_ms, 2500);
        assert_eq!(settings.engine.exit_animation_ms, 0);
        assert!(settings.logging.json);
    }

    #[test]
    fn overrides_ignore_invalid_values() {
        let mut settings = CartsaverSettings::default();
        apply_overrides(
            &mut settings,
            vars(&[
                ("CARTSAVER_COUPON_TIMEOUT_MS", "forever"),
                ("CARTSAVER_REQUEST_TIMEOUT_MS", "5"),
                ("CARTSAVER_LOG_JSON", "maybe"),
                ("CARTSAVER_SHOP", "   "),
            ]),
        );
        assert_eq!(settings, CartsaverSettings::default());
    }

    #[test]
    fn parse_helpers() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("nah"), None);
        assert_eq!(parse_u64_range("50", 1, 100), Some(50));
        assert_eq!(parse_u64_range("500", 1, 100), None);
        assert_eq!(parse_u64_range("-1", 0, 100), None);
    }
}
