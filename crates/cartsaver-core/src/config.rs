//! Per-visit configuration snapshot as served by `GET /api/config/{shop}`.
//!
//! The snapshot is immutable once loaded. Deserialization is lenient: nullable
//! columns map to `Option`, and a nudge the engine does not understand (unknown
//! type, malformed fields) is dropped instead of failing the whole snapshot.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::ids::NudgeId;

/// Session cap applied when the shop leaves `max_per_session` unset or zero.
pub const DEFAULT_MAX_PER_SESSION: u32 = 2;
/// Cooldown applied when the shop leaves `cooldown_hours` unset or zero.
pub const DEFAULT_COOLDOWN_HOURS: u32 = 24;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub enabled: bool,
    #[serde(flatten)]
    pub policy: Policy,
    #[serde(default, deserialize_with = "lenient_nudges")]
    pub nudges: Vec<NudgeDefinition>,
}

impl Configuration {
    /// First configured nudge of the given trigger type.
    pub fn nudge_for(&self, nudge_type: NudgeType) -> Option<&NudgeDefinition> {
        self.nudges.iter().find(|n| n.nudge_type == nudge_type)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub max_per_session: Option<u32>,
    #[serde(default)]
    pub cooldown_hours: Option<u32>,
    #[serde(default)]
    pub show_branding: bool,
    #[serde(default)]
    pub custom_css: Option<String>,
}

impl Policy {
    pub fn max_per_session(&self) -> usize {
        self.max_per_session
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_PER_SESSION) as usize
    }

    pub fn cooldown(&self) -> Duration {
        let hours = self
            .cooldown_hours
            .filter(|h| *h > 0)
            .unwrap_or(DEFAULT_COOLDOWN_HOURS);
        Duration::from_secs(u64::from(hours) * 3600)
    }

    pub fn custom_css(&self) -> Option<&str> {
        self.custom_css.as_deref().filter(|css| !css.trim().is_empty())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeType {
    ExitIntent,
    ShippingShock,
    HesitantBrowser,
}

impl NudgeType {
    pub const ALL: [NudgeType; 3] = [
        NudgeType::ExitIntent,
        NudgeType::HesitantBrowser,
        NudgeType::ShippingShock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExitIntent => "exit_intent",
            Self::ShippingShock => "shipping_shock",
            Self::HesitantBrowser => "hesitant_browser",
        }
    }
}

impl fmt::Display for NudgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponType {
    #[default]
    Percentage,
    Fixed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NudgeDefinition {
    pub id: NudgeId,
    #[serde(rename = "type")]
    pub nudge_type: NudgeType,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub body_text: Option<String>,
    #[serde(default)]
    pub cta_text: Option<String>,
    #[serde(default)]
    pub coupon_enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub coupon_type: CouponType,
    #[serde(default)]
    pub coupon_value: Option<f64>,
    #[serde(default)]
    pub delay_seconds: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub trigger_config: TriggerConfig,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_config: Map<String, Value>,
}

impl NudgeDefinition {
    /// Minimal definition with every optional field unset.
    pub fn new(id: impl Into<String>, nudge_type: NudgeType) -> Self {
        Self {
            id: NudgeId::from_raw(id),
            nudge_type,
            headline: None,
            body_text: None,
            cta_text: None,
            coupon_enabled: false,
            coupon_type: CouponType::default(),
            coupon_value: None,
            delay_seconds: None,
            trigger_config: TriggerConfig::default(),
            display_config: Map::new(),
        }
    }

    /// Configured pre-display delay; unset, zero and negative values fall back to `default`.
    pub fn delay_or(&self, default: Duration) -> Duration {
        match self.delay_seconds {
            Some(secs) if secs > 0 => Duration::from_secs(secs.unsigned_abs()),
            _ => default,
        }
    }
}

/// Type-specific trigger knobs (`time_seconds`, `fallback_seconds`, ...).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerConfig(Map<String, Value>);

impl TriggerConfig {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Reads `key` as a positive, finite number of seconds.
    /// Numeric strings are accepted since the admin UI stores form input verbatim.
    pub fn seconds(&self, key: &str) -> Option<Duration> {
        let secs = match self.0.get(key)? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        if secs <= 0.0 {
            return None;
        }
        // NaN, infinity and values past `Duration::MAX` all fail here.
        Duration::try_from_secs_f64(secs).ok()
    }

    /// The default is resolved before the value is used in any arithmetic.
    pub fn seconds_or(&self, key: &str, default: Duration) -> Duration {
        self.seconds(key).unwrap_or(default)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_nudges<'de, D>(deserializer: D) -> Result<Vec<NudgeDefinition>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect())
}
