use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the logging subsystem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: String,
    /// Per-module level overrides (e.g. "cartsaver_engine" => "debug").
    pub module_levels: Vec<(String, String)>,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            module_levels: Vec::new(),
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Directive string handed to `EnvFilter` when RUST_LOG is unset.
    pub fn filter_directives(&self) -> String {
        let mut filter = normalize_level(&self.log_level).to_string();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, normalize_level(level)));
        }
        filter
    }
}

/// Unknown level names collapse to `info` rather than failing startup.
fn normalize_level(level: &str) -> &'static str {
    match level.trim().parse::<Level>() {
        Ok(Level::TRACE) => "trace",
        Ok(Level::DEBUG) => "debug",
        Ok(Level::INFO) => "info",
        Ok(Level::WARN) => "warn",
        Ok(Level::ERROR) => "error",
        Err(_) => "info",
    }
}

/// Initialize the tracing subscriber. Call once at startup.
///
/// Returns false when a global subscriber was already installed (tests, embedding hosts).
pub fn init_telemetry(config: &TelemetryConfig) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .with_filter(env_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(env_filter)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_is_info() {
        assert_eq!(TelemetryConfig::default().filter_directives(), "info");
    }

    #[test]
    fn module_overrides_are_appended() {
        let config = TelemetryConfig {
            log_level: "WARN".into(),
            module_levels: vec![
                ("cartsaver_engine".into(), "debug".into()),
                ("cartsaver_api".into(), "TRACE".into()),
            ],
            json: true,
        };
        assert_eq!(
            config.filter_directives(),
            "warn,cartsaver_engine=debug,cartsaver_api=trace"
        );
    }

    #[test]
    fn bogus_level_falls_back_to_info() {
        let config = TelemetryConfig {
            log_level: "loud".into(),
            ..Default::default()
        };
        assert_eq!(config.filter_directives(), "info");
    }

    #[test]
    fn second_init_reports_false() {
        let config = TelemetryConfig::default();
        let first = init_telemetry(&config);
        let second = init_telemetry(&config);
        // Another test binary may have installed one first; the second call never wins.
        let _ = first;
        assert!(!second);
    }
}
