//! Scripted page visits for `cartsaver simulate`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use cartsaver_core::signals::PageSignal;
use cartsaver_engine::{ElementBox, Engine, PageLayout};

/// One page load: where the visitor is, what the page looks like, and what
/// they do on it.
#[derive(Clone, Debug, Deserialize)]
pub struct VisitScript {
    /// Overrides the configured shop domain.
    #[serde(default)]
    pub shop: Option<String>,
    pub path: String,
    #[serde(default)]
    pub cart_token: Option<String>,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: f64,
    #[serde(default)]
    pub elements: Vec<ElementBox>,
    #[serde(default)]
    pub steps: Vec<Step>,
    /// How long the page stays open after the last step.
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Step {
    /// Offset from page load.
    pub at_ms: u64,
    pub signal: PageSignal,
}

fn default_viewport_height() -> f64 {
    800.0
}

fn default_linger_ms() -> u64 {
    5_000
}

impl VisitScript {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read visit script: {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid visit script: {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let mut script: VisitScript = serde_json::from_str(raw)?;
        if !script.path.starts_with('/') {
            bail!("path must start with '/': {}", script.path);
        }
        if script.viewport_height <= 0.0 {
            bail!("viewport_height must be positive");
        }
        script.steps.sort_by_key(|s| s.at_ms);
        Ok(script)
    }

    pub fn layout(&self) -> PageLayout {
        PageLayout::new(self.viewport_height, self.elements.clone())
    }

    /// Page lifetime: last step plus the linger window.
    pub fn duration(&self) -> Duration {
        let last = self.steps.last().map_or(0, |s| s.at_ms);
        Duration::from_millis(last.saturating_add(self.linger_ms))
    }
}

/// Feed every step to the engine at its offset, keeping the layout's scroll
/// position in step with scroll signals, then hold the page open.
pub async fn replay(script: &VisitScript, engine: &Engine, layout: &Arc<PageLayout>) {
    let start = Instant::now();
    for step in &script.steps {
        sleep_until(start + Duration::from_millis(step.at_ms)).await;
        if let PageSignal::Scroll { scroll_y } = step.signal {
            layout.scroll_to(scroll_y);
        }
        debug!(at_ms = step.at_ms, signal = ?step.signal, "replaying step");
        engine.dispatch(step.signal.clone());
    }
    sleep_until(start + script.duration()).await;
    info!(
        shown = engine.session().nudges_shown.len(),
        overlay_open = engine.is_overlay_active(),
        "visit finished"
    );
}
