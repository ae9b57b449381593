use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cartsaver_core::events::EventType;
use cartsaver_core::signals::PageSignal;
use cartsaver_settings::EngineSettings;

use super::view::{OverlayView, COPIED_LABEL, COPY_LABEL};
use super::OverlaySurface;
use crate::coordinator::{ActiveNudge, TriggerCoordinator};
use crate::error::EngineError;
use crate::page::PageContext;
use crate::reporter::EventReporter;
use crate::signals::next_signal;
use crate::timer::TimerHandle;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlayTimings {
    pub exit_animation: Duration,
    pub copy_feedback: Duration,
    pub cart_path: String,
}

impl OverlayTimings {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            exit_animation: settings.exit_animation(),
            copy_feedback: settings.copy_feedback(),
            cart_path: settings.cart_path.clone(),
        }
    }
}

impl Default for OverlayTimings {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}

/// How a display ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Accepted,
    Dismissed,
    /// Never reached the screen. The session and cooldown marks stand.
    RenderFailed,
    /// The page was torn down first; no terminal event.
    Abandoned,
}

pub struct OverlayController {
    coordinator: Arc<TriggerCoordinator>,
    reporter: Arc<EventReporter>,
    surface: Arc<dyn OverlaySurface>,
    page: Arc<PageContext>,
    timings: OverlayTimings,
    stylesheet_host: Option<String>,
    teardown: CancellationToken,
}

impl OverlayController {
    pub fn new(
        coordinator: Arc<TriggerCoordinator>,
        reporter: Arc<EventReporter>,
        surface: Arc<dyn OverlaySurface>,
        page: Arc<PageContext>,
        timings: OverlayTimings,
    ) -> Self {
        Self {
            coordinator,
            reporter,
            surface,
            page,
            timings,
            stylesheet_host: None,
            teardown: CancellationToken::new(),
        }
    }

    pub fn with_stylesheet_host(mut self, host: impl Into<String>) -> Self {
        self.stylesheet_host = Some(host.into());
        self
    }

    /// Page teardown: an open overlay is removed without a terminal event.
    pub fn with_teardown(mut self, teardown: CancellationToken) -> Self {
        self.teardown = teardown;
        self
    }

    /// Show `display` and drive it to its terminal transition. Returns once
    /// the overlay is removed and the slot is free again.
    ///
    /// `signals` must be subscribed before this is called so that input
    /// arriving right after the render is seen.
    pub async fn present(
        &self,
        shown: Arc<ActiveNudge>,
        signals: broadcast::Receiver<PageSignal>,
    ) -> PresentOutcome {
        let mut view = OverlayView::from_nudge(
            &shown.nudge,
            shown.coupon().as_deref(),
            self.coordinator.policy(),
        );
        if let Some(host) = &self.stylesheet_host {
            view = view.with_stylesheet_from(host);
        }

        if let Err(e) = self.surface.render(&view) {
            let err = EngineError::from(e);
            warn!(
                nudge_id = %shown.nudge.id,
                display_id = shown.display_id,
                error = %err,
                error_kind = err.error_kind(),
                "overlay did not render, nudge stays counted as shown"
            );
            self.coordinator.release(shown.display_id);
            return PresentOutcome::RenderFailed;
        }

        self.reporter.report(&shown, EventType::Impression, None);
        info!(
            nudge_id = %shown.nudge.id,
            display_id = shown.display_id,
            coupon = view.coupon_code.is_some(),
            "overlay shown"
        );

        let outcome = self.interact(&shown, signals, view.coupon_code).await;
        self.close(&shown, outcome).await;
        outcome
    }

    async fn interact(
        &self,
        shown: &ActiveNudge,
        mut signals: broadcast::Receiver<PageSignal>,
        coupon: Option<String>,
    ) -> PresentOutcome {
        let mut copy_reset: Option<TimerHandle> = None;
        let outcome = loop {
            let signal = tokio::select! {
                biased;
                () = self.teardown.cancelled() => break PresentOutcome::Abandoned,
                () = shown.dismiss_requested() => PageSignal::CloseClick,
                signal = next_signal(&mut signals) => match signal {
                    Some(signal) => signal,
                    None => break PresentOutcome::Abandoned,
                },
            };

            if signal.is_dismissal() {
                if shown.begin_termination() {
                    self.reporter.report(shown, EventType::Dismissed, None);
                    break PresentOutcome::Dismissed;
                }
                continue;
            }

            match signal {
                PageSignal::CtaClick => {
                    if shown.begin_termination() {
                        self.reporter.report(shown, EventType::Click, coupon.clone());
                        break PresentOutcome::Accepted;
                    }
                }
                PageSignal::CopyCouponClick => {
                    let Some(code) = coupon.as_deref() else {
                        continue;
                    };
                    if !self.surface.copy_to_clipboard(code) {
                        debug!(display_id = shown.display_id, "clipboard write refused");
                        continue;
                    }
                    self.surface.set_copy_label(COPIED_LABEL);
                    if let Some(previous) = copy_reset.take() {
                        previous.cancel();
                    }
                    let surface = self.surface.clone();
                    copy_reset = Some(TimerHandle::schedule(self.timings.copy_feedback, move || {
                        surface.set_copy_label(COPY_LABEL);
                    }));
                }
                _ => {}
            }
        };
        if let Some(timer) = copy_reset {
            timer.cancel();
        }
        outcome
    }

    async fn close(&self, shown: &ActiveNudge, outcome: PresentOutcome) {
        if outcome == PresentOutcome::Abandoned {
            self.surface.remove();
            self.coordinator.release(shown.display_id);
            return;
        }
        self.surface.begin_exit();
        if outcome == PresentOutcome::Accepted && !self.page.is_at(&self.timings.cart_path) {
            self.surface.navigate(&self.timings.cart_path);
        }
        // The slot stays taken while the exit animation plays.
        tokio::time::sleep(self.timings.exit_animation).await;
        self.surface.remove();
        self.coordinator.release(shown.display_id);
        debug!(
            nudge_id = %shown.nudge.id,
            display_id = shown.display_id,
            ?outcome,
            "overlay removed"
        );
    }
}
