use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use cartsaver_api::cart::CartSource;
use cartsaver_api::config::ConfigSource;
use cartsaver_api::coupons::CouponSource;
use cartsaver_api::events::EventSink;
use cartsaver_core::clock::Clock;
use cartsaver_core::config::{Configuration, NudgeDefinition, NudgeType};
use cartsaver_core::signals::PageSignal;
use cartsaver_settings::CartsaverSettings;
use cartsaver_store::{CooldownStore, KeyValueStore, SessionState, SessionStore};

use crate::coordinator::{Admission, TriggerCoordinator};
use crate::coupons::CouponProvisioner;
use crate::detectors::{detector_for, DetectorContext, DetectorHandle, TriggerSink};
use crate::error::EngineError;
use crate::overlay::{OverlayController, OverlaySurface, OverlayTimings, PresentOutcome};
use crate::page::{PageContext, Viewport};
use crate::reporter::EventReporter;
use crate::signals::SignalHub;

/// Host-provided collaborators.
pub struct EngineDeps {
    pub config: Arc<dyn ConfigSource>,
    pub coupons: Arc<dyn CouponSource>,
    pub events: Arc<dyn EventSink>,
    /// No cart probe when absent.
    pub cart: Option<Arc<dyn CartSource>>,
    /// Per-tab storage for the visit session.
    pub session_storage: Arc<dyn KeyValueStore>,
    /// Durable storage for cooldown markers.
    pub local_storage: Arc<dyn KeyValueStore>,
    pub surface: Arc<dyn OverlaySurface>,
    pub viewport: Arc<dyn Viewport>,
    pub clock: Arc<dyn Clock>,
}

/// One engine per page. Everything it touches hangs off this value, so any
/// number of isolated engines can run side by side.
pub struct Engine {
    config: Configuration,
    page: Arc<PageContext>,
    hub: SignalHub,
    coordinator: Arc<TriggerCoordinator>,
    sessions: Arc<SessionStore>,
    detectors: Mutex<Vec<DetectorHandle>>,
    teardown: CancellationToken,
}

impl Engine {
    /// Load the shop's configuration and arm one detector per configured
    /// trigger type. `None` when the configuration is unavailable or disabled;
    /// nothing is started in that case.
    #[instrument(skip_all, fields(shop = %page.shop_domain, path = %page.path))]
    pub async fn boot(
        page: PageContext,
        settings: &CartsaverSettings,
        deps: EngineDeps,
    ) -> Option<Engine> {
        let config = match deps.config.fetch(&page.shop_domain).await {
            Ok(config) => config,
            Err(e) => {
                let err = EngineError::config(&e);
                warn!(error = %err, error_kind = err.error_kind(), "nudges disabled for this page");
                return None;
            }
        };
        if !config.enabled {
            info!("shop has nudges turned off");
            return None;
        }

        let page = Arc::new(page);
        let hub = SignalHub::new();
        let teardown = CancellationToken::new();
        let sessions = Arc::new(SessionStore::new(deps.session_storage, deps.clock.clone()));
        let coordinator = Arc::new(TriggerCoordinator::new(
            config.policy.clone(),
            sessions.clone(),
            Arc::new(CooldownStore::new(deps.local_storage)),
            deps.clock.clone(),
        ));
        let reporter = Arc::new(EventReporter::new(deps.events, page.clone(), deps.clock));
        let controller = OverlayController::new(
            coordinator.clone(),
            reporter,
            deps.surface,
            page.clone(),
            OverlayTimings::from_settings(&settings.engine),
        )
        .with_stylesheet_host(settings.api.host.clone())
        .with_teardown(teardown.clone());

        let pipeline: Arc<dyn TriggerSink> = Arc::new(DisplayPipeline {
            coordinator: coordinator.clone(),
            provisioner: Arc::new(CouponProvisioner::new(
                deps.coupons,
                settings.engine.coupon_timeout(),
            )),
            controller: Arc::new(controller),
            hub: hub.clone(),
            teardown: teardown.clone(),
        });

        if let Some(cart) = deps.cart {
            spawn_cart_probe(cart, page.clone(), teardown.clone());
        }

        let detectors: Vec<DetectorHandle> = NudgeType::ALL
            .into_iter()
            .filter_map(|nudge_type| {
                let nudge = config.nudge_for(nudge_type)?.clone();
                detector_for(nudge_type).arm(
                    nudge,
                    DetectorContext {
                        signals: hub.subscribe(),
                        page: page.clone(),
                        viewport: deps.viewport.clone(),
                        sink: pipeline.clone(),
                    },
                )
            })
            .collect();

        info!(
            nudges = config.nudges.len(),
            armed = ?detectors.iter().map(DetectorHandle::nudge_type).collect::<Vec<_>>(),
            "cartsaver engine started"
        );

        Some(Engine {
            config,
            page,
            hub,
            coordinator,
            sessions,
            detectors: Mutex::new(detectors),
            teardown,
        })
    }

    /// Feed host input to the detectors and to an open overlay.
    pub fn dispatch(&self, signal: PageSignal) {
        let _ = self.hub.dispatch(signal);
    }

    /// Dismiss the open overlay, if any, as if the visitor closed it.
    pub fn dismiss(&self) -> bool {
        match self.coordinator.active() {
            Some(display) => {
                display.request_dismiss();
                true
            }
            None => false,
        }
    }

    /// Dispose of every detector and take down an open overlay without a
    /// terminal event.
    pub fn shutdown(&self) {
        let detectors: Vec<DetectorHandle> = self.detectors.lock().drain(..).collect();
        for detector in &detectors {
            detector.dispose();
        }
        self.teardown.cancel();
        debug!(disposed = detectors.len(), "cartsaver engine shut down");
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    pub fn session(&self) -> SessionState {
        self.sessions.get_session()
    }

    pub fn is_overlay_active(&self) -> bool {
        self.coordinator.is_active()
    }

    pub fn armed(&self) -> Vec<NudgeType> {
        self.detectors
            .lock()
            .iter()
            .filter(|d| !d.is_finished())
            .map(DetectorHandle::nudge_type)
            .collect()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.teardown.cancel();
    }
}

/// Admission followed by coupon, render and interaction.
struct DisplayPipeline {
    coordinator: Arc<TriggerCoordinator>,
    provisioner: Arc<CouponProvisioner>,
    controller: Arc<OverlayController>,
    hub: SignalHub,
    teardown: CancellationToken,
}

impl TriggerSink for DisplayPipeline {
    fn fire(&self, nudge: &NudgeDefinition) {
        let Admission::Admitted(display) = self.coordinator.request_display(nudge) else {
            return;
        };
        let coordinator = self.coordinator.clone();
        let provisioner = self.provisioner.clone();
        let controller = self.controller.clone();
        let hub = self.hub.clone();
        let teardown = self.teardown.clone();
        drop(tokio::spawn(async move {
            let coupon = tokio::select! {
                () = teardown.cancelled() => {
                    coordinator.release(display.display_id);
                    return PresentOutcome::Abandoned;
                }
                coupon = provisioner.provision(&display.nudge, &display.session_id) => coupon,
            };
            display.set_coupon(coupon);
            let signals = hub.subscribe();
            controller.present(display, signals).await
        }));
    }

    fn overlay_active(&self) -> bool {
        self.coordinator.is_active()
    }
}

fn spawn_cart_probe(cart: Arc<dyn CartSource>, page: Arc<PageContext>, teardown: CancellationToken) {
    drop(tokio::spawn(async move {
        let snapshot = tokio::select! {
            () = teardown.cancelled() => return,
            snapshot = cart.snapshot() => snapshot,
        };
        match snapshot {
            Ok(snapshot) => {
                page.apply_cart(&snapshot);
                debug!(cart_value = ?page.cart_value(), "cart probed");
            }
            Err(e) => debug!(error = %e, error_kind = e.error_kind(), "cart probe failed"),
        }
    }));
}
