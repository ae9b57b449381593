//! End-to-end visits through `Engine` with in-process collaborators and
//! paused tokio time.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::sleep;

use cartsaver_api::mock::{
    MockCartSource, MockConfigSource, MockCoupon, MockCouponSource, RecordingEventSink,
};
use cartsaver_api::cart::CartSource;
use cartsaver_api::ApiError;
use cartsaver_core::clock::{Clock, ManualClock};
use cartsaver_core::config::Configuration;
use cartsaver_core::events::EventType;
use cartsaver_core::signals::PageSignal;
use cartsaver_core::NudgeType;
use cartsaver_engine::mock::{RecordingSurface, StaticViewport};
use cartsaver_engine::{Engine, EngineDeps, PageContext};
use cartsaver_settings::CartsaverSettings;
use cartsaver_store::{KeyValueStore, MemoryStore, UnavailableStore};

const HOUR_MS: i64 = 3_600_000;

fn config(policy: serde_json::Value, nudges: serde_json::Value) -> Configuration {
    let mut raw = json!({"enabled": true, "show_branding": true, "nudges": nudges});
    if let (Some(raw), Some(policy)) = (raw.as_object_mut(), policy.as_object()) {
        raw.extend(policy.clone());
    }
    serde_json::from_value(raw).unwrap()
}

/// Browser-side state that outlives a single page: the tab's session storage
/// and the origin's durable storage.
struct Browser {
    clock: Arc<ManualClock>,
    session: Arc<MemoryStore>,
    local: Arc<MemoryStore>,
}

impl Browser {
    fn new() -> Self {
        Self {
            clock: Arc::new(ManualClock::new(1_700_000_000_000)),
            session: Arc::new(MemoryStore::new()),
            local: Arc::new(MemoryStore::new()),
        }
    }

    /// Same origin, new tab.
    fn new_tab(&self) -> Self {
        Self {
            clock: self.clock.clone(),
            session: Arc::new(MemoryStore::new()),
            local: self.local.clone(),
        }
    }
}

struct Visit {
    engine: Engine,
    surface: Arc<RecordingSurface>,
    events: Arc<RecordingEventSink>,
    viewport: Arc<StaticViewport>,
}

struct VisitBuilder<'a> {
    browser: &'a Browser,
    config: Result<Configuration, ApiError>,
    path: &'static str,
    coupons: Vec<MockCoupon>,
    surface: RecordingSurface,
    cart: Option<MockCartSource>,
    session_storage: Option<Arc<dyn KeyValueStore>>,
}

impl<'a> VisitBuilder<'a> {
    fn new(browser: &'a Browser, config: Configuration) -> Self {
        Self {
            browser,
            config: Ok(config),
            path: "/products/mug",
            coupons: Vec::new(),
            surface: RecordingSurface::new(),
            cart: None,
            session_storage: None,
        }
    }

    fn path(mut self, path: &'static str) -> Self {
        self.path = path;
        self
    }

    fn coupons(mut self, coupons: Vec<MockCoupon>) -> Self {
        self.coupons = coupons;
        self
    }

    fn surface(mut self, surface: RecordingSurface) -> Self {
        self.surface = surface;
        self
    }

    fn cart(mut self, cart: MockCartSource) -> Self {
        self.cart = Some(cart);
        self
    }

    fn session_storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.session_storage = Some(storage);
        self
    }

    async fn boot(self) -> Option<Visit> {
        let surface = Arc::new(self.surface);
        let events = Arc::new(RecordingEventSink::new());
        let viewport = Arc::new(StaticViewport::new(false));
        let config = match self.config {
            Ok(config) => MockConfigSource::new(config),
            Err(e) => MockConfigSource::failing(e),
        };
        let clock: Arc<dyn Clock> = self.browser.clock.clone();
        let deps = EngineDeps {
            config: Arc::new(config),
            coupons: Arc::new(MockCouponSource::new(self.coupons)),
            events: events.clone(),
            cart: self.cart.map(|c| -> Arc<dyn CartSource> { Arc::new(c) }),
            session_storage: self
                .session_storage
                .unwrap_or_else(|| self.browser.session.clone()),
            local_storage: self.browser.local.clone(),
            surface: surface.clone(),
            viewport: viewport.clone(),
            clock,
        };
        let page = PageContext::new("demo.myshopify.com", self.path);
        let engine = Engine::boot(page, &CartsaverSettings::default(), deps).await?;
        Some(Visit {
            engine,
            surface,
            events,
            viewport,
        })
    }
}

impl Visit {
    fn impressions(&self) -> usize {
        self.events
            .types()
            .iter()
            .filter(|t| **t == EventType::Impression)
            .count()
    }

    fn shown(&self) -> Vec<String> {
        self.engine
            .session()
            .nudges_shown
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

async fn tick() {
    sleep(Duration::from_millis(10)).await;
}

fn exit_intent() -> serde_json::Value {
    json!({"id": "n-exit", "type": "exit_intent", "headline": "Wait!"})
}

fn hesitant(seconds: u64) -> serde_json::Value {
    json!({"id": "n-dwell", "type": "hesitant_browser", "trigger_config": {"time_seconds": seconds}})
}

fn shipping() -> serde_json::Value {
    json!({"id": "n-ship", "type": "shipping_shock", "trigger_config": {"fallback_seconds": 60}})
}

#[tokio::test(start_paused = true)]
async fn serialized_displays_and_session_cap() {
    let browser = Browser::new();
    let cfg = config(
        json!({"max_per_session": 2, "cooldown_hours": 24}),
        json!([exit_intent(), hesitant(5), shipping()]),
    );

    // Page 1: exit intent wins, hesitant browsing fires 5s later into an open overlay.
    let visit = VisitBuilder::new(&browser, cfg.clone()).boot().await.unwrap();
    visit.engine.dispatch(PageSignal::PointerLeave { y: 2.0 });
    tick().await;
    assert_eq!(visit.impressions(), 1);
    assert!(visit.engine.is_overlay_active());

    sleep(Duration::from_secs(6)).await;
    assert_eq!(visit.impressions(), 1, "second nudge must wait for the first");
    assert_eq!(visit.shown(), vec!["n-exit"]);
    assert!(browser.local.get("cartsaver_last_n-dwell").unwrap().is_none());

    visit.engine.dispatch(PageSignal::CloseClick);
    sleep(Duration::from_secs(1)).await;
    assert!(!visit.engine.is_overlay_active());
    assert_eq!(
        visit.events.types(),
        vec![EventType::Impression, EventType::Dismissed]
    );
    drop(visit);

    // Page 2, same tab: hesitant browsing is admitted and fills the cap.
    let visit = VisitBuilder::new(&browser, cfg).path("/cart").boot().await.unwrap();
    sleep(Duration::from_secs(6)).await;
    assert_eq!(visit.impressions(), 1);
    assert_eq!(visit.shown(), vec!["n-exit", "n-dwell"]);
    visit.engine.dispatch(PageSignal::KeyDown { key: "Escape".into() });
    sleep(Duration::from_secs(1)).await;

    // Shipping shock detects and fires, but the session is full.
    visit.viewport.set_visible(true);
    visit.engine.dispatch(PageSignal::Scroll { scroll_y: 600.0 });
    sleep(Duration::from_secs(6)).await;
    assert_eq!(visit.impressions(), 1);
    assert_eq!(visit.surface.rendered().len(), 1);
    assert_eq!(visit.shown().len(), 2);
    assert!(browser.local.get("cartsaver_last_n-ship").unwrap().is_none());
    assert_eq!(visit.engine.armed(), vec![NudgeType::ExitIntent]);
}

#[tokio::test(start_paused = true)]
async fn slow_coupon_renders_once_without_discount_block() {
    let browser = Browser::new();
    let cfg = config(
        json!({}),
        json!([{"id": "n-exit", "type": "exit_intent", "coupon_enabled": true, "coupon_value": 10}]),
    );
    let visit = VisitBuilder::new(&browser, cfg)
        .coupons(vec![MockCoupon::Hang])
        .boot()
        .await
        .unwrap();

    visit.engine.dispatch(PageSignal::PointerLeave { y: 0.0 });
    sleep(Duration::from_secs(3)).await;
    assert!(visit.surface.rendered().is_empty());
    assert_eq!(visit.impressions(), 0);
    // The slot is already held while the coupon is pending.
    assert!(visit.engine.is_overlay_active());

    sleep(Duration::from_secs(2)).await;
    let rendered = visit.surface.rendered();
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].coupon_code, None);
    assert!(!rendered[0].to_html().contains("cartsaver-coupon"));
    assert_eq!(visit.impressions(), 1);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(visit.impressions(), 1);
}

#[tokio::test(start_paused = true)]
async fn coupon_inside_the_window_is_shown_and_reported_on_click() {
    let browser = Browser::new();
    let cfg = config(
        json!({}),
        json!([{"id": "n-exit", "type": "exit_intent", "coupon_enabled": true}]),
    );
    let visit = VisitBuilder::new(&browser, cfg)
        .coupons(vec![MockCoupon::delayed(
            Duration::from_secs(1),
            MockCoupon::grant("CARTQ1"),
        )])
        .boot()
        .await
        .unwrap();

    visit.engine.dispatch(PageSignal::PointerLeave { y: 0.0 });
    sleep(Duration::from_secs(2)).await;
    assert_eq!(
        visit.surface.rendered()[0].coupon_code.as_deref(),
        Some("CARTQ1")
    );

    visit.engine.dispatch(PageSignal::CtaClick);
    visit.engine.dispatch(PageSignal::KeyDown { key: "Escape".into() });
    sleep(Duration::from_secs(1)).await;
    let events = visit.events.events();
    assert_eq!(
        visit.events.types(),
        vec![EventType::Impression, EventType::Click]
    );
    assert_eq!(events[1].coupon_used.as_deref(), Some("CARTQ1"));
    assert_eq!(visit.surface.navigations(), vec!["/cart".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn missing_configuration_arms_nothing() {
    let browser = Browser::new();
    let builder = VisitBuilder {
        config: Err(ApiError::NotFound("Shop not found".into())),
        ..VisitBuilder::new(&browser, config(json!({}), json!([exit_intent()])))
    };
    assert!(builder.boot().await.is_none());
    assert!(browser.session.is_empty());
    assert!(browser.local.is_empty());
}

#[tokio::test(start_paused = true)]
async fn disabled_shop_arms_nothing() {
    let browser = Browser::new();
    let mut cfg = config(json!({}), json!([exit_intent()]));
    cfg.enabled = false;
    assert!(VisitBuilder::new(&browser, cfg).boot().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn cooldown_blocks_redisplay_across_reload() {
    let browser = Browser::new();
    let cfg = config(json!({"cooldown_hours": 24}), json!([exit_intent()]));

    let visit = VisitBuilder::new(&browser, cfg.clone()).boot().await.unwrap();
    visit.engine.dispatch(PageSignal::PointerLeave { y: 0.0 });
    tick().await;
    visit.engine.dispatch(PageSignal::BackdropClick);
    sleep(Duration::from_secs(1)).await;
    assert_eq!(visit.impressions(), 1);
    drop(visit);

    // New tab an hour later: fresh session, cooldown still applies.
    browser.clock.advance_ms(HOUR_MS);
    let tab = browser.new_tab();
    let visit = VisitBuilder::new(&tab, cfg.clone()).boot().await.unwrap();
    visit.engine.dispatch(PageSignal::PointerLeave { y: 0.0 });
    sleep(Duration::from_secs(1)).await;
    assert_eq!(visit.impressions(), 0);
    assert!(visit.shown().is_empty());
    drop(visit);

    browser.clock.advance_ms(23 * HOUR_MS);
    let tab = browser.new_tab();
    let visit = VisitBuilder::new(&tab, cfg).boot().await.unwrap();
    visit.engine.dispatch(PageSignal::PointerLeave { y: 0.0 });
    tick().await;
    assert_eq!(visit.impressions(), 1);
}

#[tokio::test(start_paused = true)]
async fn simultaneous_firings_show_one_overlay() {
    let browser = Browser::new();
    let cfg = config(
        json!({"max_per_session": 3}),
        json!([
            exit_intent(),
            hesitant(2),
            {"id": "n-ship", "type": "shipping_shock", "trigger_config": {"fallback_seconds": 2}}
        ]),
    );
    let visit = VisitBuilder::new(&browser, cfg).path("/cart").boot().await.unwrap();
    sleep(Duration::from_millis(1990)).await;
    visit.engine.dispatch(PageSignal::PointerLeave { y: 0.0 });
    sleep(Duration::from_secs(5)).await;

    assert_eq!(visit.surface.rendered().len(), 1);
    assert_eq!(visit.impressions(), 1);
    assert_eq!(visit.shown().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn render_failure_counts_as_shown_without_impression() {
    let browser = Browser::new();
    let cfg = config(json!({}), json!([exit_intent(), hesitant(3)]));
    let visit = VisitBuilder::new(&browser, cfg)
        .surface(RecordingSurface::failing())
        .boot()
        .await
        .unwrap();
    visit.engine.dispatch(PageSignal::PointerLeave { y: 0.0 });
    tick().await;
    assert_eq!(visit.impressions(), 0);
    assert!(!visit.engine.is_overlay_active());
    assert_eq!(visit.shown(), vec!["n-exit"]);

    // The slot is free for the next trigger.
    sleep(Duration::from_secs(4)).await;
    assert_eq!(visit.shown(), vec!["n-exit", "n-dwell"]);
}

#[tokio::test(start_paused = true)]
async fn events_carry_probed_cart_value() {
    let browser = Browser::new();
    let cfg = config(json!({}), json!([exit_intent()]));
    let visit = VisitBuilder::new(&browser, cfg)
        .cart(MockCartSource::new(12_999.0, Some("cart-tok")))
        .boot()
        .await
        .unwrap();
    tick().await;
    visit.engine.dispatch(PageSignal::PointerLeave { y: 0.0 });
    tick().await;
    let events = visit.events.events();
    assert_eq!(events[0].cart_value, Some(129.99));
    assert_eq!(events[0].cart_token.as_deref(), Some("cart-tok"));
    assert_eq!(events[0].metadata, json!({"trigger": "exit_intent"}));
}

#[tokio::test(start_paused = true)]
async fn failed_cart_probe_leaves_value_unset() {
    let browser = Browser::new();
    let cfg = config(json!({}), json!([exit_intent()]));
    let visit = VisitBuilder::new(&browser, cfg)
        .cart(MockCartSource::failing(ApiError::Network("offline".into())))
        .boot()
        .await
        .unwrap();
    tick().await;
    visit.engine.dispatch(PageSignal::PointerLeave { y: 0.0 });
    tick().await;
    assert_eq!(visit.events.events()[0].cart_value, None);
}

#[tokio::test(start_paused = true)]
async fn host_dismiss_goes_through_the_single_shot() {
    let browser = Browser::new();
    let cfg = config(json!({}), json!([exit_intent()]));
    let visit = VisitBuilder::new(&browser, cfg).boot().await.unwrap();
    assert!(!visit.engine.dismiss());

    visit.engine.dispatch(PageSignal::PointerLeave { y: 0.0 });
    tick().await;
    assert!(visit.engine.dismiss());
    visit.engine.dispatch(PageSignal::CtaClick);
    sleep(Duration::from_secs(1)).await;
    assert_eq!(
        visit.events.types(),
        vec![EventType::Impression, EventType::Dismissed]
    );
    assert!(visit.surface.navigations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_disposes_every_detector() {
    let browser = Browser::new();
    let cfg = config(json!({}), json!([exit_intent(), hesitant(5), shipping()]));
    let visit = VisitBuilder::new(&browser, cfg).path("/cart").boot().await.unwrap();
    let mut armed = visit.engine.armed();
    armed.sort_by_key(|t| t.as_str());
    assert_eq!(
        armed,
        vec![NudgeType::ExitIntent, NudgeType::HesitantBrowser, NudgeType::ShippingShock]
    );

    visit.engine.shutdown();
    visit.engine.dispatch(PageSignal::PointerLeave { y: 0.0 });
    sleep(Duration::from_secs(120)).await;
    assert!(visit.events.events().is_empty());
    assert!(visit.engine.armed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shipping_shock_stays_idle_off_cart() {
    let browser = Browser::new();
    let cfg = config(json!({}), json!([shipping()]));
    let visit = VisitBuilder::new(&browser, cfg).boot().await.unwrap();
    assert!(visit.engine.armed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unavailable_session_storage_still_enforces_once_per_page() {
    let browser = Browser::new();
    let cfg = config(json!({}), json!([exit_intent()]));
    let visit = VisitBuilder::new(&browser, cfg)
        .session_storage(Arc::new(UnavailableStore))
        .boot()
        .await
        .unwrap();
    visit.engine.dispatch(PageSignal::PointerLeave { y: 0.0 });
    tick().await;
    assert_eq!(visit.impressions(), 1);
    assert_eq!(visit.shown(), vec!["n-exit"]);
}
