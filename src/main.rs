//! # cartsaver
//!
//! Host binary for the CartSaver nudge engine. Replays scripted storefront
//! visits through a real engine wired to the CartSaver backend, and inspects
//! the configuration a shop would serve.

#![deny(unsafe_code)]

mod console;
mod script;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use cartsaver_api::{
    ApiClient, CartSource, ConfigSource, HttpCartSource, HttpConfigSource, HttpCouponSource,
    HttpEventSink,
};
use cartsaver_core::clock::SystemClock;
use cartsaver_engine::{Engine, EngineDeps, EngineError, PageContext};
use cartsaver_settings::CartsaverSettings;
use cartsaver_store::{Database, KeyValueStore, MemoryStore};
use cartsaver_telemetry::{init_telemetry, TelemetryConfig};

use crate::console::ConsoleSurface;
use crate::script::VisitScript;

/// Time given to in-flight event deliveries before the process exits.
const FLUSH_GRACE: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "cartsaver", about = "CartSaver storefront nudge engine")]
struct Cli {
    /// Settings file (defaults to `~/.cartsaver/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Backend base URL (overrides settings).
    #[arg(long, global = true)]
    host: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a scripted page visit.
    Simulate {
        /// Visit script (JSON).
        #[arg(long)]
        script: PathBuf,

        /// Tab identity. Runs sharing a tab share one visit session.
        #[arg(long, default_value = "main")]
        tab: String,

        /// Print overlay markup when it is shown.
        #[arg(long, default_value_t = false)]
        html: bool,
    },
    /// Fetch and print a shop's configuration snapshot.
    Config {
        /// `*.myshopify.com` domain (defaults to the configured shop).
        #[arg(long)]
        shop: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => cartsaver_settings::load_settings_from_path(path),
        None => cartsaver_settings::load_settings(),
    }
    .context("failed to load settings")?;
    if let Some(host) = cli.host {
        settings.api.host = host.trim_end_matches('/').to_string();
    }

    let _ = init_telemetry(&TelemetryConfig {
        log_level: settings.logging.level.clone(),
        module_levels: Vec::new(),
        json: settings.logging.json,
    });

    match cli.command {
        Command::Simulate { script, tab, html } => simulate(&settings, &script, &tab, html).await,
        Command::Config { shop } => print_config(&settings, shop).await,
    }
}

fn backend(settings: &CartsaverSettings) -> Result<ApiClient> {
    ApiClient::with_timeouts(
        &settings.api.host,
        settings.api.connect_timeout(),
        settings.api.request_timeout(),
    )
    .with_context(|| format!("invalid backend host: {}", settings.api.host))
}

fn shop_domain(settings: &CartsaverSettings, explicit: Option<String>) -> Result<String> {
    explicit
        .or_else(|| settings.shop.domain.clone())
        .context("no shop domain: pass --shop, set shop.domain, or CARTSAVER_SHOP")
}

/// SQLite-backed session and cooldown storage, or process memory when the
/// database cannot be opened.
fn open_storage(
    db_path: &Path,
    tab: &str,
) -> (Arc<dyn KeyValueStore>, Arc<dyn KeyValueStore>) {
    match Database::open(db_path) {
        Ok(db) => (Arc::new(db.session_scope(tab)), Arc::new(db.local())),
        Err(e) => {
            let err = EngineError::from(e);
            warn!(
                error = %err,
                error_kind = err.error_kind(),
                path = %db_path.display(),
                "falling back to in-memory storage"
            );
            (Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
        }
    }
}

async fn simulate(
    settings: &CartsaverSettings,
    script_path: &Path,
    tab: &str,
    print_html: bool,
) -> Result<()> {
    let script = VisitScript::load(script_path)?;
    let shop = shop_domain(settings, script.shop.clone())?;
    let api = backend(settings)?;

    let cart = match &settings.shop.storefront_url {
        Some(url) => {
            let storefront = ApiClient::with_timeouts(
                url,
                settings.api.connect_timeout(),
                settings.api.request_timeout(),
            )
            .with_context(|| format!("invalid storefront url: {url}"))?;
            Some(Arc::new(HttpCartSource::new(storefront)) as Arc<dyn CartSource>)
        }
        None => None,
    };

    let (session_storage, local_storage) =
        open_storage(Path::new(&settings.storage.db_path), tab);
    let layout = Arc::new(script.layout());

    let deps = EngineDeps {
        config: Arc::new(HttpConfigSource::new(api.clone())),
        coupons: Arc::new(HttpCouponSource::new(api.clone())),
        events: Arc::new(HttpEventSink::new(api)),
        cart,
        session_storage,
        local_storage,
        surface: Arc::new(ConsoleSurface::new(print_html)),
        viewport: layout.clone(),
        clock: Arc::new(SystemClock),
    };

    let mut page = PageContext::new(shop.as_str(), script.path.as_str());
    if let Some(token) = &script.cart_token {
        page = page.with_cart_token(token.as_str());
    }

    let Some(engine) = Engine::boot(page, settings, deps).await else {
        info!(shop = %shop, "no nudges for this visit");
        return Ok(());
    };

    script::replay(&script, &engine, &layout).await;
    engine.shutdown();
    tokio::time::sleep(FLUSH_GRACE).await;
    Ok(())
}

async fn print_config(settings: &CartsaverSettings, shop: Option<String>) -> Result<()> {
    let shop = shop_domain(settings, shop)?;
    let source = HttpConfigSource::new(backend(settings)?);
    let config = source
        .fetch(&shop)
        .await
        .with_context(|| format!("failed to fetch configuration for {shop}"))?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
