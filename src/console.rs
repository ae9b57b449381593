use parking_lot::Mutex;
use tracing::info;

use cartsaver_engine::{OverlaySurface, OverlayView, SurfaceError};

/// Overlay surface for the simulator: logs what a browser would draw.
#[derive(Debug, Default)]
pub struct ConsoleSurface {
    /// Echo the full overlay markup on render.
    print_html: bool,
    showing: Mutex<bool>,
}

impl ConsoleSurface {
    pub fn new(print_html: bool) -> Self {
        Self {
            print_html,
            showing: Mutex::new(false),
        }
    }
}

impl OverlaySurface for ConsoleSurface {
    fn render(&self, view: &OverlayView) -> Result<(), SurfaceError> {
        let mut showing = self.showing.lock();
        if *showing {
            return Err(SurfaceError::Other("an overlay is already attached".into()));
        }
        *showing = true;
        info!(
            headline = %view.headline,
            cta = %view.cta,
            coupon = ?view.coupon_code,
            "overlay shown"
        );
        if self.print_html {
            println!("{}", view.to_html());
        }
        Ok(())
    }

    fn begin_exit(&self) {
        info!("overlay closing");
    }

    fn remove(&self) {
        *self.showing.lock() = false;
        info!("overlay removed");
    }

    fn navigate(&self, path: &str) {
        info!(path, "navigate");
    }

    fn copy_to_clipboard(&self, text: &str) -> bool {
        info!(code = text, "copied to clipboard");
        true
    }

    fn set_copy_label(&self, label: &str) {
        info!(label, "copy button label");
    }
}
