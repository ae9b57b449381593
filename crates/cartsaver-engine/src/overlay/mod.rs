//! The overlay: what gets drawn ([`view`]), where it gets drawn
//! ([`OverlaySurface`]), and the display lifecycle ([`controller`]).

pub mod controller;
pub mod view;

pub use controller::{OverlayController, OverlayTimings, PresentOutcome};
pub use view::{escape_html, OverlayView};

use crate::error::SurfaceError;

/// Host side of the overlay: the DOM in a browser, a log line in the simulator.
pub trait OverlaySurface: Send + Sync {
    /// Attach and show the overlay.
    fn render(&self, view: &OverlayView) -> Result<(), SurfaceError>;
    /// Start the exit animation. The overlay stays attached until [`remove`](Self::remove).
    fn begin_exit(&self);
    fn remove(&self);
    fn navigate(&self, path: &str);
    /// Returns false when the clipboard refused the write.
    fn copy_to_clipboard(&self, text: &str) -> bool;
    fn set_copy_label(&self, label: &str);
}
