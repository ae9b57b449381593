use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::SurfaceError;
use crate::overlay::{OverlaySurface, OverlayView};
use crate::page::Viewport;

#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceCall {
    Render(Box<OverlayView>),
    BeginExit,
    Remove,
    Navigate(String),
    Copy(String),
    CopyLabel(String),
}

/// Overlay surface that records every call and can be told to fail rendering.
#[derive(Debug)]
pub struct RecordingSurface {
    calls: Mutex<Vec<SurfaceCall>>,
    fail_render: AtomicBool,
    clipboard_ok: AtomicBool,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_render: AtomicBool::new(false),
            clipboard_ok: AtomicBool::new(true),
        }
    }

    pub fn failing() -> Self {
        let surface = Self::new();
        surface.set_fail_render(true);
        surface
    }

    pub fn set_fail_render(&self, fail: bool) {
        self.fail_render.store(fail, Ordering::SeqCst);
    }

    pub fn set_clipboard_ok(&self, ok: bool) {
        self.clipboard_ok.store(ok, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().clone()
    }

    pub fn rendered(&self) -> Vec<OverlayView> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Render(view) => Some((**view).clone()),
                _ => None,
            })
            .collect()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Navigate(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn copy_labels(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::CopyLabel(label) => Some(label.clone()),
                _ => None,
            })
            .collect()
    }

    /// Rendered and not yet removed.
    pub fn is_showing(&self) -> bool {
        let calls = self.calls.lock();
        let renders = calls
            .iter()
            .filter(|c| matches!(c, SurfaceCall::Render(_)))
            .count();
        let removes = calls.iter().filter(|c| **c == SurfaceCall::Remove).count();
        renders > removes
    }

    fn record(&self, call: SurfaceCall) {
        self.calls.lock().push(call);
    }
}

impl OverlaySurface for RecordingSurface {
    fn render(&self, view: &OverlayView) -> Result<(), SurfaceError> {
        if self.fail_render.load(Ordering::SeqCst) {
            return Err(SurfaceError::Detached);
        }
        self.record(SurfaceCall::Render(Box::new(view.clone())));
        Ok(())
    }

    fn begin_exit(&self) {
        self.record(SurfaceCall::BeginExit);
    }

    fn remove(&self) {
        self.record(SurfaceCall::Remove);
    }

    fn navigate(&self, path: &str) {
        self.record(SurfaceCall::Navigate(path.to_string()));
    }

    fn copy_to_clipboard(&self, text: &str) -> bool {
        self.record(SurfaceCall::Copy(text.to_string()));
        self.clipboard_ok.load(Ordering::SeqCst)
    }

    fn set_copy_label(&self, label: &str) {
        self.record(SurfaceCall::CopyLabel(label.to_string()));
    }
}

/// Viewport whose answer is set by the test.
#[derive(Debug, Default)]
pub struct StaticViewport {
    visible: AtomicBool,
}

impl StaticViewport {
    pub fn new(visible: bool) -> Self {
        Self {
            visible: AtomicBool::new(visible),
        }
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }
}

impl Viewport for StaticViewport {
    fn element_fully_visible(&self, _selectors: &[&str]) -> bool {
        self.visible.load(Ordering::SeqCst)
    }
}
