use serde::{Deserialize, Serialize};

/// Pointer-leave events at or above this line (viewport px from the top) count as exit intent.
pub const EXIT_INTENT_MAX_Y: f64 = 10.0;

/// Host input forwarded to the engine: page activity and overlay interactions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageSignal {
    PointerMove,
    /// The pointer left the document; `y` is the last client coordinate.
    PointerLeave { y: f64 },
    KeyDown { key: String },
    Scroll { scroll_y: f64 },
    BackdropClick,
    CloseClick,
    CtaClick,
    CopyCouponClick,
}

impl PageSignal {
    /// Activity that keeps a hesitant browser "not hesitant".
    pub fn is_activity(&self) -> bool {
        matches!(
            self,
            Self::PointerMove | Self::KeyDown { .. } | Self::Scroll { .. }
        )
    }

    pub fn is_exit_gesture(&self) -> bool {
        matches!(self, Self::PointerLeave { y } if *y <= EXIT_INTENT_MAX_Y)
    }

    /// Signals that close an open overlay without accepting it.
    pub fn is_dismissal(&self) -> bool {
        match self {
            Self::BackdropClick | Self::CloseClick => true,
            Self::KeyDown { key } => key == "Escape",
            _ => false,
        }
    }
}
