use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use cartsaver_api::cart::CartSnapshot;

/// Elements that show the shipping cost on common cart templates.
pub const SHIPPING_SELECTORS: [&str; 4] = [
    ".cart__shipping",
    "[data-shipping]",
    ".shipping-calculator",
    ".cart-shipping",
];

/// The page the engine is running on.
#[derive(Debug)]
pub struct PageContext {
    pub shop_domain: String,
    pub path: String,
    cart: Mutex<CartState>,
}

#[derive(Debug, Default)]
struct CartState {
    token: Option<String>,
    value: Option<f64>,
}

impl PageContext {
    pub fn new(shop_domain: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            shop_domain: shop_domain.into(),
            path: path.into(),
            cart: Mutex::new(CartState::default()),
        }
    }

    pub fn with_cart_token(self, token: impl Into<String>) -> Self {
        self.cart.lock().token = Some(token.into());
        self
    }

    /// Shipping-shock only arms on cart pages.
    pub fn is_cart_page(&self) -> bool {
        self.path.contains("/cart")
    }

    pub fn is_at(&self, path: &str) -> bool {
        self.path == path
    }

    pub fn cart_token(&self) -> Option<String> {
        self.cart.lock().token.clone()
    }

    pub fn cart_value(&self) -> Option<f64> {
        self.cart.lock().value
    }

    /// Record what the cart probe saw. A token known up front is kept.
    pub fn apply_cart(&self, snapshot: &CartSnapshot) {
        let mut cart = self.cart.lock();
        cart.value = snapshot.value();
        if cart.token.is_none() {
            cart.token.clone_from(&snapshot.token);
        }
    }
}

/// Host answer to "is any of these elements fully on screen right now".
pub trait Viewport: Send + Sync {
    fn element_fully_visible(&self, selectors: &[&str]) -> bool;
}

/// Document-space box of one element.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementBox {
    pub selector: String,
    pub top: f64,
    pub height: f64,
}

/// Static document layout with a movable scroll offset.
#[derive(Debug)]
pub struct PageLayout {
    viewport_height: f64,
    elements: Vec<ElementBox>,
    scroll_y: Mutex<f64>,
}

impl PageLayout {
    pub fn new(viewport_height: f64, elements: Vec<ElementBox>) -> Self {
        Self {
            viewport_height,
            elements,
            scroll_y: Mutex::new(0.0),
        }
    }

    pub fn scroll_to(&self, y: f64) {
        *self.scroll_y.lock() = y.max(0.0);
    }
}

impl Viewport for PageLayout {
    fn element_fully_visible(&self, selectors: &[&str]) -> bool {
        let scroll_y = *self.scroll_y.lock();
        self.elements
            .iter()
            .filter(|el| selectors.contains(&el.selector.as_str()))
            .any(|el| {
                let top = el.top - scroll_y;
                top >= 0.0 && top + el.height <= self.viewport_height
            })
    }
}
