use async_trait::async_trait;
use serde::Deserialize;

use crate::client::{decode_json, ApiClient};
use crate::error::ApiError;

/// Subset of the storefront's `/cart.js` payload the engine cares about.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct CartSnapshot {
    #[serde(default)]
    pub token: Option<String>,
    /// Minor currency units (cents).
    #[serde(default)]
    pub total_price: Option<f64>,
}

impl CartSnapshot {
    /// Cart total in major units.
    pub fn value(&self) -> Option<f64> {
        self.total_price
            .filter(|p| p.is_finite())
            .map(|cents| cents / 100.0)
    }
}

#[async_trait]
pub trait CartSource: Send + Sync {
    async fn snapshot(&self) -> Result<CartSnapshot, ApiError>;
}

/// `GET {storefront}/cart.js`.
pub struct HttpCartSource {
    storefront: ApiClient,
}

impl HttpCartSource {
    pub fn new(storefront: ApiClient) -> Self {
        Self { storefront }
    }
}

#[async_trait]
impl CartSource for HttpCartSource {
    async fn snapshot(&self) -> Result<CartSnapshot, ApiError> {
        let url = self.storefront.endpoint(&["cart.js"])?;
        let resp = self.storefront.http().get(url).send().await?;
        decode_json(resp).await
    }
}
