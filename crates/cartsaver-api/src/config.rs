use async_trait::async_trait;
use tracing::{debug, instrument};

use cartsaver_core::config::Configuration;

use crate::client::{decode_json, ApiClient};
use crate::error::ApiError;

/// Source of the per-visit configuration snapshot.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch(&self, shop_domain: &str) -> Result<Configuration, ApiError>;
}

/// `GET {host}/api/config/{shop}`. Public, unauthenticated.
pub struct HttpConfigSource {
    api: ApiClient,
}

impl HttpConfigSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ConfigSource for HttpConfigSource {
    #[instrument(skip(self))]
    async fn fetch(&self, shop_domain: &str) -> Result<Configuration, ApiError> {
        let url = self.api.endpoint(&["api", "config", shop_domain])?;
        let resp = self.api.http().get(url).send().await?;
        let config: Configuration = decode_json(resp).await?;
        debug!(
            enabled = config.enabled,
            nudges = config.nudges.len(),
            "configuration snapshot received"
        );
        Ok(config)
    }
}
