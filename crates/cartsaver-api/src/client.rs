use std::time::Duration;

use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared HTTP client bound to one base URL.
///
/// Cheap to clone; every collaborator holds its own copy.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base: &str) -> Result<Self, ApiError> {
        Self::with_timeouts(base, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeouts(
        base: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let base = Url::parse(base).map_err(|e| ApiError::InvalidUrl(format!("{base}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base.to_string()));
        }
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("build client: {e}")))?;
        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Base URL with `segments` appended, each percent-encoded as one path segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| ApiError::InvalidUrl(self.base.to_string()))?;
            let _ = path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }
}

/// Turn a non-2xx response into an [`ApiError`], otherwise decode JSON.
pub async fn decode_json<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::from_status(status.as_u16(), body));
    }
    resp.json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}
