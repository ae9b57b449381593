use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use cartsaver_core::ids::{NudgeId, SessionId};

use crate::client::{decode_json, ApiClient};
use crate::error::ApiError;

/// Discount code issued for one display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponGrant {
    pub code: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Serialize)]
struct CouponRequest<'a> {
    nudge_id: &'a NudgeId,
    session_id: &'a SessionId,
}

/// Issues single-use discount codes.
#[async_trait]
pub trait CouponSource: Send + Sync {
    async fn request(
        &self,
        nudge_id: &NudgeId,
        session_id: &SessionId,
    ) -> Result<CouponGrant, ApiError>;
}

/// `POST {host}/api/coupons/generate`.
pub struct HttpCouponSource {
    api: ApiClient,
}

impl HttpCouponSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CouponSource for HttpCouponSource {
    #[instrument(skip(self), fields(nudge_id = %nudge_id))]
    async fn request(
        &self,
        nudge_id: &NudgeId,
        session_id: &SessionId,
    ) -> Result<CouponGrant, ApiError> {
        let url = self.api.endpoint(&["api", "coupons", "generate"])?;
        let resp = self
            .api
            .http()
            .post(url)
            .json(&CouponRequest {
                nudge_id,
                session_id,
            })
            .send()
            .await?;
        decode_json(resp).await
    }
}
