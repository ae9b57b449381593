use std::future::Future;
use std::pin::Pin;

use cartsaver_core::events::FunnelEvent;

use crate::client::ApiClient;
use crate::error::ApiError;

/// Outcome of one detached event delivery.
pub type Delivery = Pin<Box<dyn Future<Output = Result<(), ApiError>> + Send + 'static>>;

/// Fire-and-forget destination for funnel events.
///
/// `send` takes the event immediately and returns the delivery for the
/// caller to detach. Delivery is best-effort: no retries, no queueing, no
/// backpressure.
pub trait EventSink: Send + Sync {
    fn send(&self, event: FunnelEvent) -> Delivery;
}

/// `POST {host}/api/events`, one request per event.
pub struct HttpEventSink {
    api: ApiClient,
}

impl HttpEventSink {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn deliver(&self, event: &FunnelEvent) -> Result<(), ApiError> {
        let url = self.api.endpoint(&["api", "events"])?;
        let resp = self.api.http().post(url).json(event).send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(ApiError::from_status(status.as_u16(), body))
        }
    }
}

impl EventSink for HttpEventSink {
    fn send(&self, event: FunnelEvent) -> Delivery {
        let sink = HttpEventSink {
            api: self.api.clone(),
        };
        Box::pin(async move { sink.deliver(&event).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use cartsaver_core::events::EventType;
    use cartsaver_core::ids::{NudgeId, SessionId};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event(event_type: EventType) -> FunnelEvent {
        FunnelEvent {
            shop_domain: "demo.myshopify.com".into(),
            nudge_id: NudgeId::from_raw("n1"),
            event_type,
            session_id: SessionId::from_raw("cs_1"),
            cart_token: None,
            cart_value: Some(59.9),
            coupon_used: None,
            metadata: json!({"trigger": "exit_intent"}),
            timestamp: 1,
        }
    }

    #[tokio::test]
    async fn deliver_posts_event_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/events"))
            .and(body_partial_json(json!({
                "shop_domain": "demo.myshopify.com",
                "nudge_id": "n1",
                "event_type": "impression",
                "session_id": "cs_1",
                "cart_value": 59.9
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let sink = HttpEventSink::new(ApiClient::new(&server.uri()).unwrap());
        sink.deliver(&event(EventType::Impression)).await.unwrap();
    }

    #[tokio::test]
    async fn send_yields_the_classified_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/events"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let sink = HttpEventSink::new(ApiClient::new(&server.uri()).unwrap());
        let err = sink.send(event(EventType::Dismissed)).await.unwrap_err();
        assert_eq!(err.error_kind(), "server_error");
    }

    #[tokio::test]
    async fn send_is_lazy_until_polled() {
        let server = MockServer::start().await;
        let sink = HttpEventSink::new(ApiClient::new(&server.uri()).unwrap());
        drop(sink.send(event(EventType::Click)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
