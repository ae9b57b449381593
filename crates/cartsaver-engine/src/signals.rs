use tokio::sync::broadcast;
use tracing::trace;

use cartsaver_core::signals::PageSignal;

const HUB_CAPACITY: usize = 256;

/// Fan-out of host input to every armed detector and the open overlay.
///
/// Subscribers must subscribe before they start polling; anything dispatched
/// earlier is not replayed.
#[derive(Clone, Debug)]
pub struct SignalHub {
    tx: broadcast::Sender<PageSignal>,
}

impl SignalHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageSignal> {
        self.tx.subscribe()
    }

    /// Returns the number of subscribers that will see the signal.
    pub fn dispatch(&self, signal: PageSignal) -> usize {
        match self.tx.send(signal) {
            Ok(n) => n,
            Err(broadcast::error::SendError(signal)) => {
                trace!(?signal, "no subscribers for page signal");
                0
            }
        }
    }
}

impl Default for SignalHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Next signal, skipping over lag. `None` once the hub is gone.
pub(crate) async fn next_signal(rx: &mut broadcast::Receiver<PageSignal>) -> Option<PageSignal> {
    loop {
        match rx.recv().await {
            Ok(signal) => return Some(signal),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                trace!(skipped, "signal subscriber lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_reaches_every_subscriber() {
        let hub = SignalHub::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_eq!(hub.dispatch(PageSignal::CtaClick), 2);
        assert_eq!(next_signal(&mut a).await, Some(PageSignal::CtaClick));
        assert_eq!(next_signal(&mut b).await, Some(PageSignal::CtaClick));
    }

    #[test]
    fn dispatch_without_subscribers_is_harmless() {
        let hub = SignalHub::new();
        assert_eq!(hub.dispatch(PageSignal::PointerMove), 0);
    }

    #[tokio::test]
    async fn closed_hub_ends_the_stream() {
        let hub = SignalHub::new();
        let mut rx = hub.subscribe();
        drop(hub);
        assert_eq!(next_signal(&mut rx).await, None);
    }

    #[tokio::test]
    async fn lagging_subscriber_resumes_at_oldest_retained() {
        let hub = SignalHub::new();
        let mut rx = hub.subscribe();
        for i in 0..(HUB_CAPACITY + 10) {
            hub.dispatch(PageSignal::Scroll { scroll_y: i as f64 });
        }
        assert_eq!(
            next_signal(&mut rx).await,
            Some(PageSignal::Scroll { scroll_y: 10.0 })
        );
    }
}
