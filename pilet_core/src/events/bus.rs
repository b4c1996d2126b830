use super::PiletEvent;
use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Publish/subscribe bus for pilet lifecycle events.
///
/// Publishing never waits on subscribers; an event published while nobody
/// listens is dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PiletEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: PiletEvent) {
        let name = event.name();
        match self.tx.send(event) {
            Ok(receivers) => debug!(event = name, receivers, "Published pilet event"),
            Err(_) => debug!(event = name, "Published pilet event without subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PiletEvent> {
        self.tx.subscribe()
    }

    /// Subscribe as a stream; lagged notifications are skipped.
    pub fn stream(&self) -> impl Stream<Item = PiletEvent> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|item| async move {
            match item {
                Ok(event) => Some(event),
                Err(err) => {
                    warn!("Pilet event stream lagged: {}", err);
                    None
                }
            }
        })
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
