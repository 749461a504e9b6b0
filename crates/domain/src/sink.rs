use crate::ScrumTeamEvent;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Hands team events to every subscriber.
///
/// Each subscriber gets its own unbounded queue, so a slow reader never makes
/// the team block or lose events. Clones share the subscribers.
#[derive(Clone, Debug, Default)]
pub struct EventSink {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<ScrumTeamEvent>>>>,
}

impl EventSink {
    /// Creates a sink without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Receives every event sent from now on.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ScrumTeamEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.lock().push(sender);
        receiver
    }

    /// Number of subscribers still listening.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|subscriber| !subscriber.is_closed());
        subscribers.len()
    }

    pub(crate) fn send(&self, event: &ScrumTeamEvent) {
        // dropped receivers are forgotten
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}
