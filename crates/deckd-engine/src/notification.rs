//! Engine events published to outside observers.

use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

/// Events published to observers outside the engine (UIs, tools).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// The visible page changed.
    PageChanged {
        /// New 0-based page index.
        page: usize,
    },
    /// The device link was lost.
    Disconnected,
}

/// Fire-and-forget publisher of [`EngineEvent`]s.
#[derive(Debug, Clone)]
pub struct Notifier {
    /// Observer channel.
    tx: UnboundedSender<EngineEvent>,
}

impl Notifier {
    /// Create a notifier over an event channel.
    pub fn new(tx: UnboundedSender<EngineEvent>) -> Self {
        Self { tx }
    }

    /// Announce that `page` is now visible.
    pub fn page_changed(&self, page: usize) {
        self.send(EngineEvent::PageChanged { page });
    }

    /// Announce that the device went away.
    pub fn disconnected(&self) {
        self.send(EngineEvent::Disconnected);
    }

    /// Publish `event`; a closed channel is not an error.
    fn send(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            trace!(?event, "no event observers");
        }
    }
}
