//! Observers of classified events.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

use crate::event::SyncEvent;

/// Receives every event the engine classifies, in engine order.
///
/// `process` runs while the engine holds its state lock, so it must return
/// quickly and must not call back into the engine. Listeners that need to do
/// real work should hand the event off, as [`ChannelListener`] does.
pub trait SyncListener: Send + Sync {
    fn process(&self, event: &SyncEvent);
}

impl<F> SyncListener for F
where
    F: Fn(&SyncEvent) + Send + Sync,
{
    fn process(&self, event: &SyncEvent) {
        self(event)
    }
}

/// Listener forwarding events into an unbounded channel.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<SyncEvent>,
}

impl ChannelListener {
    /// Create a listener and the receiver its events arrive on.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl SyncListener for ChannelListener {
    fn process(&self, event: &SyncEvent) {
        if self.tx.send(event.clone()).is_err() {
            trace!("Event receiver dropped, discarding {}", event);
        }
    }
}
