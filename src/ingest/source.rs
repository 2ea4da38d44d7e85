//! The transport seam: where channel events enter the mirror.

use crate::types::ChannelEvent;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Outcome of one source poll.
#[derive(Debug)]
pub enum SourcePoll {
    /// A sample arrived.
    Sample(ChannelEvent),

    /// Nothing arrived within the wait window.
    Idle,

    /// The feed is gone and will produce nothing further.
    Closed,
}

/// A live feed of channel events.
///
/// The wire protocol behind a source is not the mirror's concern; a
/// transport binding delivers pre-filtered samples through this trait.
/// Implementations must return within roughly `wait` so the ingestor can
/// keep checking its stop flag between events.
pub trait EventSource: Send {
    fn poll(&mut self, wait: Duration) -> SourcePoll;
}

/// In-process source backed by a bounded channel.
///
/// The sender half goes to whatever produces events (a subscriber callback,
/// a test thread); dropping every sender closes the feed.
pub struct QueueSource {
    receiver: Receiver<ChannelEvent>,
}

impl QueueSource {
    /// Create a source along with the paired sender for producers.
    pub fn bounded(capacity: usize) -> (Sender<ChannelEvent>, QueueSource) {
        let (sender, receiver) = bounded(capacity);
        (sender, QueueSource { receiver })
    }
}

impl EventSource for QueueSource {
    fn poll(&mut self, wait: Duration) -> SourcePoll {
        match self.receiver.recv_timeout(wait) {
            Ok(event) => SourcePoll::Sample(event),
            Err(RecvTimeoutError::Timeout) => SourcePoll::Idle,
            Err(RecvTimeoutError::Disconnected) => SourcePoll::Closed,
        }
    }
}
