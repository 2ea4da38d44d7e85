//! The concurrent last-value store.
//!
//! Writers fold put/delete events into a single table; readers take atomic
//! point-in-time snapshots of it. One lock guards the table and is held only
//! for the duration of a single operation: O(1) for put/delete, O(keys) for
//! the pointer copy a snapshot makes. No I/O happens inside the critical
//! section.

use crate::types::{ChannelKey, ChannelState, DecodedPayload, LogicalTime};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Table state. The watermark lives under the same lock as the entries so a
/// snapshot observes both at one serialization point.
#[derive(Default)]
struct TableInner {
    entries: HashMap<ChannelKey, Arc<ChannelState>>,
    last_event_at: Option<LogicalTime>,
}

impl TableInner {
    fn touch(&mut self, at: LogicalTime) {
        self.last_event_at = Some(match self.last_event_at {
            Some(watermark) => watermark.max(at),
            None => at,
        });
    }
}

/// Concurrent last-value-wins map over channel keys.
///
/// One instance is shared by every ingestor and reader in the process.
/// Created empty, discarded on drop; nothing persists.
pub struct SnapshotStore {
    inner: RwLock<TableInner>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(TableInner::default()),
        }
    }

    /// Fold a decoded put into the table.
    ///
    /// The write wins iff `(timestamp, authority)` is at least the stored
    /// entry's `(timestamp, authority)`, where authoritative stamps rank
    /// above fallback ones. True ties go to the incoming write. The rule is
    /// commutative for distinct timestamps and idempotent, so reordered or
    /// redelivered events converge to the same table.
    pub fn apply_put(
        &self,
        key: ChannelKey,
        value: DecodedPayload,
        timestamp: LogicalTime,
        fallback_timestamp: bool,
    ) {
        let now = LogicalTime::now();
        let mut inner = self.inner.write();
        inner.touch(now);
        if let Some(current) = inner.entries.get(&key) {
            if !wins_over(timestamp, fallback_timestamp, current) {
                trace!(%key, ?timestamp, "dropping superseded put");
                return;
            }
        }
        inner.entries.insert(
            key,
            Arc::new(ChannelState::new(value, timestamp, fallback_timestamp)),
        );
    }

    /// Remove `key`'s entry.
    ///
    /// Deletes are unconditional and carry no ordering token: the entry and
    /// its timestamp are forgotten outright, so a later put recreates the
    /// key whatever its timestamp. No-op when the key is absent.
    pub fn apply_delete(&self, key: &ChannelKey) {
        let now = LogicalTime::now();
        let mut inner = self.inner.write();
        inner.touch(now);
        inner.entries.remove(key);
    }

    /// Record that an event was received without changing the table (used
    /// for events dropped on decode failure, so staleness tracking still
    /// sees a live feed).
    pub fn note_event(&self, at: LogicalTime) {
        self.inner.write().touch(at);
    }

    /// Atomic point-in-time copy.
    ///
    /// Entries are shared pointers, so the copy is proportional to the key
    /// count rather than payload sizes, and writers wait only for the
    /// pointer copy.
    pub fn snapshot(&self) -> Snapshot {
        let taken_at = LogicalTime::now();
        let inner = self.inner.read();
        Snapshot {
            entries: inner.entries.clone(),
            last_event_at: inner.last_event_at,
            taken_at,
        }
    }

    /// Current state for one key.
    pub fn get(&self, key: &ChannelKey) -> Option<Arc<ChannelState>> {
        self.inner.read().entries.get(key).cloned()
    }

    /// Number of live channels.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// When the store last saw any event (including dropped ones).
    pub fn last_event_at(&self) -> Option<LogicalTime> {
        self.inner.read().last_event_at
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether an incoming put beats the stored entry. Authority ranks
/// authoritative stamps above ingestion-assigned fallbacks.
fn wins_over(timestamp: LogicalTime, fallback_timestamp: bool, current: &ChannelState) -> bool {
    (timestamp, !fallback_timestamp) >= (current.timestamp, !current.fallback_timestamp)
}

/// An immutable point-in-time copy of the mirror table.
#[derive(Clone, Debug)]
pub struct Snapshot {
    entries: HashMap<ChannelKey, Arc<ChannelState>>,
    last_event_at: Option<LogicalTime>,
    taken_at: LogicalTime,
}

impl Snapshot {
    pub fn get(&self, key: &ChannelKey) -> Option<&ChannelState> {
        self.entries.get(key).map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChannelKey, &Arc<ChannelState>)> {
        self.entries.iter()
    }

    /// When the store last saw any event, as of this copy.
    pub fn last_event_at(&self) -> Option<LogicalTime> {
        self.last_event_at
    }

    /// When this copy was taken.
    pub fn taken_at(&self) -> LogicalTime {
        self.taken_at
    }

    /// How long the feed had been silent when this copy was taken; `None`
    /// before the first event. The display layer uses this to tell a live
    /// feed from a stalled one.
    pub fn feed_idle(&self) -> Option<Duration> {
        self.last_event_at
            .map(|at| Duration::from_micros(self.taken_at.micros_since(at)))
    }
}
