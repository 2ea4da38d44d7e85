//! The read side: periodic, filtered point-in-time views for a display.

use crate::error::{MirrorError, Result};
use crate::store::{Snapshot, SnapshotStore};
use crate::types::{ChannelKey, ChannelState, LogicalTime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::info;

/// Display-side predicate over channel keys.
///
/// Case-insensitive substring match, the viewer's filter box. Filtering
/// happens on the snapshot copy; the store is never touched.
#[derive(Clone, Debug, Default)]
pub struct KeyFilter {
    needle: Option<String>,
}

impl KeyFilter {
    /// Match everything.
    pub fn all() -> Self {
        Self { needle: None }
    }

    /// Match keys containing `pattern`, ignoring ASCII case. Blank patterns
    /// match everything.
    pub fn contains(pattern: impl AsRef<str>) -> Self {
        let trimmed = pattern.as_ref().trim();
        if trimmed.is_empty() {
            Self::all()
        } else {
            Self {
                needle: Some(trimmed.to_ascii_lowercase()),
            }
        }
    }

    pub fn matches(&self, key: &ChannelKey) -> bool {
        match &self.needle {
            None => true,
            Some(needle) => key.as_str().to_ascii_lowercase().contains(needle.as_str()),
        }
    }
}

/// One table row in a view.
#[derive(Clone, Debug)]
pub struct ChannelRow {
    pub key: ChannelKey,
    pub state: Arc<ChannelState>,
}

/// A filtered, key-ordered rendering of one snapshot.
#[derive(Clone, Debug)]
pub struct SnapshotView {
    /// Rows passing the filter, ordered by key.
    pub rows: Vec<ChannelRow>,

    /// Channels in the store before filtering.
    pub total_channels: usize,

    /// When the store last saw any event.
    pub last_event_at: Option<LogicalTime>,

    /// When the underlying snapshot was taken.
    pub taken_at: LogicalTime,
}

impl SnapshotView {
    /// How long the feed had been silent when this view was taken; `None`
    /// before the first event.
    pub fn feed_idle(&self) -> Option<Duration> {
        self.last_event_at
            .map(|at| Duration::from_micros(self.taken_at.micros_since(at)))
    }
}

/// Consumes periodic views; the display layer implements this.
pub trait DisplaySink: Send {
    fn render(&mut self, view: SnapshotView);
}

impl<F: FnMut(SnapshotView) + Send> DisplaySink for F {
    fn render(&mut self, view: SnapshotView) {
        self(view)
    }
}

/// Polls the store at a fixed cadence and shapes snapshots for display.
///
/// Reading is fully decoupled from ingestion: a view costs one snapshot
/// plus a sort of the surviving rows, bounded by the table size and never
/// by the event rate.
pub struct SnapshotReader {
    store: Arc<SnapshotStore>,
    filter: KeyFilter,
    interval: Duration,
}

impl SnapshotReader {
    pub fn new(store: Arc<SnapshotStore>, filter: KeyFilter, interval: Duration) -> Self {
        Self {
            store,
            filter,
            interval,
        }
    }

    /// Take one filtered view right now.
    pub fn read_now(&self) -> SnapshotView {
        shape(&self.filter, self.store.snapshot())
    }

    /// Spawn the periodic poll loop, rendering into `sink` every interval.
    pub fn spawn(self, mut sink: impl DisplaySink + 'static) -> Result<ReaderHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("mirror-reader".to_string())
            .spawn(move || {
                info!(interval = ?self.interval, "reader started");
                while !thread_stop.load(Ordering::Relaxed) {
                    sink.render(self.read_now());
                    thread::sleep(self.interval);
                }
                info!("reader stopped");
            })
            .map_err(|e| MirrorError::Task(format!("failed to spawn reader: {}", e)))?;

        Ok(ReaderHandle { stop, thread })
    }
}

fn shape(filter: &KeyFilter, snapshot: Snapshot) -> SnapshotView {
    let total_channels = snapshot.len();
    let mut rows: Vec<ChannelRow> = snapshot
        .iter()
        .filter(|(key, _)| filter.matches(key))
        .map(|(key, state)| ChannelRow {
            key: key.clone(),
            state: Arc::clone(state),
        })
        .collect();
    rows.sort_by(|a, b| a.key.cmp(&b.key));

    SnapshotView {
        rows,
        total_channels,
        last_event_at: snapshot.last_event_at(),
        taken_at: snapshot.taken_at(),
    }
}

/// Handle to one running reader loop.
pub struct ReaderHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl ReaderHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Request a cooperative stop and wait for the loop to exit.
    pub fn stop(self) -> Result<()> {
        self.stop.store(true, Ordering::Relaxed);
        self.thread
            .join()
            .map_err(|_| MirrorError::Task("reader panicked".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DecodedPayload;
    use crossbeam_channel::unbounded;

    fn put(store: &SnapshotStore, key: &str, value: i64, ts: u64) {
        store.apply_put(
            ChannelKey::new(key),
            DecodedPayload::Integer(value),
            LogicalTime(ts),
            false,
        );
    }

    #[test]
    fn test_filter_matching() {
        let all = KeyFilter::all();
        assert!(all.matches(&ChannelKey::new("s/1/outputs")));

        let filter = KeyFilter::contains("PDO");
        assert!(filter.matches(&ChannelKey::new("s/1/outputs/pdo/0")));
        assert!(!filter.matches(&ChannelKey::new("s/1/inputs/entry/0")));

        // Blank patterns collapse to match-all.
        assert!(KeyFilter::contains("  ").matches(&ChannelKey::new("anything")));
    }

    #[test]
    fn test_read_now_sorts_and_filters() {
        let store = Arc::new(SnapshotStore::new());
        put(&store, "s/2/b", 2, 10);
        put(&store, "s/1/a", 1, 10);
        put(&store, "t/9/z", 9, 10);

        let reader = SnapshotReader::new(
            Arc::clone(&store),
            KeyFilter::contains("s/"),
            Duration::from_millis(100),
        );
        let view = reader.read_now();

        assert_eq!(view.total_channels, 3);
        let keys: Vec<&str> = view.rows.iter().map(|row| row.key.as_str()).collect();
        assert_eq!(keys, vec!["s/1/a", "s/2/b"]);
    }

    #[test]
    fn test_view_never_mutates_store() {
        let store = Arc::new(SnapshotStore::new());
        put(&store, "a", 1, 10);

        let reader = SnapshotReader::new(
            Arc::clone(&store),
            KeyFilter::contains("no-such-key"),
            Duration::from_millis(100),
        );
        let view = reader.read_now();
        assert!(view.rows.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_spawned_reader_delivers_views() {
        let store = Arc::new(SnapshotStore::new());
        put(&store, "a", 1, 10);

        let (tx, rx) = unbounded();
        let reader = SnapshotReader::new(Arc::clone(&store), KeyFilter::all(), Duration::from_millis(5));
        let handle = reader
            .spawn(move |view: SnapshotView| {
                let _ = tx.send(view);
            })
            .unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.rows.len(), 1);

        put(&store, "b", 2, 20);
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        loop {
            let view = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            if view.rows.len() == 2 {
                break;
            }
            assert!(std::time::Instant::now() < deadline, "never saw second row");
        }

        handle.stop().unwrap();
    }
}
