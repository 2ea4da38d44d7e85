//! Background feed loop driving events into the store.

use crate::decode::PayloadDecoder;
use crate::error::{MirrorError, Result};
use crate::store::SnapshotStore;
use crate::types::{ChannelEvent, EventKind, LogicalTime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::source::{EventSource, SourcePoll};

/// Counters for one source's feed.
#[derive(Clone, Copy, Debug, Default)]
pub struct IngestStats {
    /// Puts decoded and handed to the store (winning or superseded).
    pub puts: u64,

    /// Deletes handed to the store.
    pub deletes: u64,

    /// Events dropped because their payload would not decode.
    pub decode_failures: u64,
}

impl IngestStats {
    /// Total events pulled off the source.
    pub fn events(&self) -> u64 {
        self.puts + self.deletes + self.decode_failures
    }
}

/// Spawns and configures feed loops over a shared store.
pub struct EventIngestor {
    store: Arc<SnapshotStore>,
    decoder: Arc<dyn PayloadDecoder>,
    idle_wait: Duration,
}

impl EventIngestor {
    pub fn new(
        store: Arc<SnapshotStore>,
        decoder: Arc<dyn PayloadDecoder>,
        idle_wait: Duration,
    ) -> Self {
        Self {
            store,
            decoder,
            idle_wait,
        }
    }

    /// Spawn the feed loop for one source.
    ///
    /// Call once per source; every loop folds into the same store. The
    /// returned handle is the owner's window into the feed: cooperative
    /// stop, final stats, and source disconnects all surface there.
    pub fn spawn(
        &self,
        name: impl Into<String>,
        source: impl EventSource + 'static,
    ) -> Result<IngestorHandle> {
        let name = name.into();
        let stop = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            name: name.clone(),
            store: Arc::clone(&self.store),
            decoder: Arc::clone(&self.decoder),
            idle_wait: self.idle_wait,
            stop: Arc::clone(&stop),
            stats: IngestStats::default(),
            window_start: Instant::now(),
            window_events: 0,
        };

        let thread = thread::Builder::new()
            .name(format!("ingest-{}", name))
            .spawn(move || worker.run(source))
            .map_err(|e| MirrorError::Task(format!("failed to spawn ingestor: {}", e)))?;

        Ok(IngestorHandle { name, stop, thread })
    }
}

struct Worker {
    name: String,
    store: Arc<SnapshotStore>,
    decoder: Arc<dyn PayloadDecoder>,
    idle_wait: Duration,
    stop: Arc<AtomicBool>,
    stats: IngestStats,
    window_start: Instant,
    window_events: u64,
}

impl Worker {
    fn run(mut self, mut source: impl EventSource) -> Result<IngestStats> {
        info!(source = %self.name, "ingestor started");
        loop {
            // The stop flag is only checked between events, so an in-flight
            // event is always fully applied before the loop exits.
            if self.stop.load(Ordering::Relaxed) {
                info!(source = %self.name, events = self.stats.events(), "ingestor stopped");
                return Ok(self.stats);
            }

            match source.poll(self.idle_wait) {
                SourcePoll::Sample(event) => self.ingest(event),
                SourcePoll::Idle => {}
                SourcePoll::Closed => {
                    warn!(source = %self.name, "event source disconnected");
                    return Err(MirrorError::SourceDisconnected { name: self.name });
                }
            }

            self.report_rate();
        }
    }

    fn ingest(&mut self, event: ChannelEvent) {
        self.window_events += 1;
        match event.kind {
            EventKind::Delete => {
                self.store.apply_delete(&event.key);
                self.stats.deletes += 1;
            }
            EventKind::Put { payload } => {
                let (timestamp, fallback) = match event.source_timestamp {
                    Some(ts) => (ts, false),
                    None => (LogicalTime::now(), true),
                };
                match self.decoder.decode(&payload) {
                    Ok(value) => {
                        self.store.apply_put(event.key, value, timestamp, fallback);
                        self.stats.puts += 1;
                    }
                    Err(err) => {
                        // One bad sample never halts the feed.
                        warn!(source = %self.name, key = %event.key, %err, "dropping undecodable payload");
                        self.store.note_event(LogicalTime::now());
                        self.stats.decode_failures += 1;
                    }
                }
            }
        }
    }

    fn report_rate(&mut self) {
        if self.window_start.elapsed() >= Duration::from_secs(1) {
            debug!(source = %self.name, samples_per_sec = self.window_events, "ingest rate");
            self.window_events = 0;
            self.window_start = Instant::now();
        }
    }
}

/// Handle to one running ingestor thread.
pub struct IngestorHandle {
    name: String,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<Result<IngestStats>>,
}

impl IngestorHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the feed loop has exited (stopped or disconnected).
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Request a cooperative stop and wait for the loop to exit.
    pub fn stop(self) -> Result<IngestStats> {
        self.stop.store(true, Ordering::Relaxed);
        self.join()
    }

    /// Wait for the loop to exit on its own. Returns
    /// [`MirrorError::SourceDisconnected`] when the source closed the feed.
    pub fn join(self) -> Result<IngestStats> {
        match self.thread.join() {
            Ok(result) => result,
            Err(_) => Err(MirrorError::Task(format!(
                "ingestor {:?} panicked",
                self.name
            ))),
        }
    }
}
