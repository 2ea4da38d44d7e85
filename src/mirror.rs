//! Top-level mirror tying store, ingestion, and the read side together.

use crate::config::MirrorConfig;
use crate::error::Result;
use crate::ingest::{EventIngestor, EventSource, IngestorHandle};
use crate::reader::{KeyFilter, SnapshotReader};
use crate::store::{Snapshot, SnapshotStore};
use std::sync::Arc;

/// One process-wide mirror over a channel space.
///
/// Owns the shared store; ingestors and readers borrow it by reference.
/// Created empty, discarded on drop; nothing persists across restarts.
pub struct ChannelMirror {
    config: MirrorConfig,
    store: Arc<SnapshotStore>,
    ingestor: EventIngestor,
}

impl ChannelMirror {
    /// Validate the configuration and initialize an empty mirror.
    ///
    /// Configuration problems surface here, before any ingestion begins.
    pub fn new(config: MirrorConfig) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(SnapshotStore::new());
        let ingestor = EventIngestor::new(
            Arc::clone(&store),
            Arc::from(config.format.decoder()),
            config.idle_wait,
        );
        Ok(Self {
            config,
            store,
            ingestor,
        })
    }

    /// The shared store.
    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Start ingesting from one more source.
    ///
    /// The handle is the owner's window into that feed: disconnects and
    /// final stats surface there, and stopping it never interrupts the
    /// other sources.
    pub fn attach_source(
        &self,
        name: impl Into<String>,
        source: impl EventSource + 'static,
    ) -> Result<IngestorHandle> {
        self.ingestor.spawn(name, source)
    }

    /// A reader polling at the configured cadence with the configured
    /// display filter.
    pub fn reader(&self) -> SnapshotReader {
        let filter = match &self.config.key_filter {
            Some(pattern) => KeyFilter::contains(pattern),
            None => KeyFilter::all(),
        };
        SnapshotReader::new(Arc::clone(&self.store), filter, self.config.poll_interval)
    }

    /// One-shot snapshot of the current table.
    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }
}
