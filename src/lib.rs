//! # Channel Mirror
//!
//! A concurrent last-value mirror over a pub/sub channel space: ingest an
//! unordered stream of keyed put/delete events from any number of sources,
//! and answer "latest value and timestamp for every channel, consistent at
//! one instant" to a concurrently polling display.
//!
//! ## Core Concepts
//!
//! - **Events**: put/delete samples per channel key, from N sources
//! - **Store**: last-value-wins merge, timestamp-ordered per key
//! - **Snapshots**: atomic point-in-time copies for a polling viewer
//! - **Decoding**: pluggable self-describing payload codecs
//!
//! ## Example
//!
//! ```ignore
//! use channel_mirror::{ChannelEvent, ChannelMirror, MirrorConfig, QueueSource};
//!
//! let mirror = ChannelMirror::new(MirrorConfig::default())?;
//!
//! // The transport binding pushes pre-filtered samples into the feed.
//! let (feed, source) = QueueSource::bounded(1024);
//! let ingest = mirror.attach_source("subscriber", source)?;
//!
//! feed.send(ChannelEvent::put("s/1/outputs/pdo/0", payload))?;
//!
//! for (key, state) in mirror.snapshot().iter() {
//!     println!("{key} = {}", state.value);
//! }
//!
//! ingest.stop()?;
//! ```

pub mod config;
pub mod decode;
pub mod error;
pub mod ingest;
pub mod mirror;
pub mod reader;
pub mod store;
pub mod types;

// Re-exports
pub use config::MirrorConfig;
pub use decode::{JsonDecoder, MessagePackDecoder, PayloadDecoder, PayloadFormat, RawDecoder};
pub use error::{MirrorError, Result};
pub use ingest::{EventIngestor, EventSource, IngestStats, IngestorHandle, QueueSource, SourcePoll};
pub use mirror::ChannelMirror;
pub use reader::{ChannelRow, DisplaySink, KeyFilter, ReaderHandle, SnapshotReader, SnapshotView};
pub use store::{Snapshot, SnapshotStore};
pub use types::{ChannelEvent, ChannelKey, ChannelState, DecodedPayload, EventKind, LogicalTime};
