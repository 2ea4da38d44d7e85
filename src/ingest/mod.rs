//! Event ingestion: the transport seam and the background feed loop.
//!
//! One ingestor thread per event source; any number of sources may feed the
//! same store.

mod ingestor;
mod source;

pub use ingestor::{EventIngestor, IngestStats, IngestorHandle};
pub use source::{EventSource, QueueSource, SourcePoll};
