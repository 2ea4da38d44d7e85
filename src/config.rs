//! Mirror configuration.
//!
//! Transport connection parameters and the subscription key expression
//! belong to the transport binding and pass through untouched; only the
//! knobs the mirror itself consumes live here.

use crate::decode::PayloadFormat;
use crate::error::{MirrorError, Result};
use std::time::Duration;

/// Mirror configuration.
#[derive(Clone, Debug)]
pub struct MirrorConfig {
    /// Decode format for `Put` payloads.
    pub format: PayloadFormat,

    /// Cadence of the display poll loop.
    /// Default: 100ms
    pub poll_interval: Duration,

    /// Display-side key filter (substring match), applied by the reader.
    /// `None` shows every channel.
    pub key_filter: Option<String>,

    /// How long an ingestor waits on an idle source before re-checking its
    /// stop flag.
    /// Default: 50ms
    pub idle_wait: Duration,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            format: PayloadFormat::default(),
            poll_interval: Duration::from_millis(100),
            key_filter: None,
            idle_wait: Duration::from_millis(50),
        }
    }
}

impl MirrorConfig {
    /// Check the configuration before any ingestion begins.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(MirrorError::Configuration(
                "poll_interval must be non-zero".to_string(),
            ));
        }
        if self.idle_wait.is_zero() {
            return Err(MirrorError::Configuration(
                "idle_wait must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
