//! Payload decoding for `Put` events.
//!
//! Payload bytes are opaque to the store; a pluggable decoder turns them
//! into [`DecodedPayload`] values before the merge. A failed decode drops
//! the one event, never the feed.

use crate::error::{MirrorError, Result};
use crate::types::DecodedPayload;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Payload decode format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadFormat {
    MessagePack,
    Json,
    Raw,
}

impl Default for PayloadFormat {
    fn default() -> Self {
        PayloadFormat::MessagePack
    }
}

impl FromStr for PayloadFormat {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "msgpack" | "messagepack" => Ok(PayloadFormat::MessagePack),
            "json" => Ok(PayloadFormat::Json),
            "raw" => Ok(PayloadFormat::Raw),
            other => Err(MirrorError::Configuration(format!(
                "unknown payload format: {:?}",
                other
            ))),
        }
    }
}

impl PayloadFormat {
    /// The decoder for this format.
    pub fn decoder(self) -> Box<dyn PayloadDecoder> {
        match self {
            PayloadFormat::MessagePack => Box::new(MessagePackDecoder),
            PayloadFormat::Json => Box::new(JsonDecoder),
            PayloadFormat::Raw => Box::new(RawDecoder),
        }
    }
}

/// Turns opaque payload bytes into a decoded application value.
pub trait PayloadDecoder: Send + Sync {
    fn decode(&self, payload: &[u8]) -> Result<DecodedPayload>;
}

/// Self-describing binary payloads (MessagePack).
pub struct MessagePackDecoder;

impl PayloadDecoder for MessagePackDecoder {
    fn decode(&self, payload: &[u8]) -> Result<DecodedPayload> {
        Ok(rmp_serde::from_slice(payload)?)
    }
}

/// JSON text payloads.
pub struct JsonDecoder;

impl PayloadDecoder for JsonDecoder {
    fn decode(&self, payload: &[u8]) -> Result<DecodedPayload> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Undecoded payloads: UTF-8 text when valid, raw bytes otherwise.
pub struct RawDecoder;

impl PayloadDecoder for RawDecoder {
    fn decode(&self, payload: &[u8]) -> Result<DecodedPayload> {
        match std::str::from_utf8(payload) {
            Ok(text) => Ok(DecodedPayload::Text(text.to_string())),
            Err(_) => Ok(DecodedPayload::Bytes(payload.to_vec())),
        }
    }
}
