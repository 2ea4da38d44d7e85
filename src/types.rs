//! Core types for the channel mirror.

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Hierarchical channel identifier, e.g. `"s/1/outputs/pdo/0/entry/0"`.
///
/// Opaque to the mirror: equality is exact string equality, no
/// normalization. Cheap to clone (shared allocation), since the same key
/// flows through every event, table entry, and snapshot row.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey(Arc<str>);

impl ChannelKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        ChannelKey(Arc::from(key.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelKey {
    fn from(key: &str) -> Self {
        ChannelKey::new(key)
    }
}

impl From<String> for ChannelKey {
    fn from(key: String) -> Self {
        ChannelKey(Arc::from(key))
    }
}

impl fmt::Debug for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelKey({})", self.0)
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ChannelKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ChannelKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(ChannelKey::from(String::deserialize(deserializer)?))
    }
}

/// Microseconds since Unix epoch; the total order used to pick the winning
/// write for a key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogicalTime(pub u64);

impl LogicalTime {
    /// Current time, monotonic within the process.
    ///
    /// Anchored to the wall clock once at first use; subsequent readings
    /// advance by the monotonic clock, so ingestion-assigned stamps never
    /// run backwards even if the system clock does.
    pub fn now() -> Self {
        static ANCHOR: OnceLock<(u64, Instant)> = OnceLock::new();
        let (base, started) = ANCHOR.get_or_init(|| {
            let base = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or(Duration::ZERO)
                .as_micros() as u64;
            (base, Instant::now())
        });
        LogicalTime(base + started.elapsed().as_micros() as u64)
    }

    pub fn from_micros(micros: u64) -> Self {
        LogicalTime(micros)
    }

    pub fn as_micros(self) -> u64 {
        self.0
    }

    /// Microseconds elapsed from `earlier` to `self` (zero if reversed).
    pub fn micros_since(self, earlier: LogicalTime) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Debug for LogicalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogicalTime({})", self.0)
    }
}

/// The two kinds of observed transport samples.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A value update; the payload is opaque bytes until decoded.
    Put { payload: Vec<u8> },

    /// A removal. Carries no payload and no comparable timestamp.
    Delete,
}

/// One observed sample from an event source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub key: ChannelKey,
    pub kind: EventKind,

    /// Producer-supplied ordering token, if the transport delivered one.
    pub source_timestamp: Option<LogicalTime>,
}

impl ChannelEvent {
    /// A put without a producer timestamp (ingestion will assign one).
    pub fn put(key: impl Into<ChannelKey>, payload: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            kind: EventKind::Put { payload },
            source_timestamp: None,
        }
    }

    /// A put carrying the producer's own timestamp.
    pub fn put_at(key: impl Into<ChannelKey>, payload: Vec<u8>, timestamp: LogicalTime) -> Self {
        Self {
            key: key.into(),
            kind: EventKind::Put { payload },
            source_timestamp: Some(timestamp),
        }
    }

    pub fn delete(key: impl Into<ChannelKey>) -> Self {
        Self {
            key: key.into(),
            kind: EventKind::Delete,
            source_timestamp: None,
        }
    }
}

/// A decoded application value.
///
/// Closed sum over everything the self-describing payload codecs produce,
/// so the decoder and the display layer share an explicit contract. `Null`
/// covers codec nil values (MessagePack nil, JSON null); mapping keys are
/// text.
#[derive(Clone, Debug, PartialEq)]
pub enum DecodedPayload {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<DecodedPayload>),
    Map(BTreeMap<String, DecodedPayload>),
}

impl fmt::Display for DecodedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedPayload::Null => f.write_str("null"),
            DecodedPayload::Bool(b) => write!(f, "{}", b),
            DecodedPayload::Integer(i) => write!(f, "{}", i),
            DecodedPayload::Float(x) => write!(f, "{}", x),
            DecodedPayload::Text(t) => f.write_str(t),
            DecodedPayload::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            DecodedPayload::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            DecodedPayload::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl Serialize for DecodedPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DecodedPayload::Null => serializer.serialize_unit(),
            DecodedPayload::Bool(b) => serializer.serialize_bool(*b),
            DecodedPayload::Integer(i) => serializer.serialize_i64(*i),
            DecodedPayload::Float(x) => serializer.serialize_f64(*x),
            DecodedPayload::Text(t) => serializer.serialize_str(t),
            DecodedPayload::Bytes(b) => serializer.serialize_bytes(b),
            DecodedPayload::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            DecodedPayload::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

struct PayloadVisitor;

impl<'de> Visitor<'de> for PayloadVisitor {
    type Value = DecodedPayload;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a self-describing payload value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(DecodedPayload::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(DecodedPayload::Integer(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        // Values above i64::MAX lose exactness rather than failing.
        match i64::try_from(v) {
            Ok(i) => Ok(DecodedPayload::Integer(i)),
            Err(_) => Ok(DecodedPayload::Float(v as f64)),
        }
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(DecodedPayload::Float(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(DecodedPayload::Text(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(DecodedPayload::Text(v))
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(DecodedPayload::Bytes(v.to_vec()))
    }

    fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(DecodedPayload::Bytes(v))
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(DecodedPayload::Null)
    }

    fn visit_none<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(DecodedPayload::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        DecodedPayload::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(DecodedPayload::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = BTreeMap::new();
        while let Some((key, value)) = map.next_entry::<String, DecodedPayload>()? {
            entries.insert(key, value);
        }
        Ok(DecodedPayload::Map(entries))
    }
}

impl<'de> Deserialize<'de> for DecodedPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PayloadVisitor)
    }
}

/// The store's per-key record: the winning value and its ordering token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    pub value: DecodedPayload,

    pub timestamp: LogicalTime,

    /// True when the timestamp was assigned at ingestion because the source
    /// supplied none. Fallback stamps lose ties against authoritative ones.
    pub fallback_timestamp: bool,
}

impl ChannelState {
    pub fn new(value: DecodedPayload, timestamp: LogicalTime, fallback_timestamp: bool) -> Self {
        Self {
            value,
            timestamp,
            fallback_timestamp,
        }
    }
}
