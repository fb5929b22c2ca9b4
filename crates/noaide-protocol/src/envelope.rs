//! Event envelope types carried inside every frame
//!
//! An [`EventEnvelope`] is the unit the client hands to the application. The
//! payload is opaque to this crate; only the routing and ordering metadata is
//! interpreted.
//!
//! Envelopes travel as a MessagePack map with named fields:
//!
//! | key          | type           |
//! |--------------|----------------|
//! | `event_id`   | string         |
//! | `source`     | string         |
//! | `sequence`   | uint           |
//! | `logical_ts` | uint           |
//! | `wall_ts`    | uint           |
//! | `session_id` | string, opt.   |
//! | `dedup_key`  | string, opt.   |
//! | `payload`    | bin            |

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Origin of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSource {
    /// Parsed from a session JSONL file
    Jsonl,
    /// Read from PTY output
    Pty,
    /// Captured by the API proxy
    Proxy,
    /// Detected by the file watcher
    Watcher,
    /// Initiated by the user
    User,
}

impl EventSource {
    /// Wire name of this source
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jsonl => "Jsonl",
            Self::Pty => "Pty",
            Self::Proxy => "Proxy",
            Self::Watcher => "Watcher",
            Self::User => "User",
        }
    }

    /// Map a wire name onto a source.
    ///
    /// Unrecognized names become [`EventSource::User`].
    pub fn from_wire(name: &str) -> Self {
        match name {
            "Jsonl" => Self::Jsonl,
            "Pty" => Self::Pty,
            "Proxy" => Self::Proxy,
            "Watcher" => Self::Watcher,
            "User" => Self::User,
            _ => Self::User,
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&name))
    }
}

/// Server-signalled degradation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QualityTier {
    /// All events, unbatched
    #[default]
    Full,
    /// All events, delivered in batches
    Batched,
    /// Critical topics only
    Critical,
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Full => "full",
            Self::Batched => "batched",
            Self::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// One decoded event record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event identifier
    #[serde(deserialize_with = "wire_id::deserialize")]
    pub event_id: String,
    /// Where this event originated
    pub source: EventSource,
    /// Producer-scoped monotonic counter
    pub sequence: u64,
    /// Logical clock tick
    pub logical_ts: u64,
    /// Wall clock timestamp (Unix millis)
    pub wall_ts: u64,
    /// Session this event belongs to, if any
    #[serde(default, deserialize_with = "wire_id::deserialize_opt")]
    pub session_id: Option<String>,
    /// Key for echo elimination
    #[serde(default)]
    pub dedup_key: Option<String>,
    /// Opaque event payload
    pub payload: Bytes,
}

impl EventEnvelope {
    /// Create an envelope with a fresh event id, stamped with the current time
    pub fn new(source: EventSource, sequence: u64, logical_ts: u64, payload: Bytes) -> Self {
        let wall_ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            event_id: Uuid::new_v4().to_string(),
            source,
            sequence,
            logical_ts,
            wall_ts,
            session_id: None,
            dedup_key: None,
            payload,
        }
    }

    /// Attach a session id
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach a dedup key
    pub fn with_dedup(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = Some(key.into());
        self
    }
}

/// Identifier fields accept either a string or a 16-byte binary UUID.
///
/// Binary UUIDs are rendered in hyphenated form so the envelope always
/// exposes string ids.
mod wire_id {
    use std::fmt;

    use serde::de::{self, Deserializer, Visitor};
    use uuid::Uuid;

    struct IdVisitor;

    impl<'de> Visitor<'de> for IdVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string or a 16-byte UUID")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(v.to_owned())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
            Uuid::from_slice(v)
                .map(|id| id.hyphenated().to_string())
                .map_err(|_| E::invalid_length(v.len(), &self))
        }
    }

    struct OptIdVisitor;

    impl<'de> Visitor<'de> for OptIdVisitor {
        type Value = Option<String>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an optional string or 16-byte UUID")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            deserialize(d).map(Some)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        d.deserialize_any(IdVisitor)
    }

    pub fn deserialize_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        d.deserialize_option(OptIdVisitor)
    }
}
