//! Stream elements.
//!
//! Everything that flows along an edge is an [`Element`]: a data record, an
//! out-of-band watermark, or the finishmark that terminates a stream.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A single data record: an opaque byte payload.
///
/// Typed payloads are encoded as JSON, so a record produced by one operator
/// can be decoded by the next without sharing concrete types across the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record(Vec<u8>);

impl Record {
    /// Create a record from raw payload bytes.
    pub fn new(payload: Vec<u8>) -> Self {
        Self(payload)
    }

    /// Encode a value into a record.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self(serde_json::to_vec(value)?))
    }

    /// Decode the payload into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.0)
    }

    /// The raw payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Record {
    fn from(payload: &str) -> Self {
        Self(payload.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Record {
    fn from(payload: Vec<u8>) -> Self {
        Self(payload)
    }
}

/// An out-of-band event-time progress marker.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Watermark {
    pub timestamp: u64,
}

impl Watermark {
    pub fn new(timestamp: u64) -> Self {
        Self { timestamp }
    }
}

/// One item of an element stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// A data record.
    Record(Record),
    /// An event-time progress marker.
    Watermark(Watermark),
    /// End of stream. The producer yields nothing after this.
    Finishmark,
}

/// Why a fetch produced no element.
///
/// `NotReady` is a transient condition: the source has nothing available
/// right now and should be polled again later. `Io` means the underlying
/// channel is broken and the task should be retried.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("no element is available right now")]
    NotReady,

    #[error("input channel failed: {0}")]
    Io(#[from] std::io::Error),
}
