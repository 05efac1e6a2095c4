use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cmp::Ordering;

/// Stable document identifier, assigned monotonically from 0.
///
/// Ids are never reused within a session. Compaction renumbers them densely and
/// reports the mapping through [`crate::Remap`].
pub type DocId = u32;

/// Opaque document payload stored next to its vector.
///
/// Plain text and JSON records are the common cases; anything else can be kept
/// as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    bytes: Vec<u8>,
}

impl Document {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            bytes: text.into().into_bytes(),
        }
    }

    /// Encode a structured record as JSON.
    pub fn from_json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self {
            bytes: serde_json::to_vec(value)?,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The payload as UTF-8, if it is valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    pub fn to_json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.bytes)?)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<String> for Document {
    fn from(text: String) -> Self {
        Self::from_text(text)
    }
}

impl From<&str> for Document {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

/// A graph search hit. Lower distance is closer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: DocId,
    pub distance: f32,
}

impl Neighbor {
    pub const fn new(id: DocId, distance: f32) -> Self {
        Self { id, distance }
    }

    /// Ascending distance, then ascending id. Total over NaN.
    pub fn cmp_by_distance(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}
