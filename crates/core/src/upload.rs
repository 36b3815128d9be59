//! Upload record types and lifecycle.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Opaque metadata attributes supplied at upload creation.
///
/// Values round-trip as strings or nulls; the engine records the declared
/// content type and original filename here but never interprets them.
pub type UploadMeta = BTreeMap<String, Option<String>>;

/// Unique identifier for an upload.
///
/// 128 random bits rendered as 32 lowercase hex characters, so identifiers
/// are collision-resistant across concurrent creations without any
/// cross-process coordination.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UploadId(Uuid);

impl UploadId {
    /// Generate a new random upload ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from the 32-character lowercase hex form.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let valid = s.len() == 32
            && s.bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(crate::Error::InvalidUploadId(s.to_string()));
        }
        Uuid::try_parse(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidUploadId(format!("{s}: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Debug for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UploadId({})", self.0.simple())
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl Serialize for UploadId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0.simple())
    }
}

impl<'de> Deserialize<'de> for UploadId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(D::Error::custom)
    }
}

/// Upload lifecycle state, derived from offset and entity length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    /// No bytes committed yet.
    Created,
    /// Some but not all bytes committed.
    InProgress,
    /// All declared bytes committed. Terminal.
    Complete,
}

impl UploadState {
    /// Check if the upload can receive further chunks.
    pub fn accepts_chunks(&self) -> bool {
        !matches!(self, Self::Complete)
    }

    /// Check if the upload reached its terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// A persisted upload record tracking resumable transfer progress.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    /// Unique upload identifier, assigned at creation.
    pub id: UploadId,
    /// Declared total byte length, immutable after creation.
    pub entity_length: u64,
    /// Bytes committed so far. Monotonically non-decreasing, never exceeds
    /// `entity_length`.
    pub offset: u64,
    /// Opaque attributes supplied at creation.
    #[serde(default)]
    pub meta: UploadMeta,
    /// When the upload was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl UploadRecord {
    /// Create a new record with no bytes committed.
    pub fn new(id: UploadId, entity_length: u64, meta: UploadMeta) -> Self {
        Self {
            id,
            entity_length,
            offset: 0,
            meta,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> UploadState {
        if self.offset == self.entity_length {
            UploadState::Complete
        } else if self.offset == 0 {
            UploadState::Created
        } else {
            UploadState::InProgress
        }
    }

    /// Check whether all declared bytes have been committed.
    pub fn is_complete(&self) -> bool {
        self.offset == self.entity_length
    }

    /// Bytes still missing.
    pub fn remaining(&self) -> u64 {
        self.entity_length - self.offset
    }
}
