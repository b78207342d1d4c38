//! Optimistic concurrency tokens for stream appends.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Version;

/// Precondition an append must satisfy against the stream's current head.
///
/// Serialized as a signed integer: the three sentinels
/// ([`NO_STREAM`](Self::NO_STREAM), [`ANY`](Self::ANY),
/// [`STREAM_EXISTS`](Self::STREAM_EXISTS)) or a non-negative exact version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum ExpectedVersion {
    /// The stream must hold no events yet.
    NoStream,

    /// No check at all; last writer wins.
    #[default]
    Any,

    /// The stream must hold at least one event.
    StreamExists,

    /// The stream head must be exactly this version.
    Exact(Version),
}

/// Raw value below the lowest sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid expected version {0}")]
pub struct InvalidExpectedVersion(pub i64);

impl ExpectedVersion {
    pub const NO_STREAM: i64 = -1;
    pub const ANY: i64 = -2;
    pub const STREAM_EXISTS: i64 = -3;

    /// Expects the stream head to be exactly `version`.
    pub fn exact(version: i64) -> Self {
        Self::Exact(Version::new(version))
    }

    /// Returns the raw signed representation.
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::NoStream => Self::NO_STREAM,
            Self::Any => Self::ANY,
            Self::StreamExists => Self::STREAM_EXISTS,
            Self::Exact(version) => version.as_i64(),
        }
    }

    /// The token a caller holds after successfully appending one more event.
    ///
    /// `NoStream` is the same precondition as `Exact(0)`, so it advances to
    /// `Exact(1)`. `Any` and `StreamExists` carry no revision and stay put.
    pub fn next(&self) -> Self {
        match self {
            Self::NoStream => Self::Exact(Version::first()),
            Self::Exact(version) => Self::Exact(version.next()),
            other => *other,
        }
    }

    /// Checks the precondition against the current head (0 for an empty stream).
    pub fn is_satisfied_by(&self, current: Version) -> bool {
        match self {
            Self::NoStream => current.is_initial(),
            Self::Any => true,
            Self::StreamExists => !current.is_initial(),
            Self::Exact(expected) => *expected == current,
        }
    }
}

impl From<Version> for ExpectedVersion {
    fn from(version: Version) -> Self {
        Self::Exact(version)
    }
}

impl From<ExpectedVersion> for i64 {
    fn from(expected: ExpectedVersion) -> Self {
        expected.as_i64()
    }
}

impl TryFrom<i64> for ExpectedVersion {
    type Error = InvalidExpectedVersion;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            Self::NO_STREAM => Ok(Self::NoStream),
            Self::ANY => Ok(Self::Any),
            Self::STREAM_EXISTS => Ok(Self::StreamExists),
            v if v >= 0 => Ok(Self::Exact(Version::new(v))),
            v => Err(InvalidExpectedVersion(v)),
        }
    }
}

impl std::fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoStream => write!(f, "no stream"),
            Self::Any => write!(f, "any"),
            Self::StreamExists => write!(f, "stream exists"),
            Self::Exact(version) => write!(f, "{version}"),
        }
    }
}
