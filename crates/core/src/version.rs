//! Version counter for optimistic concurrency control.
//!
//! A [`Version`] is a plain positive integer. Records start at
//! [`Version::INITIAL`] and every committed mutation moves them to
//! [`Version::next`]. Callers echo the version they last observed back as an
//! [`ExpectedVersion`]; a mismatch under lock means somebody else won the race.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Monotonically increasing, strictly positive record version.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Version(u64);

impl Version {
    /// Version assigned on creation.
    pub const INITIAL: Version = Version(1);

    /// Returns `None` for zero.
    pub fn new(value: u64) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// The version a record carries after one more committed write.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<Version> for u64 {
    fn from(value: Version) -> Self {
        value.0
    }
}

impl TryFrom<u64> for Version {
    type Error = VersionParseError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Version::new(value).ok_or(VersionParseError::NotPositive)
    }
}

impl TryFrom<i64> for Version {
    type Error = VersionParseError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u64::try_from(value)
            .ok()
            .and_then(Version::new)
            .ok_or(VersionParseError::NotPositive)
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionParseError::Empty);
        }
        let value: u64 = s
            .parse()
            .map_err(|_| VersionParseError::NotNumeric(s.to_string()))?;
        Version::try_from(value)
    }
}

/// Why a textual version was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("version is empty")]
    Empty,

    #[error("version is not numeric: {0:?}")]
    NotNumeric(String),

    #[error("version must be a positive integer")]
    NotPositive,
}

/// The version a caller believes a record currently has.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExpectedVersion(Version);

impl ExpectedVersion {
    pub fn exact(version: Version) -> Self {
        Self(version)
    }

    pub fn version(self) -> Version {
        self.0
    }

    pub fn matches(self, actual: Version) -> bool {
        self.0 == actual
    }
}

impl From<Version> for ExpectedVersion {
    fn from(value: Version) -> Self {
        Self(value)
    }
}

impl fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
