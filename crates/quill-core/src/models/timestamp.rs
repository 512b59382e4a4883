//! Timestamp normalization between local and remote representations.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};

/// A point in time, independent of how any store encodes it.
///
/// Locally this serializes as an RFC 3339 string. Remote stores convert it
/// to their [`NativeTimestamp`] form on write and back on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

/// The remote document store's own timestamp encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NativeTimestamp {
    /// Whole seconds since the Unix epoch
    pub seconds: i64,
    /// Sub-second nanoseconds
    pub nanos: u32,
}

impl Timestamp {
    /// The current instant
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    #[must_use]
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Build a timestamp from Unix milliseconds, `None` when out of range
    pub fn from_unix_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Self)
    }

    /// Whole seconds since the Unix epoch
    pub fn unix_seconds(&self) -> i64 {
        self.0.timestamp()
    }

    /// Render as RFC 3339 in UTC, keeping sub-second precision when present
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// Parse an RFC 3339 / ISO-8601 string with any offset
    pub fn parse_rfc3339(value: &str) -> Result<Self> {
        DateTime::parse_from_rfc3339(value.trim())
            .map(|datetime| Self(datetime.with_timezone(&Utc)))
            .map_err(|error| Error::Serialization(format!("invalid timestamp '{value}': {error}")))
    }

    /// Convert to the remote store's native encoding
    pub fn to_native(self) -> NativeTimestamp {
        NativeTimestamp {
            seconds: self.0.timestamp(),
            nanos: self.0.timestamp_subsec_nanos(),
        }
    }

    /// Convert from the remote store's native encoding
    pub fn from_native(native: NativeTimestamp) -> Result<Self> {
        DateTime::from_timestamp(native.seconds, native.nanos)
            .map(Self)
            .ok_or_else(|| {
                Error::Serialization(format!(
                    "timestamp out of range: {}s {}ns",
                    native.seconds, native.nanos
                ))
            })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

/// Every shape a timestamp has been persisted in by earlier clients.
#[derive(Deserialize)]
#[serde(untagged)]
enum TimestampRepr {
    Text(String),
    Millis(i64),
    Parts {
        seconds: i64,
        #[serde(default, alias = "nanos")]
        nanoseconds: u32,
    },
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match TimestampRepr::deserialize(deserializer)? {
            TimestampRepr::Text(text) => Self::parse_rfc3339(&text).map_err(de::Error::custom),
            TimestampRepr::Millis(millis) => Self::from_unix_millis(millis)
                .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {millis}ms"))),
            TimestampRepr::Parts {
                seconds,
                nanoseconds,
            } => Self::from_native(NativeTimestamp {
                seconds,
                nanos: nanoseconds,
            })
            .map_err(de::Error::custom),
        }
    }
}
