//! Sync timestamps.
//!
//! Remote documents carry `lastSynced` as an ISO-8601 string with
//! millisecond precision (`2024-05-01T12:30:00.000Z`). `SyncTimestamp`
//! keeps that wire format and offers a non-decreasing `tick`, so successive
//! pushes never go backwards even if the wall clock does.

use crate::Error;
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyncTimestamp(DateTime<Utc>);

impl SyncTimestamp {
    /// The current wall time, truncated to milliseconds.
    #[must_use]
    pub fn now() -> Self {
        Self::from_millis(Utc::now().timestamp_millis())
    }

    /// Builds a timestamp from milliseconds since the Unix epoch.
    ///
    /// Out-of-range values clamp to the epoch.
    #[must_use]
    pub fn from_millis(millis: i64) -> Self {
        let dt = Utc
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or_default();
        Self(dt)
    }

    #[must_use]
    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    #[must_use]
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Returns the next stamp after `self`: the current time if the clock
    /// has moved forward, otherwise `self` unchanged.
    #[must_use]
    pub fn tick(&self) -> Self {
        let now = Self::now();
        if now > *self { now } else { *self }
    }

    /// Parses an RFC 3339 / ISO-8601 string.
    pub fn parse(s: &str) -> Result<Self, Error> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self::from_millis(dt.with_timezone(&Utc).timestamp_millis()))
            .map_err(|e| Error::InvalidTimestamp(format!("{s:?}: {e}")))
    }

    /// Formats as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
    #[must_use]
    pub fn to_iso_string(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Time elapsed since this stamp, zero if it lies in the future.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        (Utc::now() - self.0).max(Duration::zero())
    }
}

impl fmt::Display for SyncTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso_string())
    }
}

impl FromStr for SyncTimestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SyncTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso_string())
    }
}

impl<'de> Deserialize<'de> for SyncTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
