use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::CoreError;

/// Milliseconds since the Unix epoch, serialized as an RFC 3339 string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const EPOCH: Timestamp = Timestamp(0);

    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc).timestamp_millis()))
            .map_err(|e| CoreError::InvalidTimestamp(format!("{s}: {e}")))
    }

    pub fn to_datetime(&self) -> Result<DateTime<Utc>, CoreError> {
        DateTime::<Utc>::from_timestamp_millis(self.0)
            .ok_or_else(|| CoreError::InvalidTimestamp(format!("{}ms out of range", self.0)))
    }

    pub fn to_rfc3339(&self) -> Result<String, CoreError> {
        Ok(self.to_datetime()?.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// Whole hours from `self` to `later`, truncated toward zero.
    pub fn hours_until(&self, later: &Timestamp) -> i64 {
        later.0.saturating_sub(self.0) / 3_600_000
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Ok(s) => write!(f, "Timestamp({s})"),
            Err(_) => write!(f, "Timestamp({}ms)", self.0),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{}", self.0),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let s = self.to_rfc3339().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&s)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Millis(i64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Timestamp::parse(&s).map_err(serde::de::Error::custom),
            Raw::Millis(ms) => {
                let ts = Timestamp(ms);
                ts.to_datetime()
                    .map(|_| ts)
                    .map_err(serde::de::Error::custom)
            }
        }
    }
}

/// A clock that hands out strictly increasing timestamps, even when several
/// stamps land within the same wall-clock millisecond.
pub struct LogClock {
    last: Timestamp,
}

impl LogClock {
    pub fn new() -> Self {
        Self {
            last: Timestamp::EPOCH,
        }
    }

    /// A clock whose next tick is guaranteed to be later than `last`.
    pub fn starting_after(last: Timestamp) -> Self {
        Self { last }
    }

    pub fn last(&self) -> Timestamp {
        self.last
    }

    /// Generate the next monotonically increasing timestamp.
    pub fn tick(&mut self) -> Timestamp {
        let now = Timestamp::now();
        let next = if now > self.last {
            now
        } else {
            Timestamp(self.last.0.saturating_add(1))
        };
        self.last = next;
        next
    }

    /// Fold in a timestamp seen elsewhere so later ticks sort after it.
    pub fn observe(&mut self, seen: Timestamp) {
        if seen > self.last {
            self.last = seen;
        }
    }
}

impl Default for LogClock {
    fn default() -> Self {
        Self::new()
    }
}
