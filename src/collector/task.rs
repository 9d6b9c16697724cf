use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::collector::error::ErrorKind;

/// Canonical text layout of a day key
pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// A calendar day in the requested range, rendered as `YYYY-MM-DD`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

/// Failure to parse a `YYYY-MM-DD` string
#[derive(Debug, Clone, Error)]
#[error("invalid date '{input}': {reason}")]
pub struct DayKeyError {
    /// The rejected input
    pub input: String,

    /// Parser explanation
    pub reason: String,
}

impl DayKey {
    /// Build a day key from year, month and day, if that date exists
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// The following calendar day, `None` past the end of the calendar
    pub fn succ(&self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }

    /// Signed number of calendar days from `self` to `other`
    pub fn days_until(&self, other: &DayKey) -> i64 {
        other.0.signed_duration_since(self.0).num_days()
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_KEY_FORMAT))
    }
}

impl FromStr for DayKey {
    type Err = DayKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // chrono accepts unpadded fields ("2022-7-1"); the canonical form does not
        if s.len() != 10 {
            return Err(DayKeyError {
                input: s.to_string(),
                reason: "expected YYYY-MM-DD".to_string(),
            });
        }

        NaiveDate::parse_from_str(s, DAY_KEY_FORMAT)
            .map(Self)
            .map_err(|e| DayKeyError {
                input: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One day submitted to the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTask {
    /// Zero-based offset of the day inside the requested range
    pub index: usize,

    /// Day to fetch
    pub day: DayKey,
}

/// Result of a single fetch, produced by a worker and consumed by the aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success {
        task: FetchTask,
        url: String,
    },
    Failure {
        task: FetchTask,
        kind: ErrorKind,
        message: String,
    },
}

impl FetchOutcome {
    pub fn task(&self) -> &FetchTask {
        match self {
            FetchOutcome::Success { task, .. } => task,
            FetchOutcome::Failure { task, .. } => task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let day: DayKey = "2022-06-29".parse().unwrap();
        assert_eq!(day, DayKey::from_ymd(2022, 6, 29).unwrap());
        assert_eq!(day.to_string(), "2022-06-29");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("2022".parse::<DayKey>().is_err());
        assert!("Rafal".parse::<DayKey>().is_err());
        assert!("2022-7-1".parse::<DayKey>().is_err());
        assert!("2022-02-30".parse::<DayKey>().is_err());

        let err = "2022-13-01".parse::<DayKey>().unwrap_err();
        assert_eq!(err.input, "2022-13-01");
    }

    #[test]
    fn test_ordering_and_distance() {
        let a = DayKey::from_ymd(2022, 6, 29).unwrap();
        let b = DayKey::from_ymd(2022, 7, 1).unwrap();
        assert!(a < b);
        assert_eq!(a.days_until(&b), 2);
        assert_eq!(b.days_until(&a), -2);
        assert_eq!(a.succ().unwrap(), DayKey::from_ymd(2022, 6, 30).unwrap());
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let day = DayKey::from_ymd(2024, 2, 29).unwrap();
        let json = serde_json::to_string(&day).unwrap();
        assert_eq!(json, "\"2024-02-29\"");
        let back: DayKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, day);
    }
}
