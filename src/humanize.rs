//! Human-readable interval formatting and parsing utilities

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid interval format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),

    #[error("Interval too large: {0} (at most {max} weeks)", max = MAX_SECS / WEEK)]
    TooLarge(String),
}

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;

/// Upper bound for intervals, roughly 1000 years
pub const MAX_SECS: u64 = 52_000 * WEEK;

/// Interval wrapper with human-readable parsing ("2 hours", "1 day", "30m")
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval(pub Duration);

impl Interval {
    pub fn from_secs(secs: u64) -> Self {
        Interval(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_secs(&self) -> u64 {
        self.0.as_secs()
    }

    /// Same interval as a chrono duration; `None` when out of chrono's range
    pub fn as_chrono(&self) -> Option<TimeDelta> {
        i64::try_from(self.as_secs()).ok().and_then(TimeDelta::try_seconds)
    }

    /// `start` shifted by this interval, `None` on timestamp overflow
    pub fn after(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        start.checked_add_signed(self.as_chrono()?)
    }

    fn bounded(secs: u64, input: &str) -> Result<Self, ParseError> {
        if secs > MAX_SECS {
            return Err(ParseError::TooLarge(input.to_string()));
        }
        Ok(Interval::from_secs(secs))
    }

    pub fn to_human_readable(&self) -> String {
        const UNITS: &[(&str, u64)] = &[
            ("second", 1),
            ("minute", MINUTE),
            ("hour", HOUR),
            ("day", DAY),
            ("week", WEEK),
        ];

        let secs = self.as_secs();
        for &(unit, divisor) in UNITS.iter().rev() {
            if secs >= divisor && secs % divisor == 0 {
                let value = secs / divisor;
                let plural = if value == 1 { "" } else { "s" };
                return format!("{} {}{}", value, unit, plural);
            }
        }

        format!("{} seconds", secs)
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct IntervalVisitor;

        impl<'de> serde::de::Visitor<'de> for IntervalVisitor {
            type Value = Interval;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an interval as string (e.g., \"2 hours\", \"1d\") or seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Interval::bounded(v, &v.to_string()).map_err(E::custom)
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let secs = u64::try_from(v).map_err(|_| E::custom("interval must not be negative"))?;
                Interval::bounded(secs, &v.to_string()).map_err(E::custom)
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse::<Interval>().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(IntervalVisitor)
    }
}

impl Serialize for Interval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_human_readable())
    }
}

impl FromStr for Interval {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        // Plain number means seconds
        if let Ok(num) = s.parse::<u64>() {
            return Interval::bounded(num, &s);
        }

        let (num_str, unit) = if let Some(pos) = s.find(|c: char| !c.is_ascii_digit()) {
            (&s[..pos], s[pos..].trim())
        } else {
            return Err(ParseError::InvalidFormat(s.to_string()));
        };

        if num_str.is_empty() {
            return Err(ParseError::InvalidFormat(s.to_string()));
        }

        let num: u64 = num_str.parse()?;

        let multiplier = match unit {
            "s" | "sec" | "secs" | "second" | "seconds" => 1,
            "m" | "min" | "mins" | "minute" | "minutes" => MINUTE,
            "h" | "hr" | "hrs" | "hour" | "hours" => HOUR,
            "d" | "day" | "days" => DAY,
            "w" | "week" | "weeks" => WEEK,
            _ => return Err(ParseError::InvalidUnit(unit.to_string())),
        };

        let secs = num
            .checked_mul(multiplier)
            .ok_or_else(|| ParseError::TooLarge(s.to_string()))?;
        Interval::bounded(secs, &s)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_human_readable())
    }
}
