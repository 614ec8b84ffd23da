//! The `"YYYY-MM"` billing/usage accounting window.
//!
//! Usage records, quota rows, and invoice windows all key on a calendar-month
//! period derived from the clock at write time. There is no explicit
//! period-close step; aggregation queries scope by period string.

use crate::error::BillingError;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A calendar-month billing period, serialized as `"YYYY-MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, BillingError> {
        if !(1..=12).contains(&month) {
            return Err(BillingError::Validation(format!(
                "month out of range: {month}"
            )));
        }
        Ok(Period { year, month })
    }

    /// The period containing the given instant.
    pub fn containing(at: DateTime<Utc>) -> Self {
        Period {
            year: at.year(),
            month: at.month(),
        }
    }

    /// The period containing "now". All write-time period derivations use this.
    pub fn current() -> Self {
        Self::containing(Utc::now())
    }

    /// First instant of the month.
    pub fn start(self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .single()
            .expect("first of a valid month is a valid timestamp")
    }

    /// Last instant of the month (millisecond resolution).
    pub fn end(self) -> DateTime<Utc> {
        self.next().start() - Duration::milliseconds(1)
    }

    pub fn next(self) -> Period {
        if self.month == 12 {
            Period {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Period {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| BillingError::Validation(format!("bad period '{s}'")))?;
        let year: i32 = y
            .parse()
            .map_err(|_| BillingError::Validation(format!("bad period year '{s}'")))?;
        let month: u32 = m
            .parse()
            .map_err(|_| BillingError::Validation(format!("bad period month '{s}'")))?;
        Period::new(year, month)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse_round_trip() {
        let p = Period::new(2026, 8).unwrap();
        assert_eq!(p.to_string(), "2026-08");
        assert_eq!("2026-08".parse::<Period>().unwrap(), p);
        assert!("2026-13".parse::<Period>().is_err());
        assert!("garbage".parse::<Period>().is_err());
    }

    #[test]
    fn test_bounds() {
        let p = Period::new(2026, 2).unwrap();
        assert_eq!(p.start().to_rfc3339(), "2026-02-01T00:00:00+00:00");
        // 2026 is not a leap year
        assert_eq!(p.end().to_rfc3339(), "2026-02-28T23:59:59.999+00:00");
    }

    #[test]
    fn test_year_rollover() {
        let dec = Period::new(2025, 12).unwrap();
        assert_eq!(dec.next(), Period::new(2026, 1).unwrap());
    }

    #[test]
    fn test_containing() {
        let at = Utc.with_ymd_and_hms(2026, 8, 29, 12, 0, 0).unwrap();
        assert_eq!(Period::containing(at).to_string(), "2026-08");
    }

    #[test]
    fn test_serde_as_string() {
        let p = Period::new(2026, 8).unwrap();
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"2026-08\"");
        let back: Period = serde_json::from_str("\"2026-08\"").unwrap();
        assert_eq!(back, p);
    }
}
