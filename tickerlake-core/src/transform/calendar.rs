//! Calendar policies: which dates make up the common index.

use super::sessions::session_calendar;
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Fatal alignment failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlignmentError {
    #[error("unknown exchange calendar '{0}'")]
    UnknownExchange(String),

    #[error("invalid calendar range {start}..{end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

/// How the common date index is derived.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CalendarPolicy {
    /// Monday to Friday, regardless of observed trading days.
    #[default]
    BusinessDay,
    /// Every calendar day.
    Daily,
    /// Sorted union of every observed date.
    Union,
    /// Sessions of a named exchange (`XNYS`, `XNAS`).
    Exchange(String),
}

impl FromStr for CalendarPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "b" | "business" => return Ok(CalendarPolicy::BusinessDay),
            "d" | "daily" => return Ok(CalendarPolicy::Daily),
            "union" | "auto" => return Ok(CalendarPolicy::Union),
            _ => {}
        }
        let code = trimmed.to_ascii_uppercase();
        if session_calendar(&code).is_some() {
            Ok(CalendarPolicy::Exchange(code))
        } else {
            Err(format!(
                "unknown calendar '{trimmed}' (expected B, D, union or an exchange code such as XNYS)"
            ))
        }
    }
}

impl fmt::Display for CalendarPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalendarPolicy::BusinessDay => f.write_str("B"),
            CalendarPolicy::Daily => f.write_str("D"),
            CalendarPolicy::Union => f.write_str("union"),
            CalendarPolicy::Exchange(code) => f.write_str(code),
        }
    }
}

fn is_weekday(d: NaiveDate) -> bool {
    !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Build the common calendar between `start` and `end` inclusive.
///
/// `observed` is only consulted by [`CalendarPolicy::Union`].
pub fn build_calendar(
    policy: &CalendarPolicy,
    observed: &BTreeSet<NaiveDate>,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<NaiveDate>, AlignmentError> {
    if start > end {
        return Err(AlignmentError::InvalidRange { start, end });
    }
    let days = || start.iter_days().take_while(move |d| *d <= end);

    let dates = match policy {
        CalendarPolicy::BusinessDay => days().filter(|d| is_weekday(*d)).collect(),
        CalendarPolicy::Daily => days().collect(),
        CalendarPolicy::Union => observed.range(start..=end).copied().collect(),
        CalendarPolicy::Exchange(code) => session_calendar(code)
            .ok_or_else(|| AlignmentError::UnknownExchange(code.clone()))?
            .sessions(start, end),
    };
    Ok(dates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn parses_policies() {
        assert_eq!("B".parse::<CalendarPolicy>(), Ok(CalendarPolicy::BusinessDay));
        assert_eq!("d".parse::<CalendarPolicy>(), Ok(CalendarPolicy::Daily));
        assert_eq!("AUTO".parse::<CalendarPolicy>(), Ok(CalendarPolicy::Union));
        assert_eq!(
            "xnas".parse::<CalendarPolicy>(),
            Ok(CalendarPolicy::Exchange("XNAS".into()))
        );
        assert!("weekly".parse::<CalendarPolicy>().is_err());
    }

    #[test]
    fn business_days_skip_weekends() {
        // Fri 5th .. Tue 9th
        let cal = build_calendar(&CalendarPolicy::BusinessDay, &BTreeSet::new(), d(1, 5), d(1, 9))
            .unwrap();
        assert_eq!(cal, vec![d(1, 5), d(1, 8), d(1, 9)]);
    }

    #[test]
    fn daily_includes_every_day() {
        let cal =
            build_calendar(&CalendarPolicy::Daily, &BTreeSet::new(), d(1, 5), d(1, 9)).unwrap();
        assert_eq!(cal.len(), 5);
    }

    #[test]
    fn union_uses_observed_dates() {
        let observed: BTreeSet<_> = [d(1, 2), d(1, 6), d(1, 3)].into_iter().collect();
        let cal = build_calendar(&CalendarPolicy::Union, &observed, d(1, 2), d(1, 6)).unwrap();
        assert_eq!(cal, vec![d(1, 2), d(1, 3), d(1, 6)]);
    }

    #[test]
    fn exchange_skips_holidays() {
        // MLK day 2024-01-15
        let cal = build_calendar(
            &CalendarPolicy::Exchange("XNYS".into()),
            &BTreeSet::new(),
            d(1, 12),
            d(1, 16),
        )
        .unwrap();
        assert_eq!(cal, vec![d(1, 12), d(1, 16)]);
    }

    #[test]
    fn unknown_exchange_is_fatal() {
        let err = build_calendar(
            &CalendarPolicy::Exchange("XFOO".into()),
            &BTreeSet::new(),
            d(1, 2),
            d(1, 3),
        )
        .unwrap_err();
        assert_eq!(err, AlignmentError::UnknownExchange("XFOO".into()));
    }
}
