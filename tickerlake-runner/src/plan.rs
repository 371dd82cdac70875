//! Incremental fetch planning.

use chrono::{Duration, NaiveDate};
use std::fmt;
use tickerlake_core::config::UpdateMode;

/// What to request for one ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPlan {
    /// Whole configured range.
    Full { start: NaiveDate, end: NaiveDate },
    /// Only bars strictly after the last stored date.
    Incremental { start: NaiveDate, end: NaiveDate },
    /// Stored history already reaches the configured end.
    UpToDate { last: NaiveDate },
}

impl FetchPlan {
    /// Date window to request, if any.
    pub fn window(&self) -> Option<(NaiveDate, NaiveDate)> {
        match *self {
            FetchPlan::Full { start, end } | FetchPlan::Incremental { start, end } => {
                Some((start, end))
            }
            FetchPlan::UpToDate { .. } => None,
        }
    }
}

impl fmt::Display for FetchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchPlan::Full { start, end } => write!(f, "full {start}..{end}"),
            FetchPlan::Incremental { start, end } => write!(f, "incremental {start}..{end}"),
            FetchPlan::UpToDate { last } => write!(f, "up to date (last {last})"),
        }
    }
}

/// Decide the request window from the update mode and the last stored date.
pub fn plan_fetch(
    mode: UpdateMode,
    last_stored: Option<NaiveDate>,
    start: NaiveDate,
    end: NaiveDate,
) -> FetchPlan {
    match (mode, last_stored) {
        (UpdateMode::Incremental, Some(last)) => {
            let next = last + Duration::days(1);
            if next > end {
                FetchPlan::UpToDate { last }
            } else {
                FetchPlan::Incremental { start: next, end }
            }
        }
        _ => FetchPlan::Full { start, end },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn no_history_fetches_everything() {
        assert_eq!(
            plan_fetch(UpdateMode::Incremental, None, d(2), d(31)),
            FetchPlan::Full { start: d(2), end: d(31) }
        );
    }

    #[test]
    fn incremental_resumes_after_last_date() {
        assert_eq!(
            plan_fetch(UpdateMode::Incremental, Some(d(10)), d(2), d(31)),
            FetchPlan::Incremental { start: d(11), end: d(31) }
        );
    }

    #[test]
    fn caught_up_history_makes_no_request() {
        let plan = plan_fetch(UpdateMode::Incremental, Some(d(31)), d(2), d(31));
        assert_eq!(plan, FetchPlan::UpToDate { last: d(31) });
        assert_eq!(plan.window(), None);
    }

    #[test]
    fn full_mode_ignores_history() {
        assert_eq!(
            plan_fetch(UpdateMode::Full, Some(d(30)), d(2), d(31)),
            FetchPlan::Full { start: d(2), end: d(31) }
        );
    }

    proptest! {
        #[test]
        fn incremental_window_starts_after_last(last in 0i64..400, span in 0i64..400) {
            let base = d(1);
            let last = base + Duration::days(last);
            let end = base + Duration::days(span);
            match plan_fetch(UpdateMode::Incremental, Some(last), base, end) {
                FetchPlan::Incremental { start, end: e } => {
                    prop_assert!(start > last);
                    prop_assert!(start <= e);
                }
                FetchPlan::UpToDate { last: l } => prop_assert!(l >= end),
                FetchPlan::Full { .. } => prop_assert!(false, "history present"),
            }
        }
    }
}
