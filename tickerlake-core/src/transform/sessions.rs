//! Exchange session calendars.
//!
//! Only US equity venues are built in. They share the NYSE holiday schedule
//! under its modern rules; historical one-off rule changes before 1990 are
//! not modelled.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Source of trading sessions for an exchange.
pub trait SessionCalendar {
    /// MIC-style code, e.g. `XNYS`.
    fn code(&self) -> &str;

    fn is_session(&self, date: NaiveDate) -> bool;

    /// Sessions between `start` and `end` inclusive.
    fn sessions(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| self.is_session(*d))
            .collect()
    }
}

/// Look up a built-in calendar by exchange code (case-insensitive).
pub fn session_calendar(code: &str) -> Option<Box<dyn SessionCalendar>> {
    match code.to_ascii_uppercase().as_str() {
        "XNYS" => Some(Box::new(UsEquitySessions::new("XNYS"))),
        "XNAS" => Some(Box::new(UsEquitySessions::new("XNAS"))),
        _ => None,
    }
}

/// Full-day closures outside the regular holiday rules.
const SPECIAL_CLOSURES: &[(i32, u32, u32)] = &[
    (1994, 4, 27),  // Nixon funeral
    (2001, 9, 11),  // September 11
    (2001, 9, 12),
    (2001, 9, 13),
    (2001, 9, 14),
    (2004, 6, 11),  // Reagan funeral
    (2007, 1, 2),   // Ford funeral
    (2012, 10, 29), // Hurricane Sandy
    (2012, 10, 30),
    (2018, 12, 5),  // G.H.W. Bush funeral
    (2025, 1, 9),   // Carter funeral
];

/// NYSE/Nasdaq regular sessions.
#[derive(Debug, Clone)]
pub struct UsEquitySessions {
    code: String,
}

impl UsEquitySessions {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
        }
    }

    /// Whether `date` is a full-day market holiday.
    pub fn is_holiday(date: NaiveDate) -> bool {
        let year = date.year();
        if SPECIAL_CLOSURES
            .iter()
            .any(|&(y, m, d)| y == year && m == date.month() && d == date.day())
        {
            return true;
        }

        // New Year's Day: Sunday moves to Monday, Saturday is not made up.
        if let Some(jan1) = NaiveDate::from_ymd_opt(year, 1, 1) {
            let observed = match jan1.weekday() {
                Weekday::Sun => Some(jan1 + Duration::days(1)),
                Weekday::Sat => None,
                _ => Some(jan1),
            };
            if observed == Some(date) {
                return true;
            }
        }

        let fixed = [(7, 4), (12, 25)]
            .into_iter()
            .chain((year >= 2022).then_some((6, 19)))
            .filter_map(|(m, d)| NaiveDate::from_ymd_opt(year, m, d))
            .map(observe);

        let floating = [
            nth_weekday(year, 1, Weekday::Mon, 3),  // Martin Luther King Jr. Day
            nth_weekday(year, 2, Weekday::Mon, 3),  // Washington's Birthday
            last_weekday(year, 5, Weekday::Mon),    // Memorial Day
            nth_weekday(year, 9, Weekday::Mon, 1),  // Labor Day
            nth_weekday(year, 11, Weekday::Thu, 4), // Thanksgiving
            easter_sunday(year).map(|e| e - Duration::days(2)), // Good Friday
        ]
        .into_iter()
        .flatten();

        fixed.chain(floating).any(|h| h == date)
    }
}

impl SessionCalendar for UsEquitySessions {
    fn code(&self) -> &str {
        &self.code
    }

    fn is_session(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !Self::is_holiday(date)
    }
}

/// Saturday holidays are observed on Friday, Sunday holidays on Monday.
fn observe(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let mut d = first_next - Duration::days(1);
    while d.weekday() != weekday {
        d -= Duration::days(1);
    }
    Some(d)
}

/// Gregorian Easter Sunday (anonymous Gregorian algorithm).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}
