//! Canonical ordering for ticker series: sorted by date, one bar per date.

use super::provider::RawBar;

/// Sort bars by date and drop duplicated dates, keeping the last occurrence.
///
/// Callers concatenate `existing ++ fresh`, so the freshest bar wins a date
/// conflict.
pub fn canonicalize(mut bars: Vec<RawBar>) -> Vec<RawBar> {
    // stable sort keeps insertion order among equal dates
    bars.sort_by_key(|b| b.date);

    let mut out: Vec<RawBar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => out.push(bar),
        }
    }
    out
}

/// Merge freshly fetched bars into stored history.
pub fn merge(existing: Vec<RawBar>, fresh: Vec<RawBar>) -> Vec<RawBar> {
    let mut all = existing;
    all.extend(fresh);
    canonicalize(all)
}

/// True when dates are strictly increasing.
pub fn is_canonical(bars: &[RawBar]) -> bool {
    bars.windows(2).all(|w| w[0].date < w[1].date)
}
