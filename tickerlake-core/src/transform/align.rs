//! Reindex per-ticker series onto the common calendar.

use super::calendar::{build_calendar, AlignmentError, CalendarPolicy};
use crate::panel::{Field, Panel, PanelRow};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Fields carried through alignment. `ret_1d` is derived afterwards.
const ALIGNED_FIELDS: [Field; 6] = [
    Field::Open,
    Field::High,
    Field::Low,
    Field::Close,
    Field::AdjClose,
    Field::Volume,
];

/// Fill null runs from the last known value, at most `limit` entries per run.
///
/// A run longer than `limit` has its first `limit` entries filled and the
/// rest left null. Leading nulls (no prior value) stay null.
pub fn forward_fill(values: &mut [Option<f64>], limit: usize) {
    let gaps: Vec<bool> = values.iter().map(Option::is_none).collect();
    fill_gaps(values, &gaps, limit);
}

/// Forward-fill only the positions flagged in `gaps`.
///
/// Unflagged positions are left as they are, null included, and carry their
/// own value forward, so a gap after an undefined row stays undefined.
pub fn fill_gaps(values: &mut [Option<f64>], gaps: &[bool], limit: usize) {
    let mut last: Option<f64> = None;
    let mut run = 0usize;
    for (v, gap) in values.iter_mut().zip(gaps) {
        if !*gap {
            last = *v;
            run = 0;
            continue;
        }
        run += 1;
        if run <= limit && v.is_none() {
            *v = last;
        }
    }
}

/// Align every ticker's adjusted rows onto one calendar.
///
/// The calendar spans the earliest to the latest observed date across all
/// inputs. Rows on dates outside the calendar are dropped, calendar dates
/// without an input row are forward-filled per field up to `ffill_limit`
/// (fields an input row leaves undefined stay undefined), then rows before each
/// ticker's first valid close are trimmed. A ticker with no valid close at
/// all is left out of the panel.
pub fn align(
    series: BTreeMap<String, Vec<PanelRow>>,
    policy: &CalendarPolicy,
    ffill_limit: usize,
) -> Result<Panel, AlignmentError> {
    let observed: BTreeSet<NaiveDate> = series
        .values()
        .flat_map(|rows| rows.iter().map(|r| r.date))
        .collect();

    let (Some(&start), Some(&end)) = (observed.first(), observed.last()) else {
        return Ok(Panel::default());
    };

    let calendar = build_calendar(policy, &observed, start, end)?;

    let mut out = BTreeMap::new();
    for (ticker, rows) in series {
        let by_date: BTreeMap<NaiveDate, PanelRow> =
            rows.into_iter().map(|r| (r.date, r)).collect();

        let gaps: Vec<bool> = calendar.iter().map(|d| !by_date.contains_key(d)).collect();
        let mut reindexed: Vec<PanelRow> = calendar
            .iter()
            .map(|d| by_date.get(d).copied().unwrap_or_else(|| PanelRow::empty(*d)))
            .collect();

        for field in ALIGNED_FIELDS {
            let mut column: Vec<Option<f64>> = reindexed.iter().map(|r| r.get(field)).collect();
            fill_gaps(&mut column, &gaps, ffill_limit);
            for (row, v) in reindexed.iter_mut().zip(column) {
                row.set(field, v);
            }
        }

        match reindexed.iter().position(|r| r.close.is_some()) {
            Some(first) => {
                reindexed.drain(..first);
                out.insert(ticker, reindexed);
            }
            None => tracing::warn!(%ticker, "no valid close on the calendar, dropping ticker"),
        }
    }

    Ok(Panel {
        calendar,
        series: out,
    })
}
