//! Per-ticker derived columns computed on the aligned calendar.

use crate::panel::PanelRow;

/// Fill `ret_1d` as the simple return of `adj_close` over the previous row.
///
/// Undefined on the first row, when either value is missing, and when the
/// previous value is zero.
pub fn add_returns(rows: &mut [PanelRow]) {
    let mut prev: Option<f64> = None;
    for row in rows.iter_mut() {
        row.ret_1d = match (prev, row.adj_close) {
            (Some(p), Some(c)) if p != 0.0 => Some((c - p) / p),
            _ => None,
        };
        prev = row.adj_close;
    }
}
