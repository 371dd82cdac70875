//! Raw bars → adjusted, aligned, featured panel.

pub mod adjust;
pub mod align;
pub mod calendar;
pub mod features;
pub mod sessions;

pub use adjust::{adjust, AdjustmentError, BadFactorPolicy};
pub use align::{align, fill_gaps, forward_fill};
pub use calendar::{build_calendar, AlignmentError, CalendarPolicy};
pub use features::add_returns;
pub use sessions::{session_calendar, SessionCalendar, UsEquitySessions};
