// Status classification. All status decisions and the void-zeroes-metrics
// rule live here so the invariant cannot drift across call sites.

use chrono::NaiveDate;

use crate::model::{DailySummary, Status};

/// Raw actual span below which a session is treated as an accidental double
/// tap rather than a worked shift.
pub const SHORT_SESSION_MINUTES: i64 = 15;

/// Day-level facts the classifier needs beyond the summary's numeric fields.
#[derive(Debug, Clone, Copy)]
pub struct DayContext {
    pub date: NaiveDate,
    pub today: NaiveDate,
    /// A complete schedule (both sides) exists for the date.
    pub has_schedule: bool,
    pub is_weekend: bool,
    pub is_holiday: bool,
    pub on_leave: bool,
    /// Minutes between the unrounded actual start and end, when both exist.
    pub raw_span_minutes: Option<i64>,
    /// Both clocks landed at or before the scheduled start.
    pub shift_void: bool,
}

/// Assigns the final status and enforces the zeroing invariant for voided
/// and suspiciously short sessions. Mutates the summary in place after the
/// numeric fields have been computed.
pub fn classify(ctx: &DayContext, summary: &mut DailySummary) {
    let has_events = summary.actual_in.is_some() || summary.actual_out.is_some();

    if ctx.is_weekend && !has_events && !ctx.has_schedule {
        summary.status = Status::Weekend;
        return;
    }
    if ctx.is_holiday && !has_events {
        summary.status = Status::Holiday;
        return;
    }
    if ctx.on_leave {
        summary.status = Status::Leave;
        return;
    }
    if ctx.date > ctx.today && !has_events {
        summary.status = if ctx.has_schedule {
            Status::Scheduled
        } else {
            Status::NotScheduled
        };
        return;
    }
    if !has_events {
        summary.status = if ctx.has_schedule {
            Status::Absent
        } else {
            Status::NotScheduled
        };
        return;
    }

    match (summary.actual_in, summary.actual_out) {
        (Some(_), None) => {
            summary.status = Status::Incomplete;
        }
        (Some(_), Some(_)) => {
            if ctx.raw_span_minutes.unwrap_or(0) < SHORT_SESSION_MINUTES {
                summary.status = Status::Incomplete;
                summary.zero_metrics();
            } else if ctx.shift_void {
                summary.status = Status::ShiftVoid;
                summary.zero_metrics();
            } else if summary.late_minutes > 0 {
                summary.status = Status::Late;
            } else if summary.undertime_minutes > 0 {
                summary.status = Status::Undertime;
            } else if summary.overtime_hours > rust_decimal::Decimal::ZERO {
                summary.status = Status::Overtime;
            } else {
                summary.status = Status::Present;
            }
        }
        // An OUT with no IN is dropped during event selection, so the engine
        // never reaches this arm with a bare OUT.
        (None, _) => {
            summary.status = if ctx.has_schedule {
                Status::Absent
            } else {
                Status::NotScheduled
            };
        }
    }
}
