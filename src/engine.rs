// Daily computation engine: derives one DailySummary from the day's clock
// events, the scheduled shift, and the resolved policy. Pure and total; bad
// input combinations classify as NOT_SCHEDULED / INCOMPLETE instead of
// failing.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use tracing::debug;

use crate::model::{ClockEvent, DailySummary, EventKind, Schedule, Shift, Status};
use crate::policy::PolicySnapshot;
use crate::status::{self, DayContext};
use crate::timeutil::{
    clip_interval, combine, cross_midnight, hours_to_minutes, local_time, minutes_to_hours,
    round_hours, round_to_boundary, span_minutes, RoundMode,
};

/// Early arrivals within this window round forward to the scheduled start.
pub const EARLY_ROUND_WINDOW_MINUTES: i64 = 60;
/// Late departures within this window round back to the scheduled end;
/// beyond it the actual time is kept (emergency overrun).
pub const LATE_ROUND_WINDOW_MINUTES: i64 = 120;

/// Everything the engine needs for one (employee, date). Events must already
/// be attributed to `date` by the caller; for night shifts that includes the
/// OUT landing on the next calendar day.
#[derive(Debug, Clone)]
pub struct DayInput<'a> {
    pub employee_id: &'a str,
    pub date: NaiveDate,
    pub events: &'a [ClockEvent],
    pub schedule: Option<&'a Schedule>,
    pub policy: &'a PolicySnapshot,
    pub today: NaiveDate,
    pub is_holiday: bool,
    pub on_leave: bool,
    pub tz: Tz,
}

pub fn compute_daily_summary(input: &DayInput<'_>) -> DailySummary {
    let shift = input.schedule.and_then(Schedule::shift);
    let selection = select_events(input.events, input.tz);

    let mut summary = DailySummary {
        employee_id: input.employee_id.to_string(),
        date: input.date,
        actual_in: selection.in_time,
        actual_out: selection.out_time,
        scheduled_in: shift.map(|s| s.start),
        scheduled_out: shift.map(|s| s.end),
        in_event_id: selection.in_event_id,
        out_event_id: selection.out_event_id,
        status: Status::NotScheduled,
        billed_hours: Decimal::ZERO,
        late_minutes: 0,
        undertime_minutes: 0,
        night_diff_hours: Decimal::ZERO,
        overtime_hours: Decimal::ZERO,
        is_weekend: is_weekend(input.date),
        is_holiday: input.is_holiday,
        calculated_at: Utc::now(),
    };

    let mut raw_span = None;
    let mut shift_void = false;

    if let (Some(in_tod), Some(out_tod)) = (selection.in_time, selection.out_time) {
        let actual_start = combine(input.date, in_tod, input.tz);
        let mut actual_end = combine(input.date, out_tod, input.tz);
        if actual_end < actual_start {
            actual_end += Duration::hours(24);
        }
        raw_span = Some(span_minutes(actual_start, actual_end));

        let sched_span = shift.map(|s| cross_midnight(input.date, s.start, s.end, input.tz));
        shift_void = matches!(sched_span, Some((sched_start, _)) if actual_end <= sched_start);

        let (eff_start, eff_end) =
            effective_interval(actual_start, actual_end, shift, sched_span);

        let mut worked = span_minutes(eff_start, eff_end).max(0);
        if worked >= input.policy.break_session_threshold_minutes {
            worked = (worked - hours_to_minutes(input.policy.flexible_break_hours)).max(0);
        }
        summary.billed_hours = minutes_to_hours(worked);

        if let Some((sched_start, sched_end)) = sched_span {
            let raw_late = span_minutes(sched_start, actual_start).max(0);
            summary.late_minutes = if raw_late <= input.policy.grace_period_minutes {
                0
            } else {
                raw_late - input.policy.grace_period_minutes
            };

            let sched_duration = span_minutes(sched_start, sched_end);
            let sched_work = if sched_duration >= input.policy.break_session_threshold_minutes {
                sched_duration - hours_to_minutes(input.policy.flexible_break_hours)
            } else {
                sched_duration
            };
            summary.undertime_minutes = (sched_work - worked).max(0);
        } else {
            summary.undertime_minutes =
                (hours_to_minutes(input.policy.daily_work_hours) - worked).max(0);
        }

        summary.overtime_hours = round_hours(
            (summary.billed_hours - input.policy.overtime_threshold_hours).max(Decimal::ZERO),
        );

        summary.night_diff_hours = night_differential(
            input,
            actual_start,
            actual_end,
            sched_span.map(|(_, end)| end),
        );

        debug!(
            employee_id = input.employee_id,
            date = %input.date,
            billed_hours = %summary.billed_hours,
            late_minutes = summary.late_minutes,
            undertime_minutes = summary.undertime_minutes,
            night_diff_hours = %summary.night_diff_hours,
            overtime_hours = %summary.overtime_hours,
            "computed daily metrics"
        );
    }

    let ctx = DayContext {
        date: input.date,
        today: input.today,
        has_schedule: shift.is_some(),
        is_weekend: summary.is_weekend,
        is_holiday: input.is_holiday,
        on_leave: input.on_leave,
        raw_span_minutes: raw_span,
        shift_void,
    };
    status::classify(&ctx, &mut summary);

    summary
}

struct EventSelection {
    in_time: Option<chrono::NaiveTime>,
    out_time: Option<chrono::NaiveTime>,
    in_event_id: Option<u64>,
    out_event_id: Option<u64>,
}

/// Earliest IN and latest OUT for the day. An OUT with no IN is not
/// attributed to the day at all; an IN with no OUT leaves the out side open.
fn select_events(events: &[ClockEvent], tz: Tz) -> EventSelection {
    let earliest_in = events
        .iter()
        .filter(|e| e.kind == EventKind::In)
        .min_by_key(|e| e.event_time);
    let latest_out = events
        .iter()
        .filter(|e| e.kind == EventKind::Out)
        .max_by_key(|e| e.event_time);

    match (earliest_in, latest_out) {
        (Some(i), out) => EventSelection {
            in_time: Some(local_time(i.event_time, tz)),
            out_time: out.map(|o| local_time(o.event_time, tz)),
            in_event_id: Some(i.id),
            out_event_id: out.map(|o| o.id),
        },
        (None, _) => EventSelection {
            in_time: None,
            out_time: None,
            in_event_id: None,
            out_event_id: None,
        },
    }
}

/// Applies the abuse-prevention clamps to the actual interval.
///
/// Dayshift: early arrivals inside the 60-minute window round forward to the
/// scheduled start, and late departures inside the 120-minute window round
/// back to the scheduled end; outside either window the actual time is kept.
/// Nightshift: both ends clamp to the scheduled interval. No schedule: the
/// actual interval stands.
fn effective_interval(
    actual_start: DateTime<Utc>,
    actual_end: DateTime<Utc>,
    shift: Option<Shift>,
    sched_span: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let (shift, (sched_start, sched_end)) = match (shift, sched_span) {
        (Some(s), Some(span)) => (s, span),
        _ => return (actual_start, actual_end),
    };

    if shift.is_night() {
        return (actual_start.max(sched_start), actual_end.min(sched_end));
    }

    let eff_start = if actual_start < sched_start
        && span_minutes(actual_start, sched_start) <= EARLY_ROUND_WINDOW_MINUTES
    {
        round_to_boundary(actual_start, sched_start, RoundMode::UpIfBefore)
    } else {
        actual_start
    };

    let eff_end = if actual_end > sched_end
        && span_minutes(sched_end, actual_end) <= LATE_ROUND_WINDOW_MINUTES
    {
        round_to_boundary(actual_end, sched_end, RoundMode::DownIfAfter)
    } else {
        actual_end
    };

    (eff_start, eff_end)
}

/// Night differential from the unrounded actual interval (the abuse clamps
/// do not apply here), with the end clipped to the scheduled end when a
/// schedule exists. Overlap with the 22:00→06:00 band, minus the fixed break
/// deduction, floored at zero.
fn night_differential(
    input: &DayInput<'_>,
    actual_start: DateTime<Utc>,
    actual_end: DateTime<Utc>,
    sched_end: Option<DateTime<Utc>>,
) -> Decimal {
    let nd_end = match sched_end {
        Some(end) => actual_end.min(end),
        None => actual_end,
    };

    let band_start = combine(input.date, input.policy.nd_band_start, input.tz);
    let mut band_end = combine(input.date, input.policy.nd_band_end, input.tz);
    if input.policy.nd_band_end <= input.policy.nd_band_start {
        band_end += Duration::hours(24);
    }

    let overlap = clip_interval((actual_start, nd_end), (band_start, band_end))
        .map(|(s, e)| span_minutes(s, e))
        .unwrap_or(0);

    round_hours(
        (minutes_to_hours(overlap) - input.policy.nd_break_deduction_hours).max(Decimal::ZERO),
    )
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
