// Pure time arithmetic. Everything here is zone-explicit: callers pass the
// configured wall-clock zone and get UTC instants back. No I/O, no globals.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

/// Resolves a wall-clock (date, time-of-day) pair to a UTC instant.
///
/// DST folds take the earlier instant; for spring-forward gaps the time is
/// pushed past the gap to the first valid wall-clock hour.
pub fn combine(date: NaiveDate, tod: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(tod);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = naive + Duration::hours(1);
            match tz.from_local_datetime(&shifted).earliest() {
                Some(dt) => dt.with_timezone(&Utc),
                // Unreachable for real zones; fall back to reading the wall
                // clock as UTC rather than panicking.
                None => Utc.from_utc_datetime(&naive),
            }
        }
    }
}

pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

pub fn local_time(instant: DateTime<Utc>, tz: Tz) -> NaiveTime {
    instant.with_timezone(&tz).time()
}

/// Signed minute span from `a` to `b`. Negative when `b < a`; callers clamp
/// or normalize midnight crossings themselves.
pub fn span_minutes(a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
    (b - a).num_minutes()
}

/// Resolves a scheduled shift on `date` to absolute (start, end), advancing
/// the end by 24 h iff the shift crosses midnight (`end < start` on the wall
/// clock).
pub fn cross_midnight(
    date: NaiveDate,
    sched_in: NaiveTime,
    sched_out: NaiveTime,
    tz: Tz,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = combine(date, sched_in, tz);
    let mut end = combine(date, sched_out, tz);
    if sched_out < sched_in {
        end += Duration::hours(24);
    }
    (start, end)
}

/// Overlap of two half-open intervals [start, end). `None` when they do not
/// intersect.
pub fn clip_interval(
    interval: (DateTime<Utc>, DateTime<Utc>),
    bounds: (DateTime<Utc>, DateTime<Utc>),
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = interval.0.max(bounds.0);
    let end = interval.1.min(bounds.1);
    if start < end {
        Some((start, end))
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundMode {
    /// Snap forward to the boundary when the actual time is before it.
    UpIfBefore,
    /// Snap back to the boundary when the actual time is after it.
    DownIfAfter,
}

/// The abuse-prevention primitive: rounds an actual instant toward a
/// scheduled boundary.
pub fn round_to_boundary(
    actual: DateTime<Utc>,
    bound: DateTime<Utc>,
    mode: RoundMode,
) -> DateTime<Utc> {
    match mode {
        RoundMode::UpIfBefore if actual < bound => bound,
        RoundMode::DownIfAfter if actual > bound => bound,
        _ => actual,
    }
}

/// Minutes to hours at two decimals, half away from zero. All hour-valued
/// outputs go through here so rounding stays in one place.
pub fn minutes_to_hours(minutes: i64) -> Decimal {
    (Decimal::from(minutes) / dec!(60))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Decimal hours to whole minutes (policy fields are expressed in hours).
pub fn hours_to_minutes(hours: Decimal) -> i64 {
    (hours * dec!(60))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

pub fn round_hours(hours: Decimal) -> Decimal {
    hours.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
