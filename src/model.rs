// Core attendance entities shared across the gate, engine, and report layers.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type EmployeeId = String;
pub type EventId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Append-only clock event. `event_time` is the canonical instant used in all
/// computations; `recorded_at` exists for auditing only and never enters the
/// math.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockEvent {
    pub id: EventId,
    pub employee_id: EmployeeId,
    pub kind: EventKind,
    pub event_time: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
    pub coords: Option<GeoPoint>,
    pub corrected_by: Option<String>,
    pub notes: Option<String>,
}

/// Event payload before the log assigns an id.
#[derive(Debug, Clone)]
pub struct NewClockEvent {
    pub employee_id: EmployeeId,
    pub kind: EventKind,
    pub event_time: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
    pub coords: Option<GeoPoint>,
    pub notes: Option<String>,
}

/// A shift assignment for one (employee, date). Either side may be missing
/// while scheduling flows are mid-edit; the gate surfaces that as an
/// incomplete schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
    pub scheduled_in: Option<NaiveTime>,
    pub scheduled_out: Option<NaiveTime>,
    pub is_night_shift: bool,
}

impl Schedule {
    pub fn new(
        employee_id: impl Into<EmployeeId>,
        date: NaiveDate,
        scheduled_in: NaiveTime,
        scheduled_out: NaiveTime,
    ) -> Self {
        Self {
            employee_id: employee_id.into(),
            date,
            scheduled_in: Some(scheduled_in),
            scheduled_out: Some(scheduled_out),
            is_night_shift: scheduled_out < scheduled_in,
        }
    }

    /// Both sides present. Re-derives the night flag from the times so the
    /// `is_night_shift ⇔ scheduled_out < scheduled_in` invariant holds even
    /// for rows written by older scheduling flows.
    pub fn shift(&self) -> Option<Shift> {
        match (self.scheduled_in, self.scheduled_out) {
            (Some(start), Some(end)) => Some(Shift { start, end }),
            _ => None,
        }
    }

    /// Normalizes the night flag against the stored times.
    pub fn normalized(mut self) -> Self {
        if let Some(shift) = self.shift() {
            self.is_night_shift = shift.is_night();
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shift {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Shift {
    pub fn is_night(&self) -> bool {
        self.end < self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Present,
    Late,
    Undertime,
    Overtime,
    HalfDay,
    Absent,
    NotScheduled,
    Weekend,
    Holiday,
    Leave,
    Incomplete,
    ShiftVoid,
    Scheduled,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Present => "PRESENT",
            Status::Late => "LATE",
            Status::Undertime => "UNDERTIME",
            Status::Overtime => "OVERTIME",
            Status::HalfDay => "HALF_DAY",
            Status::Absent => "ABSENT",
            Status::NotScheduled => "NOT_SCHEDULED",
            Status::Weekend => "WEEKEND",
            Status::Holiday => "HOLIDAY",
            Status::Leave => "LEAVE",
            Status::Incomplete => "INCOMPLETE",
            Status::ShiftVoid => "SHIFT_VOID",
            Status::Scheduled => "SCHEDULED",
        }
    }

    /// Statuses that count toward `days_worked` in period totals.
    pub fn is_worked(&self) -> bool {
        matches!(
            self,
            Status::Present
                | Status::Late
                | Status::Undertime
                | Status::Overtime
                | Status::HalfDay
        )
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived attendance row for one (employee, date). This is a cache of its
/// inputs at `calculated_at`, not ground truth; any input change must
/// invalidate it through recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub employee_id: EmployeeId,
    pub date: NaiveDate,

    pub actual_in: Option<NaiveTime>,
    pub actual_out: Option<NaiveTime>,
    pub scheduled_in: Option<NaiveTime>,
    pub scheduled_out: Option<NaiveTime>,
    pub in_event_id: Option<EventId>,
    pub out_event_id: Option<EventId>,

    pub status: Status,
    pub billed_hours: Decimal,
    pub late_minutes: i64,
    pub undertime_minutes: i64,
    pub night_diff_hours: Decimal,
    pub overtime_hours: Decimal,

    pub is_weekend: bool,
    pub is_holiday: bool,
    pub calculated_at: DateTime<Utc>,
}

impl DailySummary {
    /// Value identity: everything except the advisory `calculated_at` stamp.
    pub fn value_eq(&self, other: &DailySummary) -> bool {
        let a = DailySummary {
            calculated_at: other.calculated_at,
            ..self.clone()
        };
        a == *other
    }

    pub fn zero_metrics(&mut self) {
        self.billed_hours = Decimal::ZERO;
        self.late_minutes = 0;
        self.undertime_minutes = 0;
        self.night_diff_hours = Decimal::ZERO;
        self.overtime_hours = Decimal::ZERO;
    }
}
