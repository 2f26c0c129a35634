// Clock-in/clock-out gate. Validates a proposed event against the schedule,
// the employee's last event, and the early/late windows, in a fixed order.
// Nothing here persists; the service appends the event only after the gate
// passes.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{EventKind, GeoPoint, Schedule};
use crate::policy::PolicySnapshot;
use crate::store::{EventLog, ScheduleStore, StoreError};
use crate::timeutil::{cross_midnight, hours_to_minutes, local_date};

/// Hours past a night shift's scheduled end during which the cross-midnight
/// clock-out is still accepted.
pub const NIGHT_OUT_GRACE_HOURS: i64 = 4;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GateError {
    #[error("no schedule found for {employee_id} on {date}")]
    NoSchedule {
        employee_id: String,
        date: NaiveDate,
    },
    #[error("schedule for {employee_id} on {date} is missing a time-in or time-out")]
    IncompleteSchedule {
        employee_id: String,
        date: NaiveDate,
    },
    #[error("an open clock-in already exists; clock out first")]
    AlreadyClockedIn,
    #[error("no open clock-in session to close")]
    NoOpenSession,
    #[error("too early to clock in; earliest allowed at {earliest_allowed_at}")]
    TooEarly { earliest_allowed_at: DateTime<Utc> },
    #[error("night shift clock-out window expired at {expired_at}")]
    TimeoutExpired { expired_at: DateTime<Utc> },
    #[error("outside the allowed area: {distance_m:.1} m away, allowed {allowed_m:.1} m")]
    OutOfGeofence { distance_m: f64, allowed_m: f64 },
    #[error("store unavailable: {detail}")]
    StoreUnavailable { detail: String },
    #[error("clock validation exceeded its deadline")]
    Timeout,
}

impl GateError {
    /// Stable machine code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            GateError::NoSchedule { .. } => "NO_SCHEDULE",
            GateError::IncompleteSchedule { .. } => "INCOMPLETE_SCHEDULE",
            GateError::AlreadyClockedIn => "ALREADY_CLOCKED_IN",
            GateError::NoOpenSession => "NO_OPEN_SESSION",
            GateError::TooEarly { .. } => "TOO_EARLY",
            GateError::TimeoutExpired { .. } => "TIMEOUT_EXPIRED",
            GateError::OutOfGeofence { .. } => "OUT_OF_GEOFENCE",
            GateError::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            GateError::Timeout => "TIMEOUT",
        }
    }
}

impl From<StoreError> for GateError {
    fn from(err: StoreError) -> Self {
        GateError::StoreUnavailable {
            detail: err.to_string(),
        }
    }
}

/// Distance check against the worksite. The implementation is injected; when
/// a request carries no coordinates the gate bypasses the check entirely.
pub trait GeofenceValidator: Send + Sync {
    fn validate(&self, employee_id: &str, point: &GeoPoint) -> Result<(), GateError>;
}

/// Default validator that accepts every coordinate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllGeofence;

impl GeofenceValidator for AllowAllGeofence {
    fn validate(&self, _employee_id: &str, _point: &GeoPoint) -> Result<(), GateError> {
        Ok(())
    }
}

/// The schedule that governs an accepted event. For a night-shift fallback
/// clock-out this is yesterday's schedule.
#[derive(Debug, Clone)]
pub struct GoverningShift {
    pub schedule: Schedule,
    pub sched_start: DateTime<Utc>,
    pub sched_end: DateTime<Utc>,
    /// True when the schedule belongs to the previous local date.
    pub from_previous_day: bool,
}

pub struct ClockGate {
    events: Arc<dyn EventLog>,
    schedules: Arc<dyn ScheduleStore>,
    geofence: Arc<dyn GeofenceValidator>,
    tz: Tz,
}

impl ClockGate {
    pub fn new(
        events: Arc<dyn EventLog>,
        schedules: Arc<dyn ScheduleStore>,
        geofence: Arc<dyn GeofenceValidator>,
        tz: Tz,
    ) -> Self {
        Self {
            events,
            schedules,
            geofence,
            tz,
        }
    }

    /// Runs the full validation sequence for a proposed event. Returns the
    /// governing shift on success so the caller can attribute the event.
    ///
    /// The schedule-presence step is unconditional: no employee flag (in
    /// particular not `require_schedule_compliance`) can switch it off.
    pub async fn check(
        &self,
        policy: &PolicySnapshot,
        kind: EventKind,
        now: DateTime<Utc>,
        coords: Option<&GeoPoint>,
    ) -> Result<GoverningShift, GateError> {
        let employee_id = policy.employee_id.as_str();
        let today = local_date(now, self.tz);

        // 1. Schedule presence.
        let governing = self.resolve_governing_shift(employee_id, kind, today).await?;
        debug!(
            employee_id,
            %today,
            from_previous_day = governing.from_previous_day,
            "gate resolved governing schedule"
        );

        // 2. Paired-state check against the most recent event.
        let last = self.events.last_event(employee_id).await?;
        match kind {
            EventKind::In => {
                if matches!(&last, Some(e) if e.kind == EventKind::In) {
                    return Err(GateError::AlreadyClockedIn);
                }
            }
            EventKind::Out => {
                if !matches!(&last, Some(e) if e.kind == EventKind::In) {
                    return Err(GateError::NoOpenSession);
                }
            }
        }

        // 3. Early-arrival window (IN only). There is deliberately no
        // symmetric too-late-to-clock-in rejection.
        if kind == EventKind::In {
            let restriction =
                Duration::minutes(hours_to_minutes(policy.early_login_restriction_hours));
            let earliest = governing.sched_start - restriction;
            if now < earliest {
                warn!(employee_id, %earliest, "clock-in rejected: too early");
                return Err(GateError::TooEarly {
                    earliest_allowed_at: earliest,
                });
            }
        }

        // 4. Late-departure window, only for the cross-midnight fallback.
        // A same-day OUT has no upper bound.
        if kind == EventKind::Out && governing.from_previous_day {
            let expired_at = governing.sched_end + Duration::hours(NIGHT_OUT_GRACE_HOURS);
            if now > expired_at {
                warn!(employee_id, %expired_at, "clock-out rejected: night window expired");
                return Err(GateError::TimeoutExpired { expired_at });
            }
        }

        // 5. Geofence, bypassed when no coordinates were supplied.
        if let Some(point) = coords {
            self.geofence.validate(employee_id, point)?;
        }

        Ok(governing)
    }

    /// Today's complete schedule, or — for an OUT — yesterday's night shift
    /// still inside its clock-out window.
    async fn resolve_governing_shift(
        &self,
        employee_id: &str,
        kind: EventKind,
        today: NaiveDate,
    ) -> Result<GoverningShift, GateError> {
        let today_schedule = self.schedules.get(employee_id, today).await?;

        if let Some(schedule) = &today_schedule {
            if let Some(shift) = schedule.shift() {
                let (sched_start, sched_end) =
                    cross_midnight(today, shift.start, shift.end, self.tz);
                return Ok(GoverningShift {
                    schedule: schedule.clone(),
                    sched_start,
                    sched_end,
                    from_previous_day: false,
                });
            }
        }

        if kind == EventKind::Out {
            let yesterday = today.pred_opt().unwrap_or(today);
            if let Some(schedule) = self.schedules.get(employee_id, yesterday).await? {
                if let Some(shift) = schedule.shift() {
                    if shift.is_night() {
                        let (sched_start, sched_end) =
                            cross_midnight(yesterday, shift.start, shift.end, self.tz);
                        return Ok(GoverningShift {
                            schedule,
                            sched_start,
                            sched_end,
                            from_previous_day: true,
                        });
                    }
                }
            }
        }

        match today_schedule {
            Some(_) => Err(GateError::IncompleteSchedule {
                employee_id: employee_id.to_string(),
                date: today,
            }),
            None => Err(GateError::NoSchedule {
                employee_id: employee_id.to_string(),
                date: today,
            }),
        }
    }
}
