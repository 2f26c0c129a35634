// Policy resolution: per-employee overrides merged with system defaults into
// an immutable snapshot taken once per top-level call.

use chrono::NaiveTime;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::model::EmployeeId;

/// Night-differential band boundaries are fixed by labor policy, not
/// per-employee configuration.
pub const ND_BAND_START_HOUR: u32 = 22;
pub const ND_BAND_END_HOUR: u32 = 6;

static ND_BAND_START: Lazy<NaiveTime> = Lazy::new(|| {
    NaiveTime::from_hms_opt(ND_BAND_START_HOUR, 0, 0).expect("22:00 is a valid time")
});
static ND_BAND_END: Lazy<NaiveTime> = Lazy::new(|| {
    NaiveTime::from_hms_opt(ND_BAND_END_HOUR, 0, 0).expect("06:00 is a valid time")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub employee_id: EmployeeId,
    pub name: String,
    pub daily_work_hours: Option<Decimal>,
    pub overtime_threshold_hours: Option<Decimal>,
    pub flexible_break_hours: Option<Decimal>,
    pub grace_period_minutes: Option<i64>,
    pub early_login_restriction_hours: Option<Decimal>,
    pub break_session_threshold_minutes: Option<i64>,
    /// Recorded for reporting only. The clock gate never consults it.
    pub require_schedule_compliance: bool,
}

impl Employee {
    pub fn new(employee_id: impl Into<EmployeeId>, name: impl Into<String>) -> Self {
        Self {
            employee_id: employee_id.into(),
            name: name.into(),
            daily_work_hours: None,
            overtime_threshold_hours: None,
            flexible_break_hours: None,
            grace_period_minutes: None,
            early_login_restriction_hours: None,
            break_session_threshold_minutes: None,
            require_schedule_compliance: false,
        }
    }
}

/// System-wide fallback values applied when an employee row leaves a policy
/// field unset.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDefaults {
    pub daily_work_hours: Decimal,
    pub overtime_threshold_hours: Decimal,
    pub flexible_break_hours: Decimal,
    pub grace_period_minutes: i64,
    pub early_login_restriction_hours: Decimal,
    pub break_session_threshold_minutes: i64,
}

impl Default for PolicyDefaults {
    fn default() -> Self {
        Self {
            daily_work_hours: dec!(8.00),
            overtime_threshold_hours: dec!(8.00),
            flexible_break_hours: dec!(1.00),
            grace_period_minutes: 5,
            early_login_restriction_hours: dec!(1.00),
            break_session_threshold_minutes: 240,
        }
    }
}

/// Fully-resolved policy for one engine or gate invocation. Immutable by
/// construction; callers thread the same snapshot through the whole call so
/// mid-computation employee edits cannot skew a single day's math.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicySnapshot {
    pub employee_id: EmployeeId,
    pub daily_work_hours: Decimal,
    pub overtime_threshold_hours: Decimal,
    pub flexible_break_hours: Decimal,
    pub grace_period_minutes: i64,
    pub early_login_restriction_hours: Decimal,
    pub break_session_threshold_minutes: i64,
    pub nd_band_start: NaiveTime,
    pub nd_band_end: NaiveTime,
    pub nd_break_deduction_hours: Decimal,
    pub require_schedule_compliance: bool,
}

impl PolicySnapshot {
    pub fn resolve(employee: &Employee, defaults: &PolicyDefaults) -> Self {
        Self {
            employee_id: employee.employee_id.clone(),
            daily_work_hours: employee.daily_work_hours.unwrap_or(defaults.daily_work_hours),
            overtime_threshold_hours: employee
                .overtime_threshold_hours
                .unwrap_or(defaults.overtime_threshold_hours),
            flexible_break_hours: employee
                .flexible_break_hours
                .unwrap_or(defaults.flexible_break_hours),
            grace_period_minutes: employee
                .grace_period_minutes
                .unwrap_or(defaults.grace_period_minutes),
            early_login_restriction_hours: employee
                .early_login_restriction_hours
                .unwrap_or(defaults.early_login_restriction_hours),
            break_session_threshold_minutes: employee
                .break_session_threshold_minutes
                .unwrap_or(defaults.break_session_threshold_minutes),
            nd_band_start: nd_band_start(),
            nd_band_end: nd_band_end(),
            nd_break_deduction_hours: dec!(1.00),
            require_schedule_compliance: employee.require_schedule_compliance,
        }
    }

    /// Snapshot of bare defaults, used when no employee row exists yet.
    pub fn from_defaults(employee_id: impl Into<EmployeeId>, defaults: &PolicyDefaults) -> Self {
        Self::resolve(&Employee::new(employee_id, ""), defaults)
    }
}

pub fn nd_band_start() -> NaiveTime {
    *ND_BAND_START
}

pub fn nd_band_end() -> NaiveTime {
    *ND_BAND_END
}
