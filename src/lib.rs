//! Daily time record engine.
//!
//! Derives canonical attendance metrics for each (employee, date) from raw
//! clock events, an optional scheduled shift, and per-employee policy:
//! billed hours with abuse-prevention rounding, late/undertime minutes under
//! a grace period, overtime, and the night-differential band. A gate
//! validates clock-in/out proposals (including the cross-midnight night
//! shift window), an orchestrator keeps derived summaries consistent with
//! the event log and schedules, and a period aggregator rolls daily rows
//! into reports.

pub mod clock;
pub mod config;
pub mod engine;
pub mod gate;
pub mod model;
pub mod orchestrator;
pub mod policy;
pub mod registry;
pub mod report;
pub mod service;
pub mod status;
pub mod store;
pub mod timeutil;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use engine::{compute_daily_summary, DayInput};
pub use gate::{AllowAllGeofence, GateError, GeofenceValidator};
pub use model::{
    ClockEvent, DailySummary, EmployeeId, EventId, EventKind, GeoPoint, Schedule, Status,
};
pub use policy::{Employee, PolicyDefaults, PolicySnapshot};
pub use registry::EmployeeRegistry;
pub use report::{PeriodReport, TimeStyle};
pub use service::{AttendanceService, ServiceError};
pub use store::{EventLog, ScheduleStore, Stores, SummaryStore};

#[cfg(test)]
mod engine_tests;
