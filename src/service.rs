// Composition root. Wires the stores, gate, orchestrator, and aggregator
// into the attendance service that owns the clock-in/out and report
// surfaces. Every write path persists first, then enqueues recomputation
// keys on the outbox.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::gate::{ClockGate, GateError, GeofenceValidator};
use crate::model::{ClockEvent, EventId, EventKind, GeoPoint, NewClockEvent, Schedule};
use crate::orchestrator::{Orchestrator, RecomputeKey, RetryPolicy};
use crate::registry::EmployeeRegistry;
use crate::report::{PeriodAggregator, PeriodReport, TimeStyle};
use crate::store::{StoreError, Stores};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("clock events still reference {date}; correct or delete them first")]
    ScheduleInUse { date: NaiveDate },
    #[error("event {0} not found")]
    EventNotFound(EventId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Recompute(#[from] crate::orchestrator::RecomputeError),
}

pub struct AttendanceService {
    stores: Stores,
    registry: EmployeeRegistry,
    clock: Arc<dyn Clock>,
    gate: ClockGate,
    orchestrator: Arc<Orchestrator>,
    aggregator: PeriodAggregator,
    tz: Tz,
    gate_deadline: StdDuration,
}

impl AttendanceService {
    pub fn new(
        stores: Stores,
        registry: EmployeeRegistry,
        clock: Arc<dyn Clock>,
        geofence: Arc<dyn GeofenceValidator>,
        tz: Tz,
        retry: RetryPolicy,
        gate_deadline: StdDuration,
    ) -> Self {
        let gate = ClockGate::new(
            stores.events.clone(),
            stores.schedules.clone(),
            geofence,
            tz,
        );
        let orchestrator = Arc::new(Orchestrator::new(
            stores.clone(),
            registry.clone(),
            clock.clone(),
            tz,
            retry,
        ));
        let aggregator = PeriodAggregator::new(stores.summaries.clone(), orchestrator.clone());
        Self {
            stores,
            registry,
            clock,
            gate,
            orchestrator,
            aggregator,
            tz,
            gate_deadline,
        }
    }

    pub fn registry(&self) -> &EmployeeRegistry {
        &self.registry
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        self.orchestrator.clone()
    }

    // --- Clock API ---

    pub async fn clock_in(
        &self,
        employee_id: &str,
        now: Option<DateTime<Utc>>,
        coords: Option<GeoPoint>,
        notes: Option<String>,
    ) -> Result<ClockEvent, GateError> {
        self.clock_event(employee_id, EventKind::In, now, coords, notes)
            .await
    }

    pub async fn clock_out(
        &self,
        employee_id: &str,
        now: Option<DateTime<Utc>>,
        coords: Option<GeoPoint>,
        notes: Option<String>,
    ) -> Result<ClockEvent, GateError> {
        self.clock_event(employee_id, EventKind::Out, now, coords, notes)
            .await
    }

    async fn clock_event(
        &self,
        employee_id: &str,
        kind: EventKind,
        now: Option<DateTime<Utc>>,
        coords: Option<GeoPoint>,
        notes: Option<String>,
    ) -> Result<ClockEvent, GateError> {
        let now = now.unwrap_or_else(|| self.clock.now());
        let policy = self.registry.snapshot(employee_id);

        // The whole validation runs under the request deadline; nothing is
        // persisted when it trips.
        let governing = match timeout(
            self.gate_deadline,
            self.gate.check(&policy, kind, now, coords.as_ref()),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(employee_id, ?kind, "gate validation exceeded deadline");
                return Err(GateError::Timeout);
            }
        };

        let event = self
            .stores
            .events
            .append(NewClockEvent {
                employee_id: employee_id.to_string(),
                kind,
                event_time: now,
                recorded_at: self.clock.now(),
                coords,
                notes,
            })
            .await?;
        info!(
            employee_id,
            ?kind,
            event_id = event.id,
            governing_date = %governing.schedule.date,
            "clock event accepted"
        );

        self.enqueue_for_event(employee_id, event.event_time).await?;
        Ok(event)
    }

    async fn enqueue_for_event(
        &self,
        employee_id: &str,
        event_time: DateTime<Utc>,
    ) -> Result<(), GateError> {
        let dates = self
            .orchestrator
            .affected_dates(employee_id, event_time)
            .await
            .map_err(|e| match e {
                crate::orchestrator::RecomputeError::Store(s) => GateError::from(s),
            })?;
        for date in dates {
            self.orchestrator
                .outbox
                .push(RecomputeKey::new(employee_id, date));
        }
        Ok(())
    }

    // --- Event corrections (audit trail preserved) ---

    pub async fn correct_event(
        &self,
        event_id: EventId,
        new_event_time: DateTime<Utc>,
        corrected_by: impl Into<String>,
    ) -> Result<ClockEvent, ServiceError> {
        let existing = self
            .stores
            .events
            .get(event_id)
            .await?
            .ok_or(ServiceError::EventNotFound(event_id))?;
        let old_time = existing.event_time;

        let updated = self
            .stores
            .events
            .update_time(event_id, new_event_time, Some(corrected_by.into()))
            .await?
            .ok_or(ServiceError::EventNotFound(event_id))?;
        info!(event_id, %old_time, %new_event_time, "clock event corrected");

        // Both the old and new working dates need fresh summaries.
        for time in [old_time, new_event_time] {
            for date in self
                .orchestrator
                .affected_dates(&updated.employee_id, time)
                .await?
            {
                self.orchestrator
                    .outbox
                    .push(RecomputeKey::new(&updated.employee_id, date));
            }
        }
        Ok(updated)
    }

    pub async fn delete_event(&self, event_id: EventId) -> Result<ClockEvent, ServiceError> {
        let removed = self
            .stores
            .events
            .delete(event_id)
            .await?
            .ok_or(ServiceError::EventNotFound(event_id))?;
        info!(event_id, employee_id = %removed.employee_id, "clock event deleted");

        for date in self
            .orchestrator
            .affected_dates(&removed.employee_id, removed.event_time)
            .await?
        {
            self.orchestrator
                .outbox
                .push(RecomputeKey::new(&removed.employee_id, date));
        }
        Ok(removed)
    }

    // --- Schedule mutations ---

    pub async fn upsert_schedule(&self, schedule: Schedule) -> Result<(), ServiceError> {
        let schedule = schedule.normalized();
        let employee_id = schedule.employee_id.clone();
        let date = schedule.date;

        // The next day's summary ownership shifts when a night schedule
        // appears or disappears, so recompute it alongside the date itself.
        let previous = self.stores.schedules.get(&employee_id, date).await?;
        let touches_next_day = schedule.is_night_shift
            || previous.map(|p| p.is_night_shift).unwrap_or(false);

        self.stores.schedules.upsert(schedule).await?;

        self.orchestrator
            .outbox
            .push(RecomputeKey::new(&employee_id, date));
        if touches_next_day {
            if let Some(next) = date.succ_opt() {
                self.orchestrator
                    .outbox
                    .push(RecomputeKey::new(&employee_id, next));
            }
        }
        Ok(())
    }

    /// Deletes a schedule; refused while clock events still reference the
    /// date (the night-shift attribution rule included).
    pub async fn delete_schedule(
        &self,
        employee_id: &str,
        date: NaiveDate,
    ) -> Result<(), ServiceError> {
        if self.orchestrator.date_has_events(employee_id, date).await? {
            return Err(ServiceError::ScheduleInUse { date });
        }
        let removed = self.stores.schedules.delete(employee_id, date).await?;
        if let Some(schedule) = removed {
            info!(employee_id, %date, "schedule deleted");
            self.orchestrator
                .outbox
                .push(RecomputeKey::new(employee_id, date));
            if schedule.is_night_shift {
                if let Some(next) = date.succ_opt() {
                    self.orchestrator
                        .outbox
                        .push(RecomputeKey::new(employee_id, next));
                }
            }
        }
        Ok(())
    }

    // --- Report API ---

    pub async fn report(
        &self,
        employee_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        style: TimeStyle,
    ) -> Result<PeriodReport, ServiceError> {
        Ok(self.aggregator.report(employee_id, start, end, style).await?)
    }

    // --- Convergence ---

    /// Recomputes every date in the window for one employee. The periodic
    /// sweep converges summaries whose recompute notification was lost.
    pub async fn sweep(&self, employee_id: &str, start: NaiveDate, end: NaiveDate) {
        let mut date = start;
        while date <= end {
            self.orchestrator
                .recompute_with_retry(&RecomputeKey::new(employee_id, date))
                .await;
            let Some(next) = date.succ_opt() else { break };
            date = next;
        }
    }

    /// Processes all pending outbox keys inline. Tests and the binary's
    /// worker loop both converge through the orchestrator's drain.
    pub async fn drain_outbox(&self) {
        self.orchestrator.drain_outbox().await;
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }
}
