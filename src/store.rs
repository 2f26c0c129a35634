// External interfaces the core consumes: event log, schedule store, summary
// store. The in-memory implementations back the binary and every test; a
// database-backed deployment swaps these behind the same traits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::model::{ClockEvent, DailySummary, EmployeeId, EventId, NewClockEvent, Schedule};
use crate::timeutil::local_date;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append(&self, event: NewClockEvent) -> StoreResult<ClockEvent>;
    /// All events whose working date (local zone) equals `date`, ordered by
    /// `event_time`.
    async fn list_for_date(
        &self,
        employee_id: &str,
        date: NaiveDate,
        tz: Tz,
    ) -> StoreResult<Vec<ClockEvent>>;
    /// Events in the half-open instant window [from, to), ordered by
    /// `event_time`. Used for night-shift attribution across midnight.
    async fn list_between(
        &self,
        employee_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<ClockEvent>>;
    async fn last_event(&self, employee_id: &str) -> StoreResult<Option<ClockEvent>>;
    async fn get(&self, id: EventId) -> StoreResult<Option<ClockEvent>>;
    async fn delete(&self, id: EventId) -> StoreResult<Option<ClockEvent>>;
    async fn update_time(
        &self,
        id: EventId,
        new_event_time: DateTime<Utc>,
        corrected_by: Option<String>,
    ) -> StoreResult<Option<ClockEvent>>;
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn get(&self, employee_id: &str, date: NaiveDate) -> StoreResult<Option<Schedule>>;
    async fn upsert(&self, schedule: Schedule) -> StoreResult<()>;
    async fn delete(&self, employee_id: &str, date: NaiveDate) -> StoreResult<Option<Schedule>>;
}

#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn upsert(&self, summary: DailySummary) -> StoreResult<()>;
    async fn read(&self, employee_id: &str, date: NaiveDate) -> StoreResult<Option<DailySummary>>;
    async fn read_range(
        &self,
        employee_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<DailySummary>>;
}

// --- In-memory implementations ---

#[derive(Default)]
pub struct InMemoryEventLog {
    next_id: AtomicU64,
    events: Mutex<Vec<ClockEvent>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            events: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, event: NewClockEvent) -> StoreResult<ClockEvent> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = ClockEvent {
            id,
            employee_id: event.employee_id,
            kind: event.kind,
            event_time: event.event_time,
            recorded_at: event.recorded_at,
            coords: event.coords,
            corrected_by: None,
            notes: event.notes,
        };
        debug!(id, employee_id = %stored.employee_id, kind = ?stored.kind,
               event_time = %stored.event_time, "appended clock event");
        self.events.lock().await.push(stored.clone());
        Ok(stored)
    }

    async fn list_for_date(
        &self,
        employee_id: &str,
        date: NaiveDate,
        tz: Tz,
    ) -> StoreResult<Vec<ClockEvent>> {
        let mut out: Vec<ClockEvent> = self
            .events
            .lock()
            .await
            .iter()
            .filter(|e| e.employee_id == employee_id && local_date(e.event_time, tz) == date)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.event_time);
        Ok(out)
    }

    async fn list_between(
        &self,
        employee_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<ClockEvent>> {
        let mut out: Vec<ClockEvent> = self
            .events
            .lock()
            .await
            .iter()
            .filter(|e| e.employee_id == employee_id && e.event_time >= from && e.event_time < to)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.event_time);
        Ok(out)
    }

    async fn last_event(&self, employee_id: &str) -> StoreResult<Option<ClockEvent>> {
        Ok(self
            .events
            .lock()
            .await
            .iter()
            .filter(|e| e.employee_id == employee_id)
            .max_by_key(|e| e.event_time)
            .cloned())
    }

    async fn get(&self, id: EventId) -> StoreResult<Option<ClockEvent>> {
        Ok(self.events.lock().await.iter().find(|e| e.id == id).cloned())
    }

    async fn delete(&self, id: EventId) -> StoreResult<Option<ClockEvent>> {
        let mut events = self.events.lock().await;
        let pos = events.iter().position(|e| e.id == id);
        Ok(pos.map(|i| events.remove(i)))
    }

    async fn update_time(
        &self,
        id: EventId,
        new_event_time: DateTime<Utc>,
        corrected_by: Option<String>,
    ) -> StoreResult<Option<ClockEvent>> {
        let mut events = self.events.lock().await;
        if let Some(event) = events.iter_mut().find(|e| e.id == id) {
            event.event_time = new_event_time;
            event.corrected_by = corrected_by;
            Ok(Some(event.clone()))
        } else {
            Ok(None)
        }
    }
}

#[derive(Default)]
pub struct InMemoryScheduleStore {
    schedules: Mutex<HashMap<(EmployeeId, NaiveDate), Schedule>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn get(&self, employee_id: &str, date: NaiveDate) -> StoreResult<Option<Schedule>> {
        Ok(self
            .schedules
            .lock()
            .await
            .get(&(employee_id.to_string(), date))
            .cloned())
    }

    async fn upsert(&self, schedule: Schedule) -> StoreResult<()> {
        let schedule = schedule.normalized();
        debug!(employee_id = %schedule.employee_id, date = %schedule.date,
               night = schedule.is_night_shift, "upserting schedule");
        self.schedules
            .lock()
            .await
            .insert((schedule.employee_id.clone(), schedule.date), schedule);
        Ok(())
    }

    async fn delete(&self, employee_id: &str, date: NaiveDate) -> StoreResult<Option<Schedule>> {
        Ok(self
            .schedules
            .lock()
            .await
            .remove(&(employee_id.to_string(), date)))
    }
}

#[derive(Default)]
pub struct InMemorySummaryStore {
    summaries: Mutex<HashMap<(EmployeeId, NaiveDate), DailySummary>>,
}

impl InMemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SummaryStore for InMemorySummaryStore {
    async fn upsert(&self, summary: DailySummary) -> StoreResult<()> {
        self.summaries
            .lock()
            .await
            .insert((summary.employee_id.clone(), summary.date), summary);
        Ok(())
    }

    async fn read(&self, employee_id: &str, date: NaiveDate) -> StoreResult<Option<DailySummary>> {
        Ok(self
            .summaries
            .lock()
            .await
            .get(&(employee_id.to_string(), date))
            .cloned())
    }

    async fn read_range(
        &self,
        employee_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<DailySummary>> {
        let mut out: Vec<DailySummary> = self
            .summaries
            .lock()
            .await
            .values()
            .filter(|s| s.employee_id == employee_id && s.date >= start && s.date <= end)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.date);
        Ok(out)
    }
}

/// Bundle of the three stores, shared by the gate, orchestrator, and
/// aggregator.
#[derive(Clone)]
pub struct Stores {
    pub events: Arc<dyn EventLog>,
    pub schedules: Arc<dyn ScheduleStore>,
    pub summaries: Arc<dyn SummaryStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            events: Arc::new(InMemoryEventLog::new()),
            schedules: Arc::new(InMemoryScheduleStore::new()),
            summaries: Arc::new(InMemorySummaryStore::new()),
        }
    }
}
