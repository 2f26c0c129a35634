// Reactive recomputation of daily summaries. Every event or schedule
// mutation enqueues (employee, date) keys on the outbox; workers recompute
// under a per-key lock so concurrent firings for the same day serialize
// while different days proceed in parallel.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use rand::Rng;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::engine::{self, DayInput};
use crate::gate::NIGHT_OUT_GRACE_HOURS;
use crate::model::{ClockEvent, DailySummary, EmployeeId, EventKind, Schedule};
use crate::registry::EmployeeRegistry;
use crate::store::{StoreError, Stores};
use crate::timeutil::{combine, cross_midnight, local_date};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecomputeKey {
    pub employee_id: EmployeeId,
    pub date: NaiveDate,
}

impl RecomputeKey {
    pub fn new(employee_id: impl Into<EmployeeId>, date: NaiveDate) -> Self {
        Self {
            employee_id: employee_id.into(),
            date,
        }
    }
}

#[derive(Error, Debug)]
pub enum RecomputeError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Retry schedule for failed recomputations. The triggering clock event is
/// never rolled back; after the attempts are exhausted an alert is logged
/// and the sweep converges the summary later.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
        }
    }
}

/// Pending recomputation keys. Pushing a key after the triggering write has
/// been persisted gives the persist-then-notify ordering; a worker drains
/// the queue, and `drain` lets tests and the sweep process synchronously.
#[derive(Default)]
pub struct Outbox {
    queue: StdMutex<VecDeque<RecomputeKey>>,
    notify: Notify,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, key: RecomputeKey) {
        debug!(employee_id = %key.employee_id, date = %key.date, "outbox enqueue");
        self.queue
            .lock()
            .expect("outbox mutex poisoned")
            .push_back(key);
        self.notify.notify_one();
    }

    pub fn pop(&self) -> Option<RecomputeKey> {
        self.queue
            .lock()
            .expect("outbox mutex poisoned")
            .pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().expect("outbox mutex poisoned").is_empty()
    }

    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// One async mutex per (employee, date); recomputations for the same key
/// serialize, different keys run concurrently. Entries are evicted once the
/// map holds the only reference, so the table stays bounded by in-flight
/// work rather than history.
#[derive(Default)]
struct KeyedLocks {
    locks: StdMutex<HashMap<RecomputeKey, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    fn lock_for(&self, key: &RecomputeKey) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .expect("keyed-locks mutex poisoned")
            .entry(key.clone())
            .or_default()
            .clone()
    }

    /// Drops the entry when no recompute still holds its `Arc`. Both this
    /// and `lock_for` run under the map mutex, so a waiter that already
    /// cloned the `Arc` keeps the entry alive.
    fn release(&self, key: &RecomputeKey) {
        let mut locks = self.locks.lock().expect("keyed-locks mutex poisoned");
        if locks.get(key).is_some_and(|e| Arc::strong_count(e) == 1) {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().expect("keyed-locks mutex poisoned").len()
    }
}

/// Backoff shift is capped so large configured attempt counts cannot
/// overflow the multiplier; the delay itself is clamped as well.
const MAX_BACKOFF_SHIFT: u32 = 16;
const MAX_BACKOFF_MS: u64 = 30_000;

fn backoff_delay_ms(base: u64, attempt: u32) -> u64 {
    let factor = 1u64 << attempt.min(MAX_BACKOFF_SHIFT);
    base.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

pub struct Orchestrator {
    stores: Stores,
    registry: EmployeeRegistry,
    clock: Arc<dyn Clock>,
    tz: Tz,
    locks: KeyedLocks,
    retry: RetryPolicy,
    pub outbox: Arc<Outbox>,
}

impl Orchestrator {
    pub fn new(
        stores: Stores,
        registry: EmployeeRegistry,
        clock: Arc<dyn Clock>,
        tz: Tz,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            stores,
            registry,
            clock,
            tz,
            locks: KeyedLocks::default(),
            retry,
            outbox: Arc::new(Outbox::new()),
        }
    }

    /// Local dates whose summaries a clock event at `event_time` affects:
    /// the event's own working date, plus the previous date when the event
    /// falls inside the clock-out window of a night shift starting there.
    pub async fn affected_dates(
        &self,
        employee_id: &str,
        event_time: DateTime<Utc>,
    ) -> Result<Vec<NaiveDate>, RecomputeError> {
        let date = local_date(event_time, self.tz);
        let mut dates = vec![date];

        if let Some(prev) = date.pred_opt() {
            if let Some(end) = self.night_shift_cutoff(employee_id, prev).await? {
                if event_time <= end {
                    dates.push(prev);
                }
            }
        }
        Ok(dates)
    }

    /// End of the attribution window for a night shift starting on `date`:
    /// scheduled end plus the clock-out grace. `None` when the date has no
    /// complete night shift.
    async fn night_shift_cutoff(
        &self,
        employee_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DateTime<Utc>>, RecomputeError> {
        let Some(schedule) = self.stores.schedules.get(employee_id, date).await? else {
            return Ok(None);
        };
        let Some(shift) = schedule.shift() else {
            return Ok(None);
        };
        if !shift.is_night() {
            return Ok(None);
        }
        let (_, sched_end) = cross_midnight(date, shift.start, shift.end, self.tz);
        Ok(Some(sched_end + Duration::hours(NIGHT_OUT_GRACE_HOURS)))
    }

    /// Events owned by `date`: everything on the working date except entries
    /// claimed by the previous day's night shift, plus — when `date` itself
    /// carries a night shift — the OUTs that landed after midnight.
    pub async fn gather_events(
        &self,
        employee_id: &str,
        date: NaiveDate,
        schedule: Option<&Schedule>,
    ) -> Result<Vec<ClockEvent>, RecomputeError> {
        let mut events = self
            .stores
            .events
            .list_for_date(employee_id, date, self.tz)
            .await?;

        if let Some(prev) = date.pred_opt() {
            if let Some(cutoff) = self.night_shift_cutoff(employee_id, prev).await? {
                // The previous day's night shift only claims its closing OUT.
                // A same-morning IN before the cutoff belongs to today.
                events.retain(|e| e.kind != EventKind::Out || e.event_time > cutoff);
            }
        }

        if let Some(shift) = schedule.and_then(Schedule::shift) {
            if shift.is_night() {
                if let Some(next) = date.succ_opt() {
                    let midnight = combine(next, chrono::NaiveTime::MIN, self.tz);
                    let (_, sched_end) = cross_midnight(date, shift.start, shift.end, self.tz);
                    let cutoff = sched_end + Duration::hours(NIGHT_OUT_GRACE_HOURS);
                    let spillover = self
                        .stores
                        .events
                        .list_between(employee_id, midnight, cutoff + Duration::seconds(1))
                        .await?;
                    events.extend(
                        spillover
                            .into_iter()
                            .filter(|e| e.kind == EventKind::Out),
                    );
                }
            }
        }

        events.sort_by_key(|e| e.event_time);
        Ok(events)
    }

    /// Computes the summary for a key without persisting it. Used by the
    /// on-read fill in the period aggregator.
    pub async fn compute(&self, key: &RecomputeKey) -> Result<DailySummary, RecomputeError> {
        let schedule = self
            .stores
            .schedules
            .get(&key.employee_id, key.date)
            .await?;
        let events = self
            .gather_events(&key.employee_id, key.date, schedule.as_ref())
            .await?;
        let policy = self.registry.snapshot(&key.employee_id);
        let today = local_date(self.clock.now(), self.tz);

        let input = DayInput {
            employee_id: &key.employee_id,
            date: key.date,
            events: &events,
            schedule: schedule.as_ref(),
            policy: &policy,
            today,
            is_holiday: self.registry.is_holiday(key.date),
            on_leave: self.registry.on_leave(&key.employee_id, key.date),
            tz: self.tz,
        };
        Ok(engine::compute_daily_summary(&input))
    }

    /// Recomputes and upserts one (employee, date) summary under its key
    /// lock. Unchanged summaries are not rewritten, which keeps repeated
    /// firings idempotent.
    pub async fn recompute(&self, key: &RecomputeKey) -> Result<DailySummary, RecomputeError> {
        let guard = self.locks.lock_for(key);
        let result = {
            let _held = guard.lock().await;
            self.recompute_locked(key).await
        };
        drop(guard);
        self.locks.release(key);
        result
    }

    async fn recompute_locked(&self, key: &RecomputeKey) -> Result<DailySummary, RecomputeError> {
        let summary = self.compute(key).await?;
        let existing = self
            .stores
            .summaries
            .read(&key.employee_id, key.date)
            .await?;
        if matches!(&existing, Some(prev) if prev.value_eq(&summary)) {
            debug!(employee_id = %key.employee_id, date = %key.date,
                   "summary unchanged, skipping upsert");
            return Ok(summary);
        }

        info!(employee_id = %key.employee_id, date = %key.date,
              status = %summary.status, "upserting daily summary");
        self.stores.summaries.upsert(summary.clone()).await?;
        Ok(summary)
    }

    /// Recompute with exponential backoff and jitter. Exhausting the retries
    /// logs an alert; the triggering event is never rolled back.
    pub async fn recompute_with_retry(&self, key: &RecomputeKey) {
        for attempt in 0..self.retry.max_attempts {
            match self.recompute(key).await {
                Ok(_) => return,
                Err(err) => {
                    warn!(
                        employee_id = %key.employee_id,
                        date = %key.date,
                        attempt,
                        %err,
                        "recompute attempt failed"
                    );
                    if attempt + 1 < self.retry.max_attempts {
                        let backoff = backoff_delay_ms(self.retry.base_delay_ms, attempt);
                        let jitter = {
                            let mut rng = rand::thread_rng();
                            rng.gen_range(0..=backoff / 2)
                        };
                        tokio::time::sleep(std::time::Duration::from_millis(backoff + jitter))
                            .await;
                    }
                }
            }
        }
        error!(
            employee_id = %key.employee_id,
            date = %key.date,
            "ALERT: recompute failed after {} attempts; summary stale until next sweep or read",
            self.retry.max_attempts
        );
    }

    /// Drains every pending outbox key. The binary's worker loop and the
    /// tests both converge through this.
    pub async fn drain_outbox(&self) {
        while let Some(key) = self.outbox.pop() {
            self.recompute_with_retry(&key).await;
        }
    }

    /// True when clock events still reference `date`, including OUTs
    /// attributed across midnight to a night shift starting there. Schedule
    /// deletion is refused while this holds.
    pub async fn date_has_events(
        &self,
        employee_id: &str,
        date: NaiveDate,
    ) -> Result<bool, RecomputeError> {
        let schedule = self.stores.schedules.get(employee_id, date).await?;
        let events = self
            .gather_events(employee_id, date, schedule.as_ref())
            .await?;
        Ok(!events.is_empty())
    }

    #[cfg(test)]
    pub(crate) fn pending_lock_count(&self) -> usize {
        self.locks.len()
    }
}

/// Long-running worker: waits on the outbox and recomputes keys as they
/// arrive.
pub async fn run_worker(orchestrator: Arc<Orchestrator>) {
    info!("recompute worker started");
    loop {
        orchestrator.drain_outbox().await;
        orchestrator.outbox.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_saturates_at_the_cap() {
        assert_eq!(backoff_delay_ms(200, 0), 200);
        assert_eq!(backoff_delay_ms(200, 1), 400);
        assert_eq!(backoff_delay_ms(200, 2), 800);
        assert_eq!(backoff_delay_ms(200, 7), 25_600);
        assert_eq!(backoff_delay_ms(200, 8), MAX_BACKOFF_MS);
    }

    #[test]
    fn backoff_survives_extreme_configuration() {
        // Attempt counts past the shift width and huge base delays must
        // clamp, not overflow.
        assert_eq!(backoff_delay_ms(200, 100), MAX_BACKOFF_MS);
        assert_eq!(backoff_delay_ms(u64::MAX, 3), MAX_BACKOFF_MS);
        assert_eq!(backoff_delay_ms(0, 100), 0);
    }
}
