// Period aggregation: rolls persisted daily summaries into a report window,
// computing missing days on read so a lost recompute notification still
// converges when the report is pulled.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::model::{DailySummary, EmployeeId, Status};
use crate::orchestrator::{Orchestrator, RecomputeError, RecomputeKey};
use crate::store::SummaryStore;

/// Time-of-day rendering for report consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeStyle {
    /// 24-hour `HH:MM` for machine consumers.
    Military,
    /// `hh:mm AM/PM` for display.
    Civilian,
}

impl TimeStyle {
    fn format(&self, tod: NaiveTime) -> String {
        match self {
            TimeStyle::Military => tod.format("%H:%M").to_string(),
            TimeStyle::Civilian => tod.format("%I:%M %p").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub weekday: String,
    pub status: Status,
    pub time_in: Option<String>,
    pub time_out: Option<String>,
    pub scheduled_in: Option<String>,
    pub scheduled_out: Option<String>,
    pub billed_hours: Decimal,
    pub late_minutes: i64,
    pub undertime_minutes: i64,
    pub night_diff_hours: Decimal,
    pub overtime_hours: Decimal,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PeriodTotals {
    pub days_worked: u32,
    pub billed_hours: Decimal,
    pub late_minutes: i64,
    pub undertime_minutes: i64,
    pub night_diff_hours: Decimal,
    pub overtime_hours: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodReport {
    pub employee_id: EmployeeId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Vec<DayRecord>,
    pub totals: PeriodTotals,
}

pub struct PeriodAggregator {
    summaries: Arc<dyn SummaryStore>,
    orchestrator: Arc<Orchestrator>,
}

impl PeriodAggregator {
    pub fn new(summaries: Arc<dyn SummaryStore>, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            summaries,
            orchestrator,
        }
    }

    /// Builds the report for `[start, end]` inclusive. Days without a
    /// persisted summary are computed from live events and schedule but not
    /// written back.
    pub async fn report(
        &self,
        employee_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        style: TimeStyle,
    ) -> Result<PeriodReport, RecomputeError> {
        let persisted = self.summaries.read_range(employee_id, start, end).await?;
        debug!(
            employee_id,
            %start,
            %end,
            persisted = persisted.len(),
            "building period report"
        );

        let mut days = Vec::new();
        let mut totals = PeriodTotals::default();

        let mut date = start;
        while date <= end {
            let summary = match persisted.iter().find(|s| s.date == date) {
                Some(s) => s.clone(),
                None => {
                    self.orchestrator
                        .compute(&RecomputeKey::new(employee_id, date))
                        .await?
                }
            };
            accumulate(&mut totals, &summary);
            days.push(day_record(&summary, style));

            let Some(next) = date.succ_opt() else { break };
            date = next;
        }

        Ok(PeriodReport {
            employee_id: employee_id.to_string(),
            start_date: start,
            end_date: end,
            days,
            totals,
        })
    }
}

fn day_record(summary: &DailySummary, style: TimeStyle) -> DayRecord {
    DayRecord {
        date: summary.date,
        weekday: summary.date.format("%A").to_string(),
        status: summary.status,
        time_in: summary.actual_in.map(|t| style.format(t)),
        time_out: summary.actual_out.map(|t| style.format(t)),
        scheduled_in: summary.scheduled_in.map(|t| style.format(t)),
        scheduled_out: summary.scheduled_out.map(|t| style.format(t)),
        billed_hours: summary.billed_hours,
        late_minutes: summary.late_minutes,
        undertime_minutes: summary.undertime_minutes,
        night_diff_hours: summary.night_diff_hours,
        overtime_hours: summary.overtime_hours,
    }
}

fn accumulate(totals: &mut PeriodTotals, summary: &DailySummary) {
    if summary.status.is_worked() {
        totals.days_worked += 1;
    }
    totals.billed_hours += summary.billed_hours;
    totals.late_minutes += summary.late_minutes;
    totals.undertime_minutes += summary.undertime_minutes;
    totals.night_diff_hours += summary.night_diff_hours;
    totals.overtime_hours += summary.overtime_hours;
}
