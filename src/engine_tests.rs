// Engine and classifier coverage: the seed attendance scenarios plus the
// generative invariants (determinism, non-negativity, the grace cliff, and
// monotone billed hours).

use chrono::{Datelike, NaiveDate, NaiveTime, Utc};
use chrono_tz::Asia::Manila;
use chrono_tz::Tz;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::engine::{compute_daily_summary, DayInput};
use crate::model::{ClockEvent, EventKind, Schedule, Status};
use crate::policy::{PolicyDefaults, PolicySnapshot};
use crate::timeutil::combine;

const TZ: Tz = Manila;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date literal")
}

fn t(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").expect("valid time literal")
}

fn ev(id: u64, kind: EventKind, date: NaiveDate, tod: NaiveTime) -> ClockEvent {
    let instant = combine(date, tod, TZ);
    ClockEvent {
        id,
        employee_id: "E1".to_string(),
        kind,
        event_time: instant,
        recorded_at: instant,
        coords: None,
        corrected_by: None,
        notes: None,
    }
}

fn policy() -> PolicySnapshot {
    PolicySnapshot::from_defaults("E1", &PolicyDefaults::default())
}

struct Day {
    date: NaiveDate,
    events: Vec<ClockEvent>,
    schedule: Option<Schedule>,
    today: NaiveDate,
    is_holiday: bool,
    on_leave: bool,
}

impl Day {
    fn new(date: &str) -> Self {
        Self {
            date: d(date),
            events: Vec::new(),
            schedule: None,
            // A Friday well after the dates used in these tests.
            today: d("2024-03-08"),
            is_holiday: false,
            on_leave: false,
        }
    }

    fn schedule(mut self, start: &str, end: &str) -> Self {
        self.schedule = Some(Schedule::new("E1", self.date, t(start), t(end)));
        self
    }

    fn clock_in(mut self, tod: &str) -> Self {
        let id = self.events.len() as u64 + 1;
        self.events.push(ev(id, EventKind::In, self.date, t(tod)));
        self
    }

    fn clock_out(mut self, tod: &str) -> Self {
        let id = self.events.len() as u64 + 1;
        self.events.push(ev(id, EventKind::Out, self.date, t(tod)));
        self
    }

    /// OUT landing on the following calendar day (night shifts).
    fn clock_out_next_day(mut self, tod: &str) -> Self {
        let id = self.events.len() as u64 + 1;
        let next = self.date.succ_opt().expect("date has a successor");
        self.events.push(ev(id, EventKind::Out, next, t(tod)));
        self
    }

    fn compute(&self) -> crate::model::DailySummary {
        let policy = policy();
        compute_daily_summary(&DayInput {
            employee_id: "E1",
            date: self.date,
            events: &self.events,
            schedule: self.schedule.as_ref(),
            policy: &policy,
            today: self.today,
            is_holiday: self.is_holiday,
            on_leave: self.on_leave,
            tz: TZ,
        })
    }
}

// --- Seed scenarios ---

#[test]
fn dayshift_on_time_rounds_early_arrival_forward() {
    let summary = Day::new("2024-03-04")
        .schedule("09:00", "18:00")
        .clock_in("08:55")
        .clock_out("17:05")
        .compute();

    // 09:00→17:05 after the early round-forward = 485 min, minus the 60-min
    // flexible break = 425 min.
    assert_eq!(summary.billed_hours, dec!(7.08));
    assert_eq!(summary.late_minutes, 0);
    assert_eq!(summary.undertime_minutes, 55);
    assert_eq!(summary.night_diff_hours, dec!(0.00));
    assert_eq!(summary.overtime_hours, dec!(0.00));
    assert_eq!(summary.status, Status::Undertime);
}

#[test]
fn late_within_grace_is_not_late() {
    let summary = Day::new("2024-03-04")
        .schedule("09:00", "17:00")
        .clock_in("09:04")
        .clock_out("17:00")
        .compute();

    assert_eq!(summary.late_minutes, 0);
    assert_eq!(summary.billed_hours, dec!(6.93));
    assert_eq!(summary.undertime_minutes, 4);
    assert_eq!(summary.status, Status::Undertime);
}

#[test]
fn late_beyond_grace_nets_out_the_grace_period() {
    let summary = Day::new("2024-03-04")
        .schedule("09:00", "17:00")
        .clock_in("09:15")
        .clock_out("17:00")
        .compute();

    assert_eq!(summary.late_minutes, 10);
    assert_eq!(summary.status, Status::Late);
    assert_eq!(summary.billed_hours, dec!(6.75));
}

#[test]
fn nightshift_clamps_both_ends_and_earns_night_differential() {
    let summary = Day::new("2024-03-04")
        .schedule("20:00", "05:00")
        .clock_in("19:45")
        .clock_out_next_day("05:15")
        .compute();

    assert_eq!(summary.billed_hours, dec!(8.00));
    assert_eq!(summary.late_minutes, 0);
    assert_eq!(summary.undertime_minutes, 0);
    assert_eq!(summary.overtime_hours, dec!(0.00));
    // 22:00→05:00 inside the band = 7 h, minus the 1-h deduction.
    assert_eq!(summary.night_diff_hours, dec!(6.00));
    assert_eq!(summary.status, Status::Present);
}

#[test]
fn short_session_is_incomplete_with_zeroed_metrics() {
    let summary = Day::new("2024-03-04")
        .schedule("09:00", "17:00")
        .clock_in("11:51")
        .clock_out("11:52")
        .compute();

    assert_eq!(summary.status, Status::Incomplete);
    assert_eq!(summary.billed_hours, Decimal::ZERO);
    assert_eq!(summary.late_minutes, 0);
    assert_eq!(summary.undertime_minutes, 0);
    assert_eq!(summary.night_diff_hours, Decimal::ZERO);
    assert_eq!(summary.overtime_hours, Decimal::ZERO);
}

#[test]
fn both_clocks_before_scheduled_start_void_the_shift() {
    let summary = Day::new("2024-03-04")
        .schedule("09:00", "17:00")
        .clock_in("07:00")
        .clock_out("08:00")
        .compute();

    assert_eq!(summary.status, Status::ShiftVoid);
    assert_eq!(summary.billed_hours, Decimal::ZERO);
    assert_eq!(summary.late_minutes, 0);
    assert_eq!(summary.undertime_minutes, 0);
    assert_eq!(summary.night_diff_hours, Decimal::ZERO);
    assert_eq!(summary.overtime_hours, Decimal::ZERO);
}

#[test]
fn past_date_with_nothing_is_not_scheduled() {
    let summary = Day::new("2024-03-04").compute();
    assert_eq!(summary.status, Status::NotScheduled);
    assert_eq!(summary.billed_hours, Decimal::ZERO);
}

// --- Abuse-prevention windows ---

#[test]
fn early_arrival_beyond_window_keeps_actual_start() {
    let summary = Day::new("2024-03-04")
        .schedule("09:00", "18:00")
        .clock_in("07:59")
        .clock_out("17:00")
        .compute();

    // 61 minutes early: no round-forward. 07:59→17:00 = 541 min − 60 break.
    assert_eq!(summary.billed_hours, dec!(8.02));
}

#[test]
fn late_departure_within_window_rounds_back_to_schedule_end() {
    let summary = Day::new("2024-03-04")
        .schedule("09:00", "18:00")
        .clock_in("09:00")
        .clock_out("20:00")
        .compute();

    // 120 minutes over: still inside the round-back window.
    assert_eq!(summary.billed_hours, dec!(8.00));
    assert_eq!(summary.overtime_hours, dec!(0.00));
    assert_eq!(summary.status, Status::Present);
}

#[test]
fn late_departure_beyond_window_keeps_actual_end() {
    let summary = Day::new("2024-03-04")
        .schedule("09:00", "18:00")
        .clock_in("09:00")
        .clock_out("21:00")
        .compute();

    // 180 minutes over the scheduled end: the emergency window keeps the
    // actual time. 09:00→21:00 = 720 min − 60 break = 11.00 h.
    assert_eq!(summary.billed_hours, dec!(11.00));
    assert_eq!(summary.overtime_hours, dec!(3.00));
    assert_eq!(summary.status, Status::Overtime);
}

#[test]
fn short_scheduled_session_gets_no_break_deduction() {
    let summary = Day::new("2024-03-04")
        .schedule("09:00", "12:00")
        .clock_in("09:00")
        .clock_out("12:00")
        .compute();

    // 180 min < the 240-min break-session threshold.
    assert_eq!(summary.billed_hours, dec!(3.00));
    assert_eq!(summary.undertime_minutes, 0);
    assert_eq!(summary.status, Status::Present);
}

#[test]
fn unscheduled_day_measures_undertime_against_daily_work_hours() {
    let summary = Day::new("2024-03-04")
        .clock_in("09:00")
        .clock_out("13:00")
        .compute();

    // 240 min reaches the break threshold: 240 − 60 = 180 min billed.
    assert_eq!(summary.billed_hours, dec!(3.00));
    assert_eq!(summary.undertime_minutes, 480 - 180);
    assert_eq!(summary.status, Status::Undertime);
}

#[test]
fn night_differential_uses_actual_times_not_effective() {
    // Arrives early for a night shift: the billed clamp moves the start to
    // 20:00, but ND still reads from the 19:45 actual (band opens at 22:00,
    // so the result only differs when actuals cross the band).
    let summary = Day::new("2024-03-04")
        .schedule("22:30", "06:00")
        .clock_in("21:00")
        .clock_out_next_day("06:45")
        .compute();

    // Billed: clamp to 22:30→06:00 = 450 − 60 = 390 min.
    assert_eq!(summary.billed_hours, dec!(6.50));
    // ND: actual 21:00→06:45 clipped to the 06:00 schedule end, then to the
    // 22:00→06:00 band = 480 min = 8 h − 1 h deduction.
    assert_eq!(summary.night_diff_hours, dec!(7.00));
}

// --- Classifier ladder ---

#[test]
fn weekend_without_schedule_or_events_is_weekend() {
    let date = d("2024-03-02");
    assert_eq!(date.weekday(), chrono::Weekday::Sat);
    let summary = Day::new("2024-03-02").compute();
    assert_eq!(summary.status, Status::Weekend);
    assert!(summary.is_weekend);
}

#[test]
fn weekend_with_schedule_and_no_events_is_absent() {
    let summary = Day::new("2024-03-02").schedule("09:00", "17:00").compute();
    assert_eq!(summary.status, Status::Absent);
}

#[test]
fn holiday_without_events_is_holiday() {
    let mut day = Day::new("2024-03-04").schedule("09:00", "17:00");
    day.is_holiday = true;
    let summary = day.compute();
    assert_eq!(summary.status, Status::Holiday);
    assert!(summary.is_holiday);
}

#[test]
fn approved_leave_overrides_everything() {
    let mut day = Day::new("2024-03-04")
        .schedule("09:00", "17:00")
        .clock_in("09:00")
        .clock_out("17:00");
    day.on_leave = true;
    assert_eq!(day.compute().status, Status::Leave);
}

#[test]
fn future_date_with_schedule_is_scheduled() {
    let summary = Day::new("2024-03-11").schedule("09:00", "17:00").compute();
    assert_eq!(summary.status, Status::Scheduled);
}

#[test]
fn future_date_without_schedule_is_not_scheduled() {
    let summary = Day::new("2024-03-11").compute();
    assert_eq!(summary.status, Status::NotScheduled);
}

#[test]
fn scheduled_past_date_without_events_is_absent() {
    let summary = Day::new("2024-03-04").schedule("09:00", "17:00").compute();
    assert_eq!(summary.status, Status::Absent);
}

#[test]
fn open_session_is_incomplete() {
    let summary = Day::new("2024-03-04")
        .schedule("09:00", "17:00")
        .clock_in("09:00")
        .compute();
    assert_eq!(summary.status, Status::Incomplete);
    assert_eq!(summary.actual_out, None);
}

#[test]
fn orphan_out_is_not_attributed_to_the_day() {
    let summary = Day::new("2024-03-04")
        .schedule("09:00", "17:00")
        .clock_out("17:00")
        .compute();
    // The bare OUT is dropped, so the day reads as having no events.
    assert_eq!(summary.actual_in, None);
    assert_eq!(summary.actual_out, None);
    assert_eq!(summary.status, Status::Absent);
}

#[test]
fn multiple_events_select_earliest_in_and_latest_out() {
    let summary = Day::new("2024-03-04")
        .schedule("09:00", "17:00")
        .clock_in("09:00")
        .clock_out("12:00")
        .clock_in("13:00")
        .clock_out("17:00")
        .compute();
    assert_eq!(summary.actual_in, Some(t("09:00")));
    assert_eq!(summary.actual_out, Some(t("17:00")));
    assert_eq!(summary.billed_hours, dec!(7.00));
}

// --- Generative invariants ---

fn random_tod(rng: &mut StdRng) -> NaiveTime {
    NaiveTime::from_num_seconds_from_midnight_opt(rng.gen_range(0..86_400), 0)
        .expect("seconds within a day")
}

#[test]
fn determinism_identical_inputs_identical_outputs() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let mut day = Day::new("2024-03-04");
        if rng.gen_bool(0.7) {
            day.schedule = Some(Schedule::new(
                "E1",
                day.date,
                random_tod(&mut rng),
                random_tod(&mut rng),
            ));
        }
        if rng.gen_bool(0.8) {
            let in_tod = random_tod(&mut rng);
            day.events.push(ev(1, EventKind::In, day.date, in_tod));
            if rng.gen_bool(0.8) {
                day.events.push(ev(2, EventKind::Out, day.date, random_tod(&mut rng)));
            }
        }

        let a = day.compute();
        let b = day.compute();
        assert!(a.value_eq(&b), "outputs diverged for {day:?}", day = day.date);
        assert_eq!(a.status, b.status);
        assert_eq!(a.billed_hours, b.billed_hours);
    }
}

#[test]
fn no_metric_is_ever_negative() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..500 {
        let mut day = Day::new("2024-03-04");
        if rng.gen_bool(0.6) {
            day.schedule = Some(Schedule::new(
                "E1",
                day.date,
                random_tod(&mut rng),
                random_tod(&mut rng),
            ));
        }
        if rng.gen_bool(0.9) {
            day.events.push(ev(1, EventKind::In, day.date, random_tod(&mut rng)));
            day.events.push(ev(2, EventKind::Out, day.date, random_tod(&mut rng)));
        }

        let s = day.compute();
        assert!(s.billed_hours >= Decimal::ZERO);
        assert!(s.late_minutes >= 0);
        assert!(s.undertime_minutes >= 0);
        assert!(s.night_diff_hours >= Decimal::ZERO);
        assert!(s.overtime_hours >= Decimal::ZERO);
    }
}

#[test]
fn grace_period_is_a_cliff() {
    for offset in 0..=30i64 {
        let in_tod = t("09:00") + chrono::Duration::minutes(offset);
        let summary = Day::new("2024-03-04")
            .schedule("09:00", "17:00")
            .clock_in(&in_tod.format("%H:%M").to_string())
            .clock_out("17:00")
            .compute();

        let expected = if offset <= 5 { 0 } else { offset - 5 };
        assert_eq!(
            summary.late_minutes, expected,
            "raw late {offset} should net to {expected}"
        );
    }
}

#[test]
fn billed_hours_monotone_in_session_length_without_schedule() {
    let mut rng = StdRng::seed_from_u64(23);
    for _ in 0..200 {
        let in_minute = rng.gen_range(0..600i64);
        // Stay on one side of the 240-min break threshold: crossing it
        // deducts the flexible break and legitimately drops billed hours.
        let (len, extension) = if rng.gen_bool(0.5) {
            let len = rng.gen_range(20..200i64);
            (len, rng.gen_range(1..(240 - len)))
        } else {
            (rng.gen_range(300..600i64), rng.gen_range(1..180i64))
        };

        let base_in = t("00:00") + chrono::Duration::minutes(in_minute);
        let base_out = base_in + chrono::Duration::minutes(len);
        let longer_out = base_out + chrono::Duration::minutes(extension);

        let short = Day::new("2024-03-04")
            .clock_in(&base_in.format("%H:%M").to_string())
            .clock_out(&base_out.format("%H:%M").to_string())
            .compute();
        let long = Day::new("2024-03-04")
            .clock_in(&base_in.format("%H:%M").to_string())
            .clock_out(&longer_out.format("%H:%M").to_string())
            .compute();

        assert!(
            long.billed_hours >= short.billed_hours,
            "extending the session shrank billed hours: {} -> {}",
            short.billed_hours,
            long.billed_hours
        );
    }
}

#[test]
fn voided_and_worked_statuses_respect_cross_field_invariants() {
    let mut rng = StdRng::seed_from_u64(31);
    for _ in 0..300 {
        let mut day = Day::new("2024-03-04");
        if rng.gen_bool(0.7) {
            day.schedule = Some(Schedule::new(
                "E1",
                day.date,
                random_tod(&mut rng),
                random_tod(&mut rng),
            ));
        }
        if rng.gen_bool(0.8) {
            day.events.push(ev(1, EventKind::In, day.date, random_tod(&mut rng)));
            if rng.gen_bool(0.7) {
                day.events.push(ev(2, EventKind::Out, day.date, random_tod(&mut rng)));
            }
        }

        let s = day.compute();
        if s.status == Status::ShiftVoid {
            assert_eq!(s.billed_hours, Decimal::ZERO);
            assert_eq!(s.late_minutes, 0);
            assert_eq!(s.undertime_minutes, 0);
            assert_eq!(s.night_diff_hours, Decimal::ZERO);
            assert_eq!(s.overtime_hours, Decimal::ZERO);
        }
        if matches!(
            s.status,
            Status::Present | Status::Late | Status::Undertime | Status::Overtime
        ) {
            assert!(s.actual_in.is_some());
            assert!(s.actual_out.is_some());
        }
    }
}

#[test]
fn calculated_at_is_advisory_not_identity() {
    let day = Day::new("2024-03-04")
        .schedule("09:00", "17:00")
        .clock_in("09:00")
        .clock_out("17:00");
    let mut a = day.compute();
    let b = day.compute();
    a.calculated_at = Utc::now() + chrono::Duration::hours(1);
    assert!(a.value_eq(&b));
}
