//! Working-hour calendar arithmetic.
//!
//! A [`WorkCalendar`] is an immutable value built from the project
//! configuration. It defines the bijection between wall-clock moments and
//! elapsed working hours from the project start, under per-date capacity
//! overrides and the weekend policy.
//!
//! All searches that walk forward through dates are bounded by
//! [`dagr_core::HORIZON_BOUND_DAYS`]; a calendar whose future is entirely
//! zero-capacity fails with [`Error::UnschedulableHorizon`] instead of
//! spinning.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, TimeDelta, Weekday};
use dagr_core::{Error, ProjectConfig, Result, HORIZON_BOUND_DAYS};

/// Tolerance for working-hour comparisons. Offsets are sums of parsed
/// decimal hours, so anything tighter than a microsecond is noise.
pub const EPS: f64 = 1e-9;

/// Immutable working-calendar view of a project configuration.
#[derive(Clone, Debug)]
pub struct WorkCalendar {
    config: ProjectConfig,
}

impl WorkCalendar {
    pub fn new(config: &ProjectConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Working-hour capacity of a date. An override replaces both the
    /// default capacity and the weekend-skip decision.
    pub fn capacity(&self, date: NaiveDate) -> f64 {
        if let Some(hours) = self.config.capacity_overrides.get(&date) {
            return *hours;
        }
        if self.config.skip_weekends
            && matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
        {
            return 0.0;
        }
        self.config.hours_per_day
    }

    /// The instant at `pos` working hours into a date's working day.
    pub fn instant_at(&self, date: NaiveDate, pos: f64) -> NaiveDateTime {
        date.and_time(self.config.day_start) + hours_delta(pos)
    }

    /// Working hours already consumed on `t`'s date at moment `t`,
    /// clamped into `[0, capacity]`.
    pub fn position_in_day(&self, t: NaiveDateTime) -> f64 {
        let day_start = t.date().and_time(self.config.day_start);
        let raw = delta_hours(t - day_start);
        raw.clamp(0.0, self.capacity(t.date()))
    }

    /// The first instant with positive remaining capacity at-or-after the
    /// configured start.
    pub fn project_start_instant(&self) -> Result<NaiveDateTime> {
        self.add_working_hours(self.config.start, 0.0)
    }

    /// Advance `t` by `h` working hours of capacity.
    ///
    /// With `h == 0` this returns `t` shifted forward to the next moment
    /// with positive remaining capacity, i.e. the real starting instant
    /// of work placed at `t`.
    pub fn add_working_hours(&self, t: NaiveDateTime, h: f64) -> Result<NaiveDateTime> {
        debug_assert!(h >= 0.0, "working-hour advances are non-negative");
        let mut date = t.date();
        let mut pos = self.position_in_day(t);
        let mut remaining = h;

        for _ in 0..HORIZON_BOUND_DAYS {
            let cap = self.capacity(date);
            let available = (cap - pos).max(0.0);

            if remaining > EPS {
                let step = remaining.min(available);
                pos += step;
                remaining -= step;
                if remaining <= EPS {
                    return Ok(self.instant_at(date, pos));
                }
            } else if available > EPS {
                // Zero-hour request: land on the first workable moment.
                return Ok(self.instant_at(date, pos));
            }

            date = next_date(date)?;
            pos = 0.0;
        }
        Err(Error::UnschedulableHorizon)
    }

    /// Working hours from the project start instant to `t`. Moments at or
    /// before the start clamp to zero.
    pub fn elapsed_hours(&self, t: NaiveDateTime) -> Result<f64> {
        let start = self.project_start_instant()?;
        if t <= start {
            return Ok(0.0);
        }
        let mut total = 0.0;
        let mut date = start.date();
        loop {
            let from = if date == start.date() {
                self.position_in_day(start)
            } else {
                0.0
            };
            let to = if date == t.date() {
                self.position_in_day(t)
            } else {
                self.capacity(date)
            };
            total += (to - from).max(0.0);
            if date == t.date() {
                return Ok(total);
            }
            date = next_date(date)?;
        }
    }

    /// Elapsed working hours at the end of a date's working day. This is
    /// the deadline cap for a deadline falling on `date`.
    pub fn end_of_day_elapsed(&self, date: NaiveDate) -> Result<f64> {
        self.elapsed_hours(self.instant_at(date, self.capacity(date)))
    }

    /// Wall-clock moment of the end of a date's working day.
    pub fn end_of_day_instant(&self, date: NaiveDate) -> NaiveDateTime {
        self.instant_at(date, self.capacity(date))
    }

    /// Wall-clock equivalent of a working-hour offset, finish-style: an
    /// offset landing exactly at a day's end stays on that day.
    pub fn instant_after(&self, offset: f64) -> Result<NaiveDateTime> {
        let start = self.project_start_instant()?;
        self.add_working_hours(start, offset)
    }

    /// Wall-clock equivalent of a working-hour offset, start-style: an
    /// offset landing at a day's end rolls to the next workable moment.
    pub fn start_instant(&self, offset: f64) -> Result<NaiveDateTime> {
        let at = self.instant_after(offset)?;
        self.add_working_hours(at, 0.0)
    }

    /// Elapsed offset of the floor implied by a `proposed_start` date:
    /// the start of that working day, rolled forward past zero-capacity
    /// dates.
    pub fn floor_offset(&self, date: NaiveDate) -> Result<f64> {
        let at = self.add_working_hours(self.instant_at(date, 0.0), 0.0)?;
        self.elapsed_hours(at)
    }

    /// Wall-clock floor instant for a `proposed_start` date.
    pub fn floor_instant(&self, date: NaiveDate) -> Result<NaiveDateTime> {
        self.add_working_hours(self.instant_at(date, 0.0), 0.0)
    }
}

fn next_date(date: NaiveDate) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(1))
        .ok_or(Error::UnschedulableHorizon)
}

/// Convert working hours to a wall-clock delta, rounded to whole seconds.
pub fn hours_delta(h: f64) -> TimeDelta {
    TimeDelta::seconds((h * 3600.0).round() as i64)
}

/// Convert a wall-clock delta to fractional hours.
pub fn delta_hours(delta: TimeDelta) -> f64 {
    delta.num_seconds() as f64 / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, min, 0).unwrap()
    }

    /// 2026-02-23 is a Monday.
    fn thesis_calendar() -> WorkCalendar {
        WorkCalendar::new(&ProjectConfig::new(date(2026, 2, 23)))
    }

    #[test]
    fn capacity_respects_weekends_and_overrides() {
        let config = ProjectConfig::new(date(2026, 2, 23))
            .with_override(date(2026, 2, 28), 4.0) // Saturday
            .with_override(date(2026, 2, 25), 0.0); // Wednesday off
        let cal = WorkCalendar::new(&config);

        assert_eq!(cal.capacity(date(2026, 2, 23)), 8.0); // Monday
        assert_eq!(cal.capacity(date(2026, 2, 28)), 4.0); // overridden Saturday
        assert_eq!(cal.capacity(date(2026, 3, 1)), 0.0); // Sunday
        assert_eq!(cal.capacity(date(2026, 2, 25)), 0.0); // day off
    }

    #[test]
    fn add_within_a_day() {
        let cal = thesis_calendar();
        let start = cal.project_start_instant().unwrap();
        assert_eq!(start, dt(2026, 2, 23, 9, 0));
        assert_eq!(cal.add_working_hours(start, 3.5).unwrap(), dt(2026, 2, 23, 12, 30));
    }

    #[test]
    fn add_spills_across_the_weekend() {
        let cal = thesis_calendar();
        let start = cal.project_start_instant().unwrap();
        // Mon..Fri = 40h; 42h lands 2h into the next Monday.
        assert_eq!(cal.add_working_hours(start, 42.0).unwrap(), dt(2026, 3, 2, 11, 0));
    }

    #[test]
    fn finish_style_lands_on_day_end() {
        let cal = thesis_calendar();
        let start = cal.project_start_instant().unwrap();
        assert_eq!(cal.add_working_hours(start, 8.0).unwrap(), dt(2026, 2, 23, 17, 0));
        // Start-style rolls the same offset onto Tuesday morning.
        assert_eq!(cal.start_instant(8.0).unwrap(), dt(2026, 2, 24, 9, 0));
    }

    #[test]
    fn friday_afternoon_with_saturday_override() {
        // Start Friday 13:00; Saturday carries a 4h override.
        let mut config = ProjectConfig::new(date(2026, 2, 27));
        config.start = dt(2026, 2, 27, 13, 0);
        config.capacity_overrides.insert(date(2026, 2, 28), 4.0);
        let cal = WorkCalendar::new(&config);

        let start = cal.project_start_instant().unwrap();
        assert_eq!(start, dt(2026, 2, 27, 13, 0));

        // 4h left on Friday, then 2h into the Saturday override.
        assert_eq!(cal.add_working_hours(start, 6.0).unwrap(), dt(2026, 2, 28, 11, 0));

        // Exhausting Friday + Saturday lands at Saturday's end; a zero-hour
        // shift from there rolls past Sunday to Monday 09:00.
        let sat_end = cal.add_working_hours(start, 8.0).unwrap();
        assert_eq!(sat_end, dt(2026, 2, 28, 13, 0));
        assert_eq!(cal.add_working_hours(sat_end, 0.0).unwrap(), dt(2026, 3, 2, 9, 0));
    }

    #[test]
    fn elapsed_inverts_add() {
        let cal = thesis_calendar();
        let start = cal.project_start_instant().unwrap();
        for h in [0.0, 0.2, 3.0, 8.0, 11.5, 23.0, 40.0, 97.25] {
            let at = cal.add_working_hours(start, h).unwrap();
            let back = cal.elapsed_hours(at).unwrap();
            assert!((back - h).abs() < 1e-6, "h={h} came back as {back}");
        }
    }

    #[test]
    fn elapsed_clamps_before_start() {
        let cal = thesis_calendar();
        assert_eq!(cal.elapsed_hours(dt(2026, 2, 20, 12, 0)).unwrap(), 0.0);
    }

    #[test]
    fn start_on_a_weekend_rolls_to_monday() {
        // Anchor on Saturday with weekends skipped.
        let config = ProjectConfig::new(date(2026, 2, 28));
        let cal = WorkCalendar::new(&config);
        assert_eq!(cal.project_start_instant().unwrap(), dt(2026, 3, 2, 9, 0));
    }

    #[test]
    fn floor_skips_zero_capacity_dates() {
        let cal = thesis_calendar();
        // Proposed start on a Sunday floors at Monday 09:00.
        assert_eq!(cal.floor_instant(date(2026, 3, 1)).unwrap(), dt(2026, 3, 2, 9, 0));
        assert!((cal.floor_offset(date(2026, 3, 1)).unwrap() - 40.0).abs() < 1e-6);
    }

    #[test]
    fn end_of_day_elapsed_is_the_deadline_cap() {
        let cal = thesis_calendar();
        // End of the first Monday is 8 elapsed hours.
        assert!((cal.end_of_day_elapsed(date(2026, 2, 23)).unwrap() - 8.0).abs() < 1e-6);
        // Monday 2026-03-02 closes the second week at 48h.
        assert!((cal.end_of_day_elapsed(date(2026, 3, 2)).unwrap() - 48.0).abs() < 1e-6);
    }

    #[test]
    fn unschedulable_horizon_is_detected() {
        // 10,000 bounded days at 0.0001h/day hold 1h of capacity in
        // total; asking for more must fail instead of walking forever.
        let mut config = ProjectConfig::new(date(2026, 2, 23));
        config.hours_per_day = 0.0001;
        config.skip_weekends = false;
        let cal = WorkCalendar::new(&config);

        let start = cal.project_start_instant().unwrap();
        assert!(matches!(
            cal.add_working_hours(start, 2.0),
            Err(Error::UnschedulableHorizon)
        ));
    }
}
