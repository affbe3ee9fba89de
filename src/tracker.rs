//! Current/next prayer tracking over a single day's schedule.
//!
//! A window for prayer `p` spans from `p` until the next obligatory prayer.
//! Isha's window runs until local midnight; past that the schedule is stale
//! and the driver must rebuild it for the new date.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use tracing::info;

use crate::convention::ParameterBundle;
use crate::ephemeris::Ephemeris;
use crate::error::{CoreError, CoreResult};
use crate::schedule::{self, DaySchedule};
use crate::types::PrayerName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "prayer")]
pub enum TrackerState {
    /// Same calendar day as the schedule, Fajr not yet reached
    BeforeFajr,
    InPrayerWindow(PrayerName),
    /// Local midnight after Isha has passed; the schedule is stale
    AfterIsha,
}

/// Hours/minutes/seconds split of the remaining time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Countdown {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub total_seconds: u64,
}

impl Countdown {
    pub fn from_seconds(total_seconds: u64) -> Self {
        Self {
            hours: total_seconds / 3600,
            minutes: (total_seconds % 3600) / 60,
            seconds: total_seconds % 60,
            total_seconds,
        }
    }
}

impl std::fmt::Display for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// Live snapshot consumed by display and notification collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrayerStatus {
    pub state: TrackerState,
    pub current_prayer: Option<PrayerName>,
    pub next_prayer: PrayerName,
    pub next_prayer_instant: DateTime<Utc>,
    pub seconds_remaining: u64,
    /// The countdown hit zero or the date moved on: rebuild the schedule
    pub rebuild_due: bool,
}

impl PrayerStatus {
    pub fn countdown(&self) -> Countdown {
        Countdown::from_seconds(self.seconds_remaining)
    }
}

/// Start of the local day after `date`
pub fn local_midnight_after<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
    let midnight = next.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        // Midnight skipped by a DST jump: the day starts an hour later
        .or_else(|| {
            tz.from_local_datetime(&(midnight + chrono::Duration::hours(1)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

pub fn state_at<Tz: TimeZone>(schedule: &DaySchedule, now: DateTime<Utc>, tz: &Tz) -> TrackerState {
    if now < schedule.instant(PrayerName::Fajr) {
        return TrackerState::BeforeFajr;
    }

    let day_end = local_midnight_after(schedule.date(), tz);
    if now >= day_end && now >= schedule.instant(PrayerName::Isha) {
        return TrackerState::AfterIsha;
    }

    let current = PrayerName::OBLIGATORY
        .into_iter()
        .rev()
        .find(|p| schedule.instant(*p) <= now)
        .unwrap_or(PrayerName::Fajr);
    TrackerState::InPrayerWindow(current)
}

fn next_day_fajr(
    ephemeris: &dyn Ephemeris,
    schedule: &DaySchedule,
    bundle: &ParameterBundle,
) -> CoreResult<DateTime<Utc>> {
    let tomorrow = schedule
        .date()
        .checked_add_days(Days::new(1))
        .ok_or_else(|| CoreError::schedule_unavailable(schedule.date(), "date out of range"))?;
    let next = schedule::build(ephemeris, &schedule.coordinates(), tomorrow, bundle)?;
    Ok(next.instant(PrayerName::Fajr))
}

/// Resolve current/next prayer and the countdown at `now`
pub fn status_at<Tz: TimeZone>(
    ephemeris: &dyn Ephemeris,
    schedule: &DaySchedule,
    bundle: &ParameterBundle,
    now: DateTime<Utc>,
    tz: &Tz,
) -> CoreResult<PrayerStatus> {
    let state = state_at(schedule, now, tz);

    let (current_prayer, next_prayer, next_prayer_instant) = match state {
        TrackerState::BeforeFajr => (None, PrayerName::Fajr, schedule.instant(PrayerName::Fajr)),
        TrackerState::InPrayerWindow(current) => match current.next_obligatory() {
            Some(next) => (Some(current), next, schedule.instant(next)),
            None => (
                Some(current),
                PrayerName::Fajr,
                next_day_fajr(ephemeris, schedule, bundle)?,
            ),
        },
        TrackerState::AfterIsha => (
            None,
            PrayerName::Fajr,
            next_day_fajr(ephemeris, schedule, bundle)?,
        ),
    };

    let seconds_remaining = (next_prayer_instant - now).num_seconds().max(0) as u64;
    Ok(PrayerStatus {
        state,
        current_prayer,
        next_prayer,
        next_prayer_instant,
        seconds_remaining,
        rebuild_due: seconds_remaining == 0 || state == TrackerState::AfterIsha,
    })
}

/// Remembers the last observed state so transitions can be reported once
#[derive(Debug, Default)]
pub struct Tracker {
    last_state: Option<TrackerState>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new state when it differs from the previous observation
    pub fn observe(&mut self, status: &PrayerStatus) -> Option<TrackerState> {
        if self.last_state == Some(status.state) {
            return None;
        }
        info!(state = ?status.state, next = %status.next_prayer, "Prayer state changed");
        self.last_state = Some(status.state);
        Some(status.state)
    }

    pub fn reset(&mut self) {
        self.last_state = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convention::{resolve, CalculationConvention, Jurisprudence};
    use crate::schedule::test_support::FakeEphemeris;
    use crate::types::Coordinates;
    use chrono::{Duration, FixedOffset};

    const OFFSET_HOURS: i64 = -5;

    struct Fixture {
        fake: FakeEphemeris,
        tz: FixedOffset,
        bundle: ParameterBundle,
        date: NaiveDate,
        schedule: DaySchedule,
    }

    fn fixture() -> Fixture {
        let fake = FakeEphemeris::new(OFFSET_HOURS);
        let tz = FixedOffset::east_opt((OFFSET_HOURS * 3600) as i32).unwrap();
        let bundle = resolve(CalculationConvention::NorthAmerica, Jurisprudence::Standard);
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let coords = Coordinates::new(40.7128, -74.0060).unwrap();
        let schedule = schedule::build(&fake, &coords, date, &bundle).unwrap();
        Fixture {
            fake,
            tz,
            bundle,
            date,
            schedule,
        }
    }

    impl Fixture {
        fn local(&self, date: NaiveDate, h: u32, m: u32) -> DateTime<Utc> {
            self.fake.at(date, h, m) - Duration::minutes((date - NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()).num_days() % 10)
        }

        fn status(&self, now: DateTime<Utc>) -> PrayerStatus {
            status_at(&self.fake, &self.schedule, &self.bundle, now, &self.tz).unwrap()
        }
    }

    #[test]
    fn test_before_fajr_points_at_todays_fajr() {
        let f = fixture();
        let now = f.local(f.date, 3, 0);
        let status = f.status(now);
        assert_eq!(status.state, TrackerState::BeforeFajr);
        assert_eq!(status.current_prayer, None);
        assert_eq!(status.next_prayer, PrayerName::Fajr);
        assert_eq!(status.next_prayer_instant, f.schedule.instant(PrayerName::Fajr));
        assert!(!status.rebuild_due);
    }

    #[test]
    fn test_windows_follow_obligatory_prayers() {
        let f = fixture();
        let cases = [
            ((6, 0), PrayerName::Fajr, PrayerName::Dhuhr),
            // Sunrise is not a window boundary
            ((9, 0), PrayerName::Fajr, PrayerName::Dhuhr),
            ((13, 0), PrayerName::Dhuhr, PrayerName::Asr),
            ((16, 0), PrayerName::Asr, PrayerName::Maghrib),
            ((19, 0), PrayerName::Maghrib, PrayerName::Isha),
        ];
        for ((h, m), current, next) in cases {
            let status = f.status(f.local(f.date, h, m));
            assert_eq!(status.state, TrackerState::InPrayerWindow(current), "{h}:{m}");
            assert_eq!(status.current_prayer, Some(current));
            assert_eq!(status.next_prayer, next);
            assert_eq!(status.next_prayer_instant, f.schedule.instant(next));
        }
    }

    #[test]
    fn test_boundary_instant_starts_new_window() {
        let f = fixture();
        let asr = f.schedule.instant(PrayerName::Asr);
        assert_eq!(
            f.status(asr - Duration::seconds(1)).state,
            TrackerState::InPrayerWindow(PrayerName::Dhuhr)
        );
        assert_eq!(f.status(asr).state, TrackerState::InPrayerWindow(PrayerName::Asr));
    }

    #[test]
    fn test_isha_window_counts_down_across_midnight() {
        let f = fixture();
        let now = f.local(f.date, 23, 50);
        let calls_before = f.fake.call_count();
        let status = f.status(now);

        let tomorrow = f.date.succ_opt().unwrap();
        let tomorrow_fajr = f.fake.at(tomorrow, 5, 30);
        assert_eq!(status.state, TrackerState::InPrayerWindow(PrayerName::Isha));
        assert_eq!(status.current_prayer, Some(PrayerName::Isha));
        assert_eq!(status.next_prayer, PrayerName::Fajr);
        assert_eq!(status.next_prayer_instant, tomorrow_fajr);
        assert_eq!(status.seconds_remaining as i64, (tomorrow_fajr - now).num_seconds());
        // Tomorrow's schedule was built on demand
        assert!(f.fake.call_count() > calls_before);
    }

    #[test]
    fn test_after_midnight_schedule_is_stale() {
        let f = fixture();
        let tomorrow = f.date.succ_opt().unwrap();
        let now = f.local(tomorrow, 0, 10);
        let status = f.status(now);
        assert_eq!(status.state, TrackerState::AfterIsha);
        assert_eq!(status.current_prayer, None);
        assert_eq!(status.next_prayer, PrayerName::Fajr);
        assert_eq!(status.next_prayer_instant, f.fake.at(tomorrow, 5, 30));
        assert!(status.rebuild_due);
    }

    #[test]
    fn test_countdown_never_negative_and_requests_rebuild() {
        let f = fixture();
        let dhuhr = f.schedule.instant(PrayerName::Dhuhr);
        let status = f.status(dhuhr - Duration::milliseconds(400));
        assert_eq!(status.seconds_remaining, 0);
        assert!(status.rebuild_due);
    }

    #[test]
    fn test_propagates_unavailable_tomorrow() {
        let mut f = fixture();
        f.fake.fail_on = f.date.succ_opt();
        let now = f.local(f.date, 21, 0);
        let err = status_at(&f.fake, &f.schedule, &f.bundle, now, &f.tz).unwrap_err();
        assert!(matches!(err, CoreError::ScheduleUnavailable { .. }));
    }

    #[test]
    fn test_countdown_breakdown() {
        let c = Countdown::from_seconds(3 * 3600 + 25 * 60 + 7);
        assert_eq!((c.hours, c.minutes, c.seconds), (3, 25, 7));
        assert_eq!(c.to_string(), "03:25:07");
    }

    #[test]
    fn test_tracker_reports_transitions_once() {
        let f = fixture();
        let mut tracker = Tracker::new();
        let a = f.status(f.local(f.date, 13, 0));
        let b = f.status(f.local(f.date, 13, 1));
        let c = f.status(f.local(f.date, 16, 0));
        assert_eq!(tracker.observe(&a), Some(TrackerState::InPrayerWindow(PrayerName::Dhuhr)));
        assert_eq!(tracker.observe(&b), None);
        assert_eq!(tracker.observe(&c), Some(TrackerState::InPrayerWindow(PrayerName::Asr)));
    }
}
