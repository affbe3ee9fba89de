//! Daily schedule builder
//!
//! Wraps the ephemeris and derives the two night instants, which need Fajr
//! of the following day. A schedule is rebuilt, never mutated, whenever any
//! of its inputs change.

use chrono::{DateTime, Days, NaiveDate, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::config::OptionalPrayers;
use crate::convention::ParameterBundle;
use crate::ephemeris::Ephemeris;
use crate::error::{CoreError, CoreResult};
use crate::types::{Coordinates, PrayerInstant, PrayerName};

/// Ordered prayer and sunnah instants for one day at one place
#[derive(Debug, Clone, PartialEq)]
pub struct DaySchedule {
    date: NaiveDate,
    coordinates: Coordinates,
    /// Indexed by `PrayerName` discriminant
    prayers: [PrayerInstant; 8],
}

impl DaySchedule {
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    /// All entries ordered by timestamp
    ///
    /// At high latitudes Isha can fall after the middle of the night, so the
    /// order is not fixed.
    pub fn prayers(&self) -> Vec<PrayerInstant> {
        let mut prayers = self.prayers.to_vec();
        prayers.sort_by_key(|p| p.timestamp);
        prayers
    }

    pub fn instant(&self, name: PrayerName) -> DateTime<Utc> {
        self.prayers[name as usize].timestamp
    }

    pub fn obligatory(&self) -> impl Iterator<Item = &PrayerInstant> {
        self.prayers.iter().filter(|p| !p.is_optional)
    }

    /// Entries the user has chosen to see
    pub fn visible(&self, optional: &OptionalPrayers) -> Vec<PrayerInstant> {
        let mut prayers = self.prayers();
        prayers.retain(|p| match p.name {
            PrayerName::Sunrise => optional.show_sunrise,
            PrayerName::MiddleOfNight => optional.show_middle_of_night,
            PrayerName::LastThirdOfNight => optional.show_last_third_of_night,
            _ => true,
        });
        prayers
    }
}

/// Build the schedule for `date`; calls the ephemeris for `date` and `date + 1`
pub fn build(
    ephemeris: &dyn Ephemeris,
    coords: &Coordinates,
    date: NaiveDate,
    bundle: &ParameterBundle,
) -> CoreResult<DaySchedule> {
    let today = ephemeris.compute_day_times(coords, date, bundle)?;
    let next_date = date
        .checked_add_days(Days::new(1))
        .ok_or_else(|| CoreError::schedule_unavailable(date, "date out of range"))?;
    let tomorrow = ephemeris.compute_day_times(coords, next_date, bundle)?;

    let night = tomorrow.fajr - today.maghrib;
    let middle_of_night = today.maghrib + night / 2;
    let last_third_of_night = tomorrow.fajr - night / 3;

    let prayers = [
        PrayerInstant::new(PrayerName::Fajr, today.fajr),
        PrayerInstant::new(PrayerName::Sunrise, today.sunrise),
        PrayerInstant::new(PrayerName::Dhuhr, today.dhuhr),
        PrayerInstant::new(PrayerName::Asr, today.asr),
        PrayerInstant::new(PrayerName::Maghrib, today.maghrib),
        PrayerInstant::new(PrayerName::Isha, today.isha),
        PrayerInstant::new(PrayerName::MiddleOfNight, middle_of_night),
        PrayerInstant::new(PrayerName::LastThirdOfNight, last_third_of_night),
    ];

    debug!(%date, coordinates = %coords, "Built prayer schedule");
    Ok(DaySchedule {
        date,
        coordinates: *coords,
        prayers,
    })
}

type CacheKey = ((u64, u64), NaiveDate);

/// Memoizes built schedules on (coordinates, date, parameter bundle)
///
/// Owned by the driver; holds at most a few days so it never grows unbounded.
#[derive(Debug, Default)]
pub struct ScheduleCache {
    entries: HashMap<CacheKey, (ParameterBundle, DaySchedule)>,
}

impl ScheduleCache {
    const MAX_ENTRIES: usize = 8;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(
        &mut self,
        ephemeris: &dyn Ephemeris,
        coords: &Coordinates,
        date: NaiveDate,
        bundle: &ParameterBundle,
    ) -> CoreResult<DaySchedule> {
        let key = (coords.cache_key(), date);
        if let Some((cached_bundle, schedule)) = self.entries.get(&key)
            && cached_bundle == bundle
        {
            return Ok(schedule.clone());
        }

        let schedule = build(ephemeris, coords, date, bundle)?;
        if self.entries.len() >= Self::MAX_ENTRIES {
            self.entries.clear();
        }
        self.entries.insert(key, (*bundle, schedule.clone()));
        Ok(schedule)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
