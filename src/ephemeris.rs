//! Ephemeris boundary: raw prayer instants from solar position.
//!
//! The schedule builder only talks to the [`Ephemeris`] trait. [`SolarEphemeris`]
//! is the built-in implementation using the usual low-precision solar model
//! (declination and equation of time from the day number), which is accurate
//! to about a minute at normal latitudes.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::constants::kaaba;
use crate::convention::{HighLatitudeRule, ParameterBundle};
use crate::error::{CoreError, CoreResult};
use crate::types::Coordinates;

/// Sun altitude at sunrise/sunset (refraction + solar radius)
const SUNRISE_ALTITUDE: f64 = -0.833;

/// Julian date of 2000-01-01 12:00 TT
const J2000: f64 = 2451545.0;

/// The six raw instants of one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayTimes {
    pub fajr: DateTime<Utc>,
    pub sunrise: DateTime<Utc>,
    pub dhuhr: DateTime<Utc>,
    pub asr: DateTime<Utc>,
    pub maghrib: DateTime<Utc>,
    pub isha: DateTime<Utc>,
}

pub trait Ephemeris {
    /// Raw instants for `date` at `coords`; fails near the poles
    fn compute_day_times(
        &self,
        coords: &Coordinates,
        date: NaiveDate,
        bundle: &ParameterBundle,
    ) -> CoreResult<DayTimes>;

    /// Bearing to the Kaaba, clockwise from true north, in [0, 360)
    fn qibla_bearing(&self, coords: &Coordinates) -> f64 {
        qibla_bearing(coords)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SolarEphemeris;

struct SunPosition {
    declination: f64,
    /// Hours
    equation_of_time: f64,
}

fn fix_angle(a: f64) -> f64 {
    a.rem_euclid(360.0)
}

fn sun_position(jd: f64) -> SunPosition {
    let d = jd - J2000;
    let g = fix_angle(357.529 + 0.98560028 * d).to_radians();
    let q = fix_angle(280.459 + 0.98564736 * d);
    let l = fix_angle(q + 1.915 * g.sin() + 0.020 * (2.0 * g).sin()).to_radians();
    let e = (23.439 - 0.00000036 * d).to_radians();

    let ra = (e.cos() * l.sin()).atan2(l.cos()).to_degrees() / 15.0;
    let mut eqt = q / 15.0 - ra.rem_euclid(24.0);
    if eqt > 12.0 {
        eqt -= 24.0;
    } else if eqt < -12.0 {
        eqt += 24.0;
    }

    SunPosition {
        declination: (e.sin() * l.sin()).asin().to_degrees(),
        equation_of_time: eqt,
    }
}

fn julian_day(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN);
    // 2000-01-01 00:00 UT is JD 2451544.5
    (date - epoch).num_days() as f64 + 2451544.5
}

/// Hours from transit until the sun reaches `altitude` degrees
fn hour_angle(latitude: f64, declination: f64, altitude: f64) -> Option<f64> {
    let (lat, dec) = (latitude.to_radians(), declination.to_radians());
    let cos_h = (altitude.to_radians().sin() - lat.sin() * dec.sin()) / (lat.cos() * dec.cos());
    if !(-1.0..=1.0).contains(&cos_h) {
        return None;
    }
    Some(cos_h.acos().to_degrees() / 15.0)
}

fn night_portion(rule: HighLatitudeRule, angle: f64) -> f64 {
    match rule {
        HighLatitudeRule::MiddleOfTheNight => 1.0 / 2.0,
        HighLatitudeRule::SeventhOfTheNight => 1.0 / 7.0,
        HighLatitudeRule::TwilightAngle => angle / 60.0,
    }
}

/// Hours since `date` 00:00 UTC, rounded to the nearest minute
fn to_instant(date: NaiveDate, hours: f64, adjust_minutes: i32) -> DateTime<Utc> {
    let minutes = (hours * 60.0).round() as i64 + adjust_minutes as i64;
    date.and_time(chrono::NaiveTime::MIN).and_utc() + Duration::minutes(minutes)
}

impl Ephemeris for SolarEphemeris {
    fn compute_day_times(
        &self,
        coords: &Coordinates,
        date: NaiveDate,
        bundle: &ParameterBundle,
    ) -> CoreResult<DayTimes> {
        let lat = coords.latitude;
        let jd = julian_day(date);

        // One refinement pass: sample the sun at approximate local noon
        let approx = sun_position(jd + 0.5 - coords.longitude / 360.0);
        let transit = 12.0 - approx.equation_of_time - coords.longitude / 15.0;
        let sun = sun_position(jd + transit / 24.0);
        let transit = 12.0 - sun.equation_of_time - coords.longitude / 15.0;
        let dec = sun.declination;

        let rise_set = hour_angle(lat, dec, SUNRISE_ALTITUDE).ok_or_else(|| {
            CoreError::schedule_unavailable(date, "the sun does not rise or set at this latitude")
        })?;
        let sunrise = transit - rise_set;
        let sunset = transit + rise_set;
        let night = 24.0 - (sunset - sunrise);

        let shadow_altitude = (1.0 / (bundle.asr_shadow_factor + (lat - dec).abs().to_radians().tan()))
            .atan()
            .to_degrees();
        let asr = transit
            + hour_angle(lat, dec, shadow_altitude).ok_or_else(|| {
                CoreError::schedule_unavailable(date, "Asr shadow length is never reached")
            })?;

        let safe_fajr = sunrise - night_portion(bundle.high_latitude_rule, bundle.fajr_angle) * night;
        let fajr = match hour_angle(lat, dec, -bundle.fajr_angle) {
            Some(h) if transit - h >= safe_fajr => transit - h,
            _ => safe_fajr,
        };

        let maghrib = match bundle.maghrib_angle {
            Some(angle) => hour_angle(lat, dec, -angle).map_or(sunset, |h| transit + h),
            None => sunset,
        };

        let isha = match bundle.isha_interval_minutes {
            Some(interval) => maghrib + interval as f64 / 60.0,
            None => {
                let safe_isha = sunset + night_portion(bundle.high_latitude_rule, bundle.isha_angle) * night;
                match hour_angle(lat, dec, -bundle.isha_angle) {
                    Some(h) if transit + h <= safe_isha => transit + h,
                    _ => safe_isha,
                }
            }
        };

        let adj = &bundle.adjustments;
        let times = DayTimes {
            fajr: to_instant(date, fajr, adj.fajr),
            sunrise: to_instant(date, sunrise, adj.sunrise),
            dhuhr: to_instant(date, transit, adj.dhuhr),
            asr: to_instant(date, asr, adj.asr),
            maghrib: to_instant(date, maghrib, adj.maghrib),
            isha: to_instant(date, isha, adj.isha),
        };

        let ordered = [
            times.fajr,
            times.sunrise,
            times.dhuhr,
            times.asr,
            times.maghrib,
            times.isha,
        ];
        if ordered.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CoreError::schedule_unavailable(
                date,
                "prayer instants collapse at this latitude",
            ));
        }
        Ok(times)
    }
}

/// Initial great-circle bearing from `coords` to the Kaaba
pub fn qibla_bearing(coords: &Coordinates) -> f64 {
    let lat = coords.latitude.to_radians();
    let k_lat = kaaba::LATITUDE.to_radians();
    let d_lon = (kaaba::LONGITUDE - coords.longitude).to_radians();
    let y = d_lon.sin();
    let x = lat.cos() * k_lat.tan() - lat.sin() * d_lon.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}
