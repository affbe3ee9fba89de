//! Travel (safar) detection and the resulting Qasr/Jama adjustments.
//!
//! [`evaluate`] is pure: stamping and clearing `travel_start_date` is done by
//! the settings store when the user changes travel configuration.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::travel::{DEFAULT_DISTANCE_THRESHOLD_KM, EARTH_RADIUS_KM, UNLIMITED_TRAVEL_DAYS};
use crate::types::{Coordinates, Location, PrayerName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelOverride {
    #[default]
    Auto,
    ForceOn,
    ForceOff,
}

impl std::str::FromStr for TravelOverride {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(TravelOverride::Auto),
            "force_on" | "on" => Ok(TravelOverride::ForceOn),
            "force_off" | "off" => Ok(TravelOverride::ForceOff),
            _ => Err(format!("unknown travel override '{s}'")),
        }
    }
}

/// Which pair of prayers a Jama toggle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JamaPair {
    DhuhrAsr,
    MaghribIsha,
}

impl std::str::FromStr for JamaPair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_', '+', ' '], "").as_str() {
            "dhuhrasr" => Ok(JamaPair::DhuhrAsr),
            "maghribisha" => Ok(JamaPair::MaghribIsha),
            _ => Err(format!("unknown prayer pair '{s}'")),
        }
    }
}

/// Persisted travel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelConfig {
    pub enabled: bool,
    pub home_base: Option<Location>,
    #[serde(rename = "override")]
    pub override_mode: TravelOverride,
    pub distance_threshold_km: f64,
    pub jama_dhuhr_asr: bool,
    pub jama_maghrib_isha: bool,
    /// 0 = unlimited
    pub max_travel_days: u32,
    pub travel_start_date: Option<NaiveDate>,
}

impl Default for TravelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            home_base: None,
            override_mode: TravelOverride::Auto,
            distance_threshold_km: DEFAULT_DISTANCE_THRESHOLD_KM,
            jama_dhuhr_asr: false,
            jama_maghrib_isha: false,
            max_travel_days: UNLIMITED_TRAVEL_DAYS,
            travel_start_date: None,
        }
    }
}

/// Qasr flags; Fajr and Maghrib are never shortened so they have no flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QasrFlags {
    pub dhuhr: bool,
    pub asr: bool,
    pub isha: bool,
}

impl QasrFlags {
    const ALL: QasrFlags = QasrFlags {
        dhuhr: true,
        asr: true,
        isha: true,
    };

    pub fn applies_to(&self, prayer: PrayerName) -> bool {
        match prayer {
            PrayerName::Dhuhr => self.dhuhr,
            PrayerName::Asr => self.asr,
            PrayerName::Isha => self.isha,
            _ => false,
        }
    }
}

/// Derived travel status, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelState {
    pub is_traveling: bool,
    pub distance_from_home_km: Option<f64>,
    pub is_auto_detected: bool,
    pub qasr: QasrFlags,
    pub jama_dhuhr_asr: bool,
    pub jama_maghrib_isha: bool,
}

/// Haversine distance on a spherical Earth
pub fn great_circle_distance_km(a: &Coordinates, b: &Coordinates) -> f64 {
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_KM * c
}

fn travel_expired(config: &TravelConfig, now: DateTime<Utc>) -> bool {
    match config.travel_start_date {
        Some(start) if config.max_travel_days > 0 => {
            let started = start.and_time(NaiveTime::MIN).and_utc();
            (now - started).num_days() > config.max_travel_days as i64
        }
        _ => false,
    }
}

/// Derive travel status from configuration and the current position
pub fn evaluate(config: &TravelConfig, current: &Coordinates, now: DateTime<Utc>) -> TravelState {
    let home = match &config.home_base {
        Some(home) if config.enabled && config.override_mode != TravelOverride::ForceOff => home,
        _ => return TravelState::default(),
    };

    let distance = great_circle_distance_km(&home.coordinates, current);

    let (mut is_traveling, is_auto_detected) = match config.override_mode {
        TravelOverride::ForceOn => (true, false),
        _ => {
            let detected = distance >= config.distance_threshold_km;
            (detected, detected)
        }
    };

    // Expiry wins over both auto-detection and force_on
    if is_traveling && travel_expired(config, now) {
        is_traveling = false;
    }

    if !is_traveling {
        return TravelState {
            distance_from_home_km: Some(distance),
            ..TravelState::default()
        };
    }

    TravelState {
        is_traveling: true,
        distance_from_home_km: Some(distance),
        is_auto_detected,
        qasr: QasrFlags::ALL,
        jama_dhuhr_asr: config.jama_dhuhr_asr,
        jama_maghrib_isha: config.jama_maghrib_isha,
    }
}

/// Obligatory rak'ah count, halved for the four-unit prayers under Qasr
pub fn rakah_count(prayer: PrayerName, state: &TravelState) -> Option<u8> {
    let full = match prayer {
        PrayerName::Fajr => 2,
        PrayerName::Maghrib => 3,
        PrayerName::Dhuhr | PrayerName::Asr | PrayerName::Isha => 4,
        _ => return None,
    };
    Some(if state.qasr.applies_to(prayer) { 2 } else { full })
}

/// Voluntary prayers that are kept while traveling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelSunnah {
    /// The two rak'ah before Fajr
    FajrSunnah,
    Witr,
}

pub fn sunnah_kept_while_traveling() -> [TravelSunnah; 2] {
    [TravelSunnah::FajrSunnah, TravelSunnah::Witr]
}
