use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{labels, validation};
use crate::error::{CoreError, CoreResult};

/// Geographic position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinates")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Unchecked wire form; persisted positions go through `Coordinates::new`
#[derive(Deserialize)]
struct RawCoordinates {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinates> for Coordinates {
    type Error = CoreError;

    fn try_from(raw: RawCoordinates) -> CoreResult<Self> {
        Coordinates::new(raw.latitude, raw.longitude)
    }
}

impl Coordinates {
    /// Validated constructor, used for anything typed in by the user
    pub fn new(latitude: f64, longitude: f64) -> CoreResult<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(CoreError::InvalidManualLocation(format!(
                "coordinates must be finite numbers (got {latitude}, {longitude})"
            )));
        }
        if !(validation::MIN_LATITUDE..=validation::MAX_LATITUDE).contains(&latitude) {
            return Err(CoreError::InvalidManualLocation(format!(
                "latitude {latitude} outside [{}, {}]",
                validation::MIN_LATITUDE,
                validation::MAX_LATITUDE
            )));
        }
        if !(validation::MIN_LONGITUDE..=validation::MAX_LONGITUDE).contains(&longitude) {
            return Err(CoreError::InvalidManualLocation(format!(
                "longitude {longitude} outside [{}, {}]",
                validation::MIN_LONGITUDE,
                validation::MAX_LONGITUDE
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Parse a manual location from raw text fields
    pub fn parse(latitude: &str, longitude: &str) -> CoreResult<Self> {
        let lat = latitude.trim().parse::<f64>().map_err(|_| {
            CoreError::InvalidManualLocation(format!("latitude '{latitude}' is not a number"))
        })?;
        let lon = longitude.trim().parse::<f64>().map_err(|_| {
            CoreError::InvalidManualLocation(format!("longitude '{longitude}' is not a number"))
        })?;
        Self::new(lat, lon)
    }

    /// Bit-exact key for memoization (f64 is not Hash)
    pub(crate) fn cache_key(&self) -> (u64, u64) {
        (self.latitude.to_bits(), self.longitude.to_bits())
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// A resolved place as supplied by GPS, city search or manual entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub coordinates: Coordinates,
    pub city_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

impl Location {
    /// Manual entry; a blank city name becomes "Custom Location"
    pub fn manual(latitude: &str, longitude: &str, city_name: &str) -> CoreResult<Self> {
        let coordinates = Coordinates::parse(latitude, longitude)?;
        let city_name = if city_name.trim().is_empty() {
            labels::DEFAULT_CITY.to_string()
        } else {
            city_name.trim().to_string()
        };
        Ok(Self {
            coordinates,
            city_name,
            country_code: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrayerName {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
    MiddleOfNight,
    LastThirdOfNight,
}

impl PrayerName {
    /// The five obligatory prayers in daily order
    pub const OBLIGATORY: [PrayerName; 5] = [
        PrayerName::Fajr,
        PrayerName::Dhuhr,
        PrayerName::Asr,
        PrayerName::Maghrib,
        PrayerName::Isha,
    ];

    /// Everything a schedule carries, in display order
    pub const ALL: [PrayerName; 8] = [
        PrayerName::Fajr,
        PrayerName::Sunrise,
        PrayerName::Dhuhr,
        PrayerName::Asr,
        PrayerName::Maghrib,
        PrayerName::Isha,
        PrayerName::MiddleOfNight,
        PrayerName::LastThirdOfNight,
    ];

    pub fn is_obligatory(&self) -> bool {
        Self::OBLIGATORY.contains(self)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PrayerName::Fajr => "Fajr",
            PrayerName::Sunrise => "Sunrise",
            PrayerName::Dhuhr => "Dhuhr",
            PrayerName::Asr => "Asr",
            PrayerName::Maghrib => "Maghrib",
            PrayerName::Isha => "Isha",
            PrayerName::MiddleOfNight => "Middle of Night",
            PrayerName::LastThirdOfNight => "Last Third",
        }
    }

    /// The obligatory prayer that follows this one on the same day, if any
    pub fn next_obligatory(&self) -> Option<PrayerName> {
        match self {
            PrayerName::Fajr | PrayerName::Sunrise => Some(PrayerName::Dhuhr),
            PrayerName::Dhuhr => Some(PrayerName::Asr),
            PrayerName::Asr => Some(PrayerName::Maghrib),
            PrayerName::Maghrib => Some(PrayerName::Isha),
            PrayerName::Isha | PrayerName::MiddleOfNight | PrayerName::LastThirdOfNight => None,
        }
    }
}

impl fmt::Display for PrayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for PrayerName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
        PrayerName::ALL
            .into_iter()
            .find(|p| format!("{p:?}").to_ascii_lowercase() == wanted)
            .ok_or_else(|| format!("unknown prayer '{s}'"))
    }
}

/// One named instant in a day's schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrayerInstant {
    pub name: PrayerName,
    pub timestamp: DateTime<Utc>,
    pub is_optional: bool,
}

impl PrayerInstant {
    pub fn new(name: PrayerName, timestamp: DateTime<Utc>) -> Self {
        Self {
            name,
            timestamp,
            is_optional: !name.is_obligatory(),
        }
    }
}
