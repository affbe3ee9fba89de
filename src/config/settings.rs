//! Settings schema and hardcoded defaults
//!
//! Field names are camelCase on disk so older saved JSON keeps loading.

use serde::{Deserialize, Serialize};

use crate::constants::{config::SETTINGS_VERSION, notifications};
use crate::convention::{self, CalculationConvention, Jurisprudence, ParameterBundle};
use crate::travel::TravelConfig;
use crate::types::PrayerName;

/// Top-level settings aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub version: u32,
    pub calculation_method: CalculationConvention,
    pub asr_calculation: Jurisprudence,
    pub optional_prayers: OptionalPrayers,
    pub notifications: NotificationSettings,
    pub jumuah: JumuahSettings,
    pub travel: TravelConfig,
    pub display: DisplaySettings,
}

impl Settings {
    pub fn parameter_bundle(&self) -> ParameterBundle {
        convention::resolve(self.calculation_method, self.asr_calculation)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            calculation_method: CalculationConvention::NorthAmerica,
            asr_calculation: Jurisprudence::Standard,
            optional_prayers: OptionalPrayers::default(),
            notifications: NotificationSettings::default(),
            jumuah: JumuahSettings::default(),
            travel: TravelConfig::default(),
            display: DisplaySettings::default(),
        }
    }
}

/// Visibility of the non-obligatory schedule entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionalPrayers {
    pub show_sunrise: bool,
    pub show_middle_of_night: bool,
    pub show_last_third_of_night: bool,
}

impl Default for OptionalPrayers {
    fn default() -> Self {
        Self {
            show_sunrise: true,
            show_middle_of_night: true,
            show_last_third_of_night: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrayerNotification {
    pub enabled: bool,
    pub reminder_minutes: u32,
    pub at_prayer_time: bool,
    pub sound: String,
}

impl Default for PrayerNotification {
    fn default() -> Self {
        Self {
            enabled: true,
            reminder_minutes: notifications::DEFAULT_REMINDER_MINUTES,
            at_prayer_time: true,
            sound: notifications::DEFAULT_SOUND.to_string(),
        }
    }
}

/// Per-prayer notification entries (sunrise included, night instants not)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerNotifications {
    pub fajr: PrayerNotification,
    pub sunrise: PrayerNotification,
    pub dhuhr: PrayerNotification,
    pub asr: PrayerNotification,
    pub maghrib: PrayerNotification,
    pub isha: PrayerNotification,
}

impl PrayerNotifications {
    pub const NAMES: [PrayerName; 6] = [
        PrayerName::Fajr,
        PrayerName::Sunrise,
        PrayerName::Dhuhr,
        PrayerName::Asr,
        PrayerName::Maghrib,
        PrayerName::Isha,
    ];

    pub fn get(&self, prayer: PrayerName) -> Option<&PrayerNotification> {
        match prayer {
            PrayerName::Fajr => Some(&self.fajr),
            PrayerName::Sunrise => Some(&self.sunrise),
            PrayerName::Dhuhr => Some(&self.dhuhr),
            PrayerName::Asr => Some(&self.asr),
            PrayerName::Maghrib => Some(&self.maghrib),
            PrayerName::Isha => Some(&self.isha),
            PrayerName::MiddleOfNight | PrayerName::LastThirdOfNight => None,
        }
    }

    pub fn get_mut(&mut self, prayer: PrayerName) -> Option<&mut PrayerNotification> {
        match prayer {
            PrayerName::Fajr => Some(&mut self.fajr),
            PrayerName::Sunrise => Some(&mut self.sunrise),
            PrayerName::Dhuhr => Some(&mut self.dhuhr),
            PrayerName::Asr => Some(&mut self.asr),
            PrayerName::Maghrib => Some(&mut self.maghrib),
            PrayerName::Isha => Some(&mut self.isha),
            PrayerName::MiddleOfNight | PrayerName::LastThirdOfNight => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (PrayerName, &PrayerNotification)> {
        Self::NAMES
            .into_iter()
            .filter_map(move |name| self.get(name).map(|n| (name, n)))
    }
}

impl Default for PrayerNotifications {
    fn default() -> Self {
        Self {
            fajr: PrayerNotification {
                sound: notifications::FAJR_SOUND.to_string(),
                ..PrayerNotification::default()
            },
            sunrise: PrayerNotification {
                enabled: false,
                ..PrayerNotification::default()
            },
            dhuhr: PrayerNotification::default(),
            asr: PrayerNotification::default(),
            maghrib: PrayerNotification::default(),
            isha: PrayerNotification::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub enabled: bool,
    pub default_sound: String,
    pub default_reminder_minutes: u32,
    pub prayers: PrayerNotifications,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_sound: notifications::DEFAULT_SOUND.to_string(),
            default_reminder_minutes: notifications::DEFAULT_REMINDER_MINUTES,
            prayers: PrayerNotifications::default(),
        }
    }
}

/// One Friday slot, local wall-clock "HH:MM"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JumuahTime {
    pub khutbah: String,
    pub iqamah: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JumuahSettings {
    pub enabled: bool,
    pub masjid_name: String,
    pub times: Vec<JumuahTime>,
    pub reminder_minutes: u32,
}

impl Default for JumuahSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            masjid_name: String::new(),
            times: vec![JumuahTime {
                khutbah: notifications::JUMUAH_KHUTBAH.to_string(),
                iqamah: notifications::JUMUAH_IQAMAH.to_string(),
            }],
            reminder_minutes: notifications::JUMUAH_REMINDER_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySettings {
    pub show_current_prayer: bool,
    pub show_next_prayer: bool,
    pub show_sunnah_card: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_current_prayer: true,
            show_next_prayer: true,
            show_sunnah_card: true,
        }
    }
}
