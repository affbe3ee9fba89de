//! Single owner of the in-memory settings
//!
//! Every named update applies a partial patch and immediately re-persists.
//! The in-memory value is the source of truth: a failed write is logged and
//! the change is kept.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{error, info, warn};

use super::migrate::migrate;
use super::settings::{DisplaySettings, JumuahTime, OptionalPrayers, Settings};
use crate::constants::config::SETTINGS_KEY;
use crate::convention::{CalculationConvention, Jurisprudence};
use crate::persistence::KeyValueStore;
use crate::travel::{JamaPair, TravelOverride};
use crate::types::{Location, PrayerName};

/// Which optional prayer's visibility to change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionalPrayer {
    Sunrise,
    MiddleOfNight,
    LastThirdOfNight,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrayerNotificationPatch {
    pub enabled: Option<bool>,
    pub reminder_minutes: Option<u32>,
    pub at_prayer_time: Option<bool>,
    pub sound: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JumuahPatch {
    pub enabled: Option<bool>,
    pub masjid_name: Option<String>,
    pub times: Option<Vec<JumuahTime>>,
    pub reminder_minutes: Option<u32>,
}

/// `Some(None)` clears a nullable field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TravelPatch {
    pub enabled: Option<bool>,
    pub home_base: Option<Option<Location>>,
    pub override_mode: Option<TravelOverride>,
    pub distance_threshold_km: Option<f64>,
    pub jama_dhuhr_asr: Option<bool>,
    pub jama_maghrib_isha: Option<bool>,
    pub max_travel_days: Option<u32>,
    pub travel_start_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DisplayPatch {
    pub show_current_prayer: Option<bool>,
    pub show_next_prayer: Option<bool>,
    pub show_sunnah_card: Option<bool>,
}

fn apply<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

pub struct SettingsStore<S: KeyValueStore> {
    settings: Settings,
    store: S,
}

impl<S: KeyValueStore> SettingsStore<S> {
    /// Load once at startup; unreadable data falls back to defaults
    pub fn load(store: S) -> Self {
        let defaults = Settings::default();
        let settings = match store.get(SETTINGS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(value) => {
                    info!("Loaded persisted settings");
                    migrate(&value, &defaults)
                }
                Err(e) => {
                    error!(error = %e, "Failed to parse persisted settings, using defaults");
                    defaults
                }
            },
            Ok(None) => {
                info!("No persisted settings found, using defaults");
                defaults
            }
            Err(e) => {
                error!(error = %e, "Failed to load settings, using defaults");
                defaults
            }
        };

        let mut this = Self { settings, store };
        // Write back so the stored shape matches the current schema
        this.persist();
        this
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    fn persist(&mut self) {
        let json = match serde_json::to_string(&self.settings) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "Failed to serialize settings");
                return;
            }
        };
        if let Err(e) = self.store.set(SETTINGS_KEY, &json) {
            error!(error = %e, "Failed to save settings");
        }
    }

    fn update(&mut self, f: impl FnOnce(&mut Settings)) -> &Settings {
        f(&mut self.settings);
        self.persist();
        &self.settings
    }

    pub fn update_calculation_method(&mut self, method: CalculationConvention) -> &Settings {
        info!(method = ?method, "Updating calculation method");
        self.update(|s| s.calculation_method = method)
    }

    pub fn update_jurisprudence(&mut self, jurisprudence: Jurisprudence) -> &Settings {
        info!(jurisprudence = ?jurisprudence, "Updating Asr jurisprudence");
        self.update(|s| s.asr_calculation = jurisprudence)
    }

    pub fn update_optional_prayers(&mut self, which: OptionalPrayer, show: bool) -> &Settings {
        self.update(|s| {
            let OptionalPrayers {
                show_sunrise,
                show_middle_of_night,
                show_last_third_of_night,
            } = &mut s.optional_prayers;
            match which {
                OptionalPrayer::Sunrise => *show_sunrise = show,
                OptionalPrayer::MiddleOfNight => *show_middle_of_night = show,
                OptionalPrayer::LastThirdOfNight => *show_last_third_of_night = show,
            }
        })
    }

    pub fn update_notifications(&mut self, enabled: bool) -> &Settings {
        self.update(|s| s.notifications.enabled = enabled)
    }

    pub fn update_default_sound(&mut self, sound: &str) -> &Settings {
        self.update(|s| s.notifications.default_sound = sound.to_string())
    }

    pub fn update_default_reminder_minutes(&mut self, minutes: u32) -> &Settings {
        self.update(|s| s.notifications.default_reminder_minutes = minutes)
    }

    pub fn update_prayer_notification(
        &mut self,
        prayer: PrayerName,
        patch: PrayerNotificationPatch,
    ) -> &Settings {
        if self.settings.notifications.prayers.get(prayer).is_none() {
            warn!(prayer = %prayer, "Prayer has no notification settings, ignoring update");
            return &self.settings;
        }
        self.update(|s| {
            if let Some(entry) = s.notifications.prayers.get_mut(prayer) {
                apply(&mut entry.enabled, patch.enabled);
                apply(&mut entry.reminder_minutes, patch.reminder_minutes);
                apply(&mut entry.at_prayer_time, patch.at_prayer_time);
                apply(&mut entry.sound, patch.sound);
            }
        })
    }

    pub fn update_jumuah(&mut self, patch: JumuahPatch) -> &Settings {
        self.update(|s| {
            apply(&mut s.jumuah.enabled, patch.enabled);
            apply(&mut s.jumuah.masjid_name, patch.masjid_name);
            apply(&mut s.jumuah.times, patch.times);
            apply(&mut s.jumuah.reminder_minutes, patch.reminder_minutes);
        })
    }

    pub fn update_travel(&mut self, patch: TravelPatch) -> &Settings {
        self.update(|s| {
            let t = &mut s.travel;
            apply(&mut t.enabled, patch.enabled);
            apply(&mut t.home_base, patch.home_base);
            apply(&mut t.override_mode, patch.override_mode);
            apply(&mut t.distance_threshold_km, patch.distance_threshold_km);
            apply(&mut t.jama_dhuhr_asr, patch.jama_dhuhr_asr);
            apply(&mut t.jama_maghrib_isha, patch.jama_maghrib_isha);
            apply(&mut t.max_travel_days, patch.max_travel_days);
            apply(&mut t.travel_start_date, patch.travel_start_date);
        })
    }

    pub fn update_display(&mut self, patch: DisplayPatch) -> &Settings {
        self.update(|s| {
            let DisplaySettings {
                show_current_prayer,
                show_next_prayer,
                show_sunnah_card,
            } = &mut s.display;
            apply(show_current_prayer, patch.show_current_prayer);
            apply(show_next_prayer, patch.show_next_prayer);
            apply(show_sunnah_card, patch.show_sunnah_card);
        })
    }

    pub fn set_home_base(&mut self, home: Location) -> &Settings {
        info!(city = %home.city_name, coordinates = %home.coordinates, "Setting home base");
        self.update_travel(TravelPatch {
            home_base: Some(Some(home)),
            ..TravelPatch::default()
        })
    }

    /// Clearing the home base also forgets when travel started
    pub fn clear_home_base(&mut self) -> &Settings {
        info!("Clearing home base");
        self.update_travel(TravelPatch {
            home_base: Some(None),
            travel_start_date: Some(None),
            ..TravelPatch::default()
        })
    }

    /// Forcing travel on stamps the start date if none is set
    ///
    /// Start dates are UTC calendar days, matching how expiry reads them.
    pub fn set_travel_override(&mut self, mode: TravelOverride, now: DateTime<Utc>) -> &Settings {
        let mut patch = TravelPatch {
            override_mode: Some(mode),
            ..TravelPatch::default()
        };
        if mode == TravelOverride::ForceOn && self.settings.travel.travel_start_date.is_none() {
            patch.travel_start_date = Some(Some(now.date_naive()));
        }
        info!(mode = ?mode, "Setting travel override");
        self.update_travel(patch)
    }

    /// Enabling travel stamps the start date if none is set
    pub fn toggle_travel_enabled(&mut self, now: DateTime<Utc>) -> &Settings {
        let enabled = !self.settings.travel.enabled;
        let mut patch = TravelPatch {
            enabled: Some(enabled),
            ..TravelPatch::default()
        };
        if enabled && self.settings.travel.travel_start_date.is_none() {
            patch.travel_start_date = Some(Some(now.date_naive()));
        }
        info!(enabled, "Toggling travel mode");
        self.update_travel(patch)
    }

    pub fn toggle_jama(&mut self, pair: JamaPair) -> &Settings {
        let patch = match pair {
            JamaPair::DhuhrAsr => TravelPatch {
                jama_dhuhr_asr: Some(!self.settings.travel.jama_dhuhr_asr),
                ..TravelPatch::default()
            },
            JamaPair::MaghribIsha => TravelPatch {
                jama_maghrib_isha: Some(!self.settings.travel.jama_maghrib_isha),
                ..TravelPatch::default()
            },
        };
        self.update_travel(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::types::Coordinates;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn now() -> DateTime<Utc> {
        today().and_hms_opt(12, 0, 0).unwrap().and_utc()
    }

    fn home() -> Location {
        Location {
            coordinates: Coordinates::new(40.7128, -74.0060).unwrap(),
            city_name: "New York".to_string(),
            country_code: Some("US".to_string()),
        }
    }

    fn stored(store: &SettingsStore<MemoryStore>) -> Settings {
        serde_json::from_str(store.store().raw(SETTINGS_KEY).unwrap()).unwrap()
    }

    #[test]
    fn test_first_run_persists_defaults() {
        let store = SettingsStore::load(MemoryStore::new());
        assert_eq!(store.settings(), &Settings::default());
        assert_eq!(stored(&store), Settings::default());
    }

    #[test]
    fn test_load_migrates_legacy_data() {
        let raw = r#"{"calculationMethod":"Egyptian","notifications":{"prayers":{"fajr":false}}}"#;
        let store = SettingsStore::load(MemoryStore::new().with_value(SETTINGS_KEY, raw));
        assert_eq!(store.settings().calculation_method, CalculationConvention::Egyptian);
        assert!(!store.settings().notifications.prayers.fajr.enabled);
        assert_eq!(stored(&store).travel, Settings::default().travel);
    }

    #[test]
    fn test_corrupt_json_falls_back_to_defaults() {
        let store = SettingsStore::load(MemoryStore::new().with_value(SETTINGS_KEY, "{not json"));
        assert_eq!(store.settings(), &Settings::default());
    }

    #[test]
    fn test_every_update_is_persisted() {
        let mut store = SettingsStore::load(MemoryStore::new());
        store.update_calculation_method(CalculationConvention::Turkey);
        assert_eq!(stored(&store).calculation_method, CalculationConvention::Turkey);

        store.update_jurisprudence(Jurisprudence::Hanafi);
        store.update_optional_prayers(OptionalPrayer::Sunrise, false);
        store.update_notifications(false);
        store.update_default_sound("soft");
        store.update_default_reminder_minutes(10);
        store.update_display(DisplayPatch {
            show_sunnah_card: Some(false),
            ..DisplayPatch::default()
        });
        let s = stored(&store);
        assert_eq!(s.asr_calculation, Jurisprudence::Hanafi);
        assert!(!s.optional_prayers.show_sunrise);
        assert!(s.optional_prayers.show_middle_of_night);
        assert!(!s.notifications.enabled);
        assert_eq!(s.notifications.default_sound, "soft");
        assert_eq!(s.notifications.default_reminder_minutes, 10);
        assert!(!s.display.show_sunnah_card);
        assert!(s.display.show_next_prayer);
    }

    #[test]
    fn test_prayer_notification_patch_merges() {
        let mut store = SettingsStore::load(MemoryStore::new());
        store.update_prayer_notification(
            PrayerName::Maghrib,
            PrayerNotificationPatch {
                reminder_minutes: Some(5),
                ..PrayerNotificationPatch::default()
            },
        );
        let maghrib = &store.settings().notifications.prayers.maghrib;
        assert_eq!(maghrib.reminder_minutes, 5);
        assert!(maghrib.enabled);

        let before = store.settings().clone();
        store.update_prayer_notification(PrayerName::MiddleOfNight, PrayerNotificationPatch::default());
        assert_eq!(store.settings(), &before);
    }

    #[test]
    fn test_jumuah_patch() {
        let mut store = SettingsStore::load(MemoryStore::new());
        store.update_jumuah(JumuahPatch {
            enabled: Some(true),
            masjid_name: Some("Al-Noor".to_string()),
            ..JumuahPatch::default()
        });
        let j = &store.settings().jumuah;
        assert!(j.enabled);
        assert_eq!(j.masjid_name, "Al-Noor");
        assert_eq!(j.times.len(), 1);
    }

    #[test]
    fn test_write_failure_keeps_in_memory_change() {
        let mut store = SettingsStore::load(MemoryStore::new());
        store.store_mut().set_fail_writes(true);
        store.update_calculation_method(CalculationConvention::Qatar);
        assert_eq!(store.settings().calculation_method, CalculationConvention::Qatar);
        assert_eq!(stored(&store).calculation_method, CalculationConvention::NorthAmerica);
    }

    #[test]
    fn test_enabling_travel_stamps_start_date_once() {
        let mut store = SettingsStore::load(MemoryStore::new());
        store.toggle_travel_enabled(now());
        assert!(store.settings().travel.enabled);
        assert_eq!(store.settings().travel.travel_start_date, Some(today()));

        store.toggle_travel_enabled(now());
        store.toggle_travel_enabled(now() + chrono::Duration::days(1));
        assert_eq!(store.settings().travel.travel_start_date, Some(today()));
    }

    #[test]
    fn test_start_date_is_stamped_as_utc_day() {
        // 22:00 on June 1st in New York is already June 2nd in UTC
        let evening = NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(2, 0, 0)
            .unwrap()
            .and_utc();
        let mut store = SettingsStore::load(MemoryStore::new());
        store.toggle_travel_enabled(evening);
        assert_eq!(
            store.settings().travel.travel_start_date,
            NaiveDate::from_ymd_opt(2025, 6, 2)
        );

        let mut config = store.settings().travel.clone();
        config.max_travel_days = 1;
        config.home_base = Some(home());
        let away = Coordinates::new(21.4225, 39.8262).unwrap();
        let status = crate::travel::evaluate(&config, &away, evening + chrono::Duration::hours(23));
        assert!(status.is_traveling);
    }

    #[test]
    fn test_force_on_stamps_start_date_if_unset() {
        let mut store = SettingsStore::load(MemoryStore::new());
        store.set_travel_override(TravelOverride::ForceOn, now());
        assert_eq!(store.settings().travel.override_mode, TravelOverride::ForceOn);
        assert_eq!(store.settings().travel.travel_start_date, Some(today()));

        let mut store = SettingsStore::load(MemoryStore::new());
        store.set_travel_override(TravelOverride::ForceOff, now());
        assert_eq!(store.settings().travel.travel_start_date, None);
    }

    #[test]
    fn test_clear_home_base_clears_start_date() {
        let mut store = SettingsStore::load(MemoryStore::new());
        store.set_home_base(home());
        store.toggle_travel_enabled(now());
        assert!(store.settings().travel.home_base.is_some());

        store.clear_home_base();
        assert!(store.settings().travel.home_base.is_none());
        assert!(store.settings().travel.travel_start_date.is_none());
        assert!(stored(&store).travel.home_base.is_none());
    }

    #[test]
    fn test_toggle_jama_pairs_independently() {
        let mut store = SettingsStore::load(MemoryStore::new());
        store.toggle_jama(JamaPair::DhuhrAsr);
        assert!(store.settings().travel.jama_dhuhr_asr);
        assert!(!store.settings().travel.jama_maghrib_isha);
        store.toggle_jama(JamaPair::MaghribIsha);
        store.toggle_jama(JamaPair::DhuhrAsr);
        assert!(!store.settings().travel.jama_dhuhr_asr);
        assert!(store.settings().travel.jama_maghrib_isha);
    }
}
