//! Forward-compatible loading of persisted settings
//!
//! Persisted JSON is deep-merged over the current defaults so fields added
//! since the data was written pick up their defaults. Each top-level group is
//! then deserialized on its own, so one unreadable group falls back to its
//! defaults without discarding the rest.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::settings::Settings;
use crate::constants::{config::SETTINGS_VERSION, travel, validation};

/// Recursively overlay `overlay` onto `base`
///
/// Objects merge key by key. Arrays and scalars replace. A `null` only
/// lands where the base is already `null`, and a leaf of the wrong JSON type
/// is ignored.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    if let (Value::Object(base_map), Value::Object(overlay_map)) = (&mut *base, overlay) {
        for (key, value) in overlay_map {
            match base_map.get_mut(key) {
                Some(existing) => deep_merge(existing, value),
                None => {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
        return;
    }

    match overlay {
        Value::Null if !base.is_null() => {
            debug!("Ignoring persisted null over a non-null default");
        }
        _ if base.is_null() || same_kind(base, overlay) => {
            *base = overlay.clone();
        }
        _ => {
            warn!(value = %overlay, "Ignoring persisted setting with unexpected type");
        }
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// Rewrite legacy `notifications.prayers.<name>: bool` into `{ enabled }`
fn upgrade_legacy_prayers(persisted: &mut Value) {
    let Some(prayers) = persisted
        .get_mut("notifications")
        .and_then(|n| n.get_mut("prayers"))
        .and_then(Value::as_object_mut)
    else {
        return;
    };

    for (name, entry) in prayers.iter_mut() {
        if let Value::Bool(enabled) = *entry {
            info!(prayer = %name, enabled, "Migrating boolean prayer notification setting");
            let mut upgraded = Map::new();
            upgraded.insert("enabled".to_string(), Value::Bool(enabled));
            *entry = Value::Object(upgraded);
        }
    }
}

fn object_at<'a>(root: &'a mut Value, path: &[String]) -> Option<&'a mut Map<String, Value>> {
    path.iter()
        .try_fold(root, |node, key| node.get_mut(key.as_str()))?
        .as_object_mut()
}

/// Copy the fields of `candidate` into `accepted` one at a time, keeping
/// each only if the whole group still deserializes as `T`
fn salvage<T: DeserializeOwned>(
    accepted: &mut Value,
    path: &mut Vec<String>,
    candidate: &Map<String, Value>,
    group: &str,
) {
    for (field, value) in candidate {
        let previous = object_at(accepted, path).and_then(|obj| obj.get(field).cloned());
        if let (Some(Value::Object(_)), Value::Object(nested)) = (&previous, value) {
            path.push(field.clone());
            salvage::<T>(accepted, path, nested, group);
            path.pop();
            continue;
        }

        let Some(obj) = object_at(accepted, path) else {
            return;
        };
        obj.insert(field.clone(), value.clone());
        if let Err(e) = serde_json::from_value::<T>(accepted.clone()) {
            warn!(group = %group, field = %field, value = %value, error = %e, "Dropping unreadable persisted setting");
            if let Some(obj) = object_at(accepted, path) {
                match previous {
                    Some(prev) => obj.insert(field.clone(), prev),
                    None => obj.remove(field),
                };
            }
        }
    }
}

fn group<T: DeserializeOwned + Serialize + Clone>(merged: &Value, key: &str, default: &T) -> T {
    let Some(value) = merged.get(key) else {
        return default.clone();
    };
    let e = match serde_json::from_value(value.clone()) {
        Ok(parsed) => return parsed,
        Err(e) => e,
    };

    let (Value::Object(candidate), Ok(mut accepted)) = (value, serde_json::to_value(default)) else {
        warn!(group = %key, error = %e, "Persisted settings group unreadable, using defaults");
        return default.clone();
    };
    warn!(group = %key, error = %e, "Persisted settings group partly unreadable, recovering field by field");
    salvage::<T>(&mut accepted, &mut Vec::new(), candidate, key);
    serde_json::from_value(accepted).unwrap_or_else(|e| {
        warn!(group = %key, error = %e, "Persisted settings group unreadable, using defaults");
        default.clone()
    })
}

/// Clamp values that deserialize fine but make no sense
fn validate_and_clamp(settings: &mut Settings) {
    let threshold = settings.travel.distance_threshold_km;
    if !threshold.is_finite() || threshold <= 0.0 {
        warn!(distance_threshold_km = threshold, using = travel::DEFAULT_DISTANCE_THRESHOLD_KM, "Invalid travel distance threshold, using default");
        settings.travel.distance_threshold_km = travel::DEFAULT_DISTANCE_THRESHOLD_KM;
    }

    let max = validation::MAX_REMINDER_MINUTES;
    if settings.notifications.default_reminder_minutes > max {
        warn!(minutes = settings.notifications.default_reminder_minutes, max, "default reminder exceeds maximum, clamping");
        settings.notifications.default_reminder_minutes = max;
    }
    for name in super::settings::PrayerNotifications::NAMES {
        if let Some(entry) = settings.notifications.prayers.get_mut(name)
            && entry.reminder_minutes > max
        {
            warn!(prayer = %name, minutes = entry.reminder_minutes, max, "prayer reminder exceeds maximum, clamping");
            entry.reminder_minutes = max;
        }
    }
    if settings.jumuah.reminder_minutes > max {
        warn!(minutes = settings.jumuah.reminder_minutes, max, "jumuah reminder exceeds maximum, clamping");
        settings.jumuah.reminder_minutes = max;
    }
}

/// Merge persisted (possibly partial, possibly old) settings over `defaults`
pub fn migrate(persisted: &Value, defaults: &Settings) -> Settings {
    if !persisted.is_object() {
        warn!("Persisted settings are not a JSON object, using defaults");
        return defaults.clone();
    }

    let mut merged = match serde_json::to_value(defaults) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Failed to serialize default settings");
            return defaults.clone();
        }
    };

    let mut persisted = persisted.clone();
    upgrade_legacy_prayers(&mut persisted);
    deep_merge(&mut merged, &persisted);

    let mut settings = Settings {
        version: SETTINGS_VERSION,
        calculation_method: group(&merged, "calculationMethod", &defaults.calculation_method),
        asr_calculation: group(&merged, "asrCalculation", &defaults.asr_calculation),
        optional_prayers: group(&merged, "optionalPrayers", &defaults.optional_prayers),
        notifications: group(&merged, "notifications", &defaults.notifications),
        jumuah: group(&merged, "jumuah", &defaults.jumuah),
        travel: group(&merged, "travel", &defaults.travel),
        display: group(&merged, "display", &defaults.display),
    };
    validate_and_clamp(&mut settings);
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convention::{CalculationConvention, Jurisprudence};
    use crate::travel::TravelOverride;
    use serde_json::json;

    fn defaults() -> Settings {
        Settings::default()
    }

    #[test]
    fn test_empty_object_yields_defaults() {
        assert_eq!(migrate(&json!({}), &defaults()), defaults());
    }

    #[test]
    fn test_non_object_yields_defaults() {
        assert_eq!(migrate(&json!("garbage"), &defaults()), defaults());
        assert_eq!(migrate(&json!([1, 2]), &defaults()), defaults());
    }

    #[test]
    fn test_legacy_boolean_prayer_is_upgraded() {
        let s = migrate(&json!({"notifications": {"prayers": {"fajr": true}}}), &defaults());
        let d = defaults();
        assert!(s.notifications.prayers.fajr.enabled);
        assert_eq!(s.notifications.prayers.fajr.sound, "adhan_fajr");
        assert_eq!(s.notifications.prayers.fajr.reminder_minutes, 15);
        assert!(s.notifications.prayers.fajr.at_prayer_time);
        assert_eq!(s, d);

        let s = migrate(&json!({"notifications": {"prayers": {"asr": false, "sunrise": true}}}), &d);
        assert!(!s.notifications.prayers.asr.enabled);
        assert!(s.notifications.prayers.sunrise.enabled);
        assert_eq!(s.notifications.prayers.asr.sound, "default");
    }

    #[test]
    fn test_object_prayer_entries_merge_key_by_key() {
        let s = migrate(
            &json!({"notifications": {"enabled": false, "prayers": {"isha": {"reminderMinutes": 5}}}}),
            &defaults(),
        );
        assert!(!s.notifications.enabled);
        assert_eq!(s.notifications.prayers.isha.reminder_minutes, 5);
        assert!(s.notifications.prayers.isha.enabled);
        assert_eq!(s.notifications.default_reminder_minutes, 15);
    }

    #[test]
    fn test_new_groups_get_defaults_for_old_data() {
        // Saved before travel and display existed
        let old = json!({
            "calculationMethod": "UmmAlQura",
            "asrCalculation": "Hanafi",
            "optionalPrayers": {"showSunrise": false},
        });
        let s = migrate(&old, &defaults());
        assert_eq!(s.calculation_method, CalculationConvention::UmmAlQura);
        assert_eq!(s.asr_calculation, Jurisprudence::Hanafi);
        assert!(!s.optional_prayers.show_sunrise);
        assert!(s.optional_prayers.show_middle_of_night);
        assert_eq!(s.travel, defaults().travel);
        assert_eq!(s.display, defaults().display);
        assert_eq!(s.version, SETTINGS_VERSION);
    }

    #[test]
    fn test_travel_fields_merge_and_null_clears() {
        let s = migrate(
            &json!({"travel": {
                "enabled": true,
                "override": "force_on",
                "homeBase": {"coordinates": {"latitude": 40.0, "longitude": -74.0}, "cityName": "Home"},
                "travelStartDate": "2025-01-02",
                "maxTravelDays": 4
            }}),
            &defaults(),
        );
        assert!(s.travel.enabled);
        assert_eq!(s.travel.override_mode, TravelOverride::ForceOn);
        assert_eq!(s.travel.home_base.as_ref().unwrap().city_name, "Home");
        assert_eq!(s.travel.distance_threshold_km, 88.7);
        assert_eq!(s.travel.max_travel_days, 4);

        let persisted = serde_json::to_value(&s).unwrap();
        let mut cleared = persisted.clone();
        cleared["travel"]["homeBase"] = Value::Null;
        let s2 = migrate(&cleared, &defaults());
        assert!(s2.travel.home_base.is_none());
    }

    #[test]
    fn test_null_group_keeps_defaults() {
        let s = migrate(&json!({"display": null, "jumuah": {"enabled": true}}), &defaults());
        assert_eq!(s.display, defaults().display);
        assert!(s.jumuah.enabled);
        assert_eq!(s.jumuah.times, defaults().jumuah.times);
    }

    #[test]
    fn test_wrong_leaf_type_keeps_default() {
        let s = migrate(&json!({"display": {"showNextPrayer": "no", "showSunnahCard": false}}), &defaults());
        assert!(s.display.show_next_prayer);
        assert!(!s.display.show_sunnah_card);
    }

    #[test]
    fn test_unreadable_group_falls_back_alone() {
        let s = migrate(
            &json!({"calculationMethod": "Atlantis", "asrCalculation": "Hanafi"}),
            &defaults(),
        );
        assert_eq!(s.calculation_method, CalculationConvention::NorthAmerica);
        assert_eq!(s.asr_calculation, Jurisprudence::Hanafi);
    }

    #[test]
    fn test_invalid_values_are_clamped() {
        let s = migrate(
            &json!({"travel": {"distanceThresholdKm": -3.0}, "jumuah": {"reminderMinutes": 99999}}),
            &defaults(),
        );
        assert_eq!(s.travel.distance_threshold_km, 88.7);
        assert_eq!(s.jumuah.reminder_minutes, validation::MAX_REMINDER_MINUTES);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let inputs = [
            json!({}),
            json!({"notifications": {"prayers": {"fajr": true, "dhuhr": {"sound": "soft"}}}}),
            json!({"calculationMethod": "Tehran", "travel": {"enabled": true, "jamaDhuhrAsr": true}}),
            json!({"display": {"showCurrentPrayer": false}, "unknownField": 3}),
            json!({"jumuah": {"times": [], "masjidName": "Al-Noor"}}),
        ];
        let d = defaults();
        for input in inputs {
            let once = migrate(&input, &d);
            let twice = migrate(&serde_json::to_value(&once).unwrap(), &d);
            assert_eq!(once, twice, "input {input}");
        }
    }

    #[test]
    fn test_deep_merge_rules() {
        let mut base = json!({"a": {"b": 1, "c": [1, 2]}, "d": null, "e": "x"});
        deep_merge(&mut base, &json!({"a": {"c": [3]}, "d": {"z": true}, "e": null, "f": 9}));
        assert_eq!(base, json!({"a": {"b": 1, "c": [3]}, "d": {"z": true}, "e": "x", "f": 9}));
    }

    fn traveling_with(max_travel_days: Value) -> Value {
        json!({"travel": {
            "enabled": true,
            "homeBase": {"coordinates": {"latitude": 40.7128, "longitude": -74.0060}, "cityName": "New York"},
            "jamaDhuhrAsr": true,
            "maxTravelDays": max_travel_days
        }})
    }

    #[test]
    fn test_null_leaf_keeps_rest_of_group() {
        let s = migrate(&traveling_with(Value::Null), &defaults());
        assert!(s.travel.enabled);
        assert!(s.travel.jama_dhuhr_asr);
        assert_eq!(s.travel.home_base.as_ref().unwrap().city_name, "New York");
        assert_eq!(s.travel.max_travel_days, defaults().travel.max_travel_days);
    }

    #[test]
    fn test_out_of_range_leaf_falls_back_alone() {
        let s = migrate(&traveling_with(json!(-1)), &defaults());
        assert!(s.travel.enabled);
        assert!(s.travel.jama_dhuhr_asr);
        assert!(s.travel.home_base.is_some());
        assert_eq!(s.travel.max_travel_days, defaults().travel.max_travel_days);
    }

    #[test]
    fn test_nested_bad_leaf_keeps_siblings() {
        let s = migrate(
            &json!({"notifications": {
                "enabled": false,
                "prayers": {"fajr": {"reminderMinutes": -5, "sound": "soft"}}
            }}),
            &defaults(),
        );
        assert!(!s.notifications.enabled);
        assert_eq!(s.notifications.prayers.fajr.sound, "soft");
        assert_eq!(s.notifications.prayers.fajr.reminder_minutes, 15);
    }

    #[test]
    fn test_invalid_home_base_is_dropped() {
        let s = migrate(
            &json!({"travel": {
                "enabled": true,
                "homeBase": {"coordinates": {"latitude": 999.0, "longitude": 0.0}, "cityName": "Nowhere"}
            }}),
            &defaults(),
        );
        assert!(s.travel.enabled);
        assert!(s.travel.home_base.is_none());
    }
}
