//! One-line, human-readable summaries of each settings group

use super::settings::Settings;
use crate::constants::labels;
use crate::travel::TravelState;
use crate::types::Location;

pub fn location_summary(location: &Location) -> &str {
    &location.city_name
}

pub fn calculation_summary(settings: &Settings) -> &'static str {
    settings.calculation_method.label()
}

pub fn jumuah_summary(settings: &Settings) -> &str {
    let jumuah = &settings.jumuah;
    if !jumuah.enabled {
        labels::OFF
    } else if jumuah.masjid_name.trim().is_empty() {
        labels::ENABLED
    } else {
        &jumuah.masjid_name
    }
}

pub fn notifications_summary(settings: &Settings) -> String {
    let notifications = &settings.notifications;
    if !notifications.enabled {
        return labels::OFF.to_string();
    }
    let count = notifications
        .prayers
        .iter()
        .filter(|(_, p)| p.enabled)
        .count();
    format!("{count} prayers")
}

pub fn travel_summary(settings: &Settings, state: &TravelState) -> &'static str {
    if !settings.travel.enabled {
        labels::OFF
    } else if state.is_traveling {
        labels::TRAVELING
    } else {
        labels::ENABLED
    }
}

/// `None` until a home base is set
pub fn distance_summary(state: &TravelState) -> Option<String> {
    state
        .distance_from_home_km
        .map(|km| format!("{} km from home", km.round() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convention::CalculationConvention;

    #[test]
    fn test_calculation_summary_uses_label() {
        let mut s = Settings::default();
        assert_eq!(calculation_summary(&s), "ISNA");
        s.calculation_method = CalculationConvention::UmmAlQura;
        assert_eq!(calculation_summary(&s), CalculationConvention::UmmAlQura.label());
    }

    #[test]
    fn test_jumuah_summary() {
        let mut s = Settings::default();
        assert_eq!(jumuah_summary(&s), "Off");
        s.jumuah.enabled = true;
        assert_eq!(jumuah_summary(&s), "Enabled");
        s.jumuah.masjid_name = "Al-Noor".to_string();
        assert_eq!(jumuah_summary(&s), "Al-Noor");
    }

    #[test]
    fn test_notifications_summary_counts_enabled() {
        let mut s = Settings::default();
        // Sunrise is off by default
        assert_eq!(notifications_summary(&s), "5 prayers");
        s.notifications.prayers.asr.enabled = false;
        assert_eq!(notifications_summary(&s), "4 prayers");
        s.notifications.enabled = false;
        assert_eq!(notifications_summary(&s), "Off");
    }

    #[test]
    fn test_travel_and_distance_summary() {
        let mut s = Settings::default();
        let mut state = TravelState::default();
        assert_eq!(travel_summary(&s, &state), "Off");
        assert_eq!(distance_summary(&state), None);

        s.travel.enabled = true;
        state.distance_from_home_km = Some(9.6);
        assert_eq!(travel_summary(&s, &state), "Enabled");
        assert_eq!(distance_summary(&state).as_deref(), Some("10 km from home"));

        state.is_traveling = true;
        assert_eq!(travel_summary(&s, &state), "Traveling");
    }
}
