//! Calculation conventions and the parameter bundles they resolve to.
//!
//! Each convention is a fixed preset of twilight angles, Isha interval,
//! high-latitude rule and minute adjustments. The jurisprudence choice only
//! changes the Asr shadow factor.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalculationConvention {
    MuslimWorldLeague,
    Egyptian,
    Karachi,
    UmmAlQura,
    Dubai,
    MoonsightingCommittee,
    NorthAmerica,
    Kuwait,
    Qatar,
    Singapore,
    Tehran,
    Turkey,
}

impl CalculationConvention {
    pub const ALL: [CalculationConvention; 12] = [
        CalculationConvention::NorthAmerica,
        CalculationConvention::MuslimWorldLeague,
        CalculationConvention::Egyptian,
        CalculationConvention::UmmAlQura,
        CalculationConvention::Dubai,
        CalculationConvention::Karachi,
        CalculationConvention::Kuwait,
        CalculationConvention::Qatar,
        CalculationConvention::Singapore,
        CalculationConvention::Tehran,
        CalculationConvention::Turkey,
        CalculationConvention::MoonsightingCommittee,
    ];

    /// Short label used in settings summaries
    pub fn label(&self) -> &'static str {
        match self {
            CalculationConvention::NorthAmerica => "ISNA",
            CalculationConvention::MuslimWorldLeague => "MWL",
            CalculationConvention::Egyptian => "Egyptian",
            CalculationConvention::UmmAlQura => "Umm Al-Qura",
            CalculationConvention::Dubai => "Dubai",
            CalculationConvention::Karachi => "Karachi",
            CalculationConvention::Kuwait => "Kuwait",
            CalculationConvention::Qatar => "Qatar",
            CalculationConvention::Singapore => "Singapore",
            CalculationConvention::Tehran => "Tehran",
            CalculationConvention::Turkey => "Turkey",
            CalculationConvention::MoonsightingCommittee => "Moonsighting",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CalculationConvention::NorthAmerica => "Islamic Society of North America",
            CalculationConvention::MuslimWorldLeague => "Muslim World League",
            CalculationConvention::Egyptian => "Egyptian General Authority",
            CalculationConvention::UmmAlQura => "Umm Al-Qura University, Makkah",
            CalculationConvention::Dubai => "UAE",
            CalculationConvention::Karachi => "University of Islamic Sciences, Karachi",
            CalculationConvention::Kuwait => "Kuwait",
            CalculationConvention::Qatar => "Qatar",
            CalculationConvention::Singapore => "Singapore",
            CalculationConvention::Tehran => "Institute of Geophysics, Tehran",
            CalculationConvention::Turkey => "Diyanet, Turkey",
            CalculationConvention::MoonsightingCommittee => "Moonsighting Committee",
        }
    }
}

impl Default for CalculationConvention {
    fn default() -> Self {
        CalculationConvention::NorthAmerica
    }
}

impl fmt::Display for CalculationConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for CalculationConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        CalculationConvention::ALL
            .into_iter()
            .find(|c| {
                format!("{c:?}").to_ascii_lowercase() == wanted || c.label().to_ascii_lowercase() == wanted
            })
            .ok_or_else(|| format!("unknown calculation method '{s}'"))
    }
}

/// School of jurisprudence, only relevant for Asr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Jurisprudence {
    #[default]
    Standard,
    Hanafi,
}

impl Jurisprudence {
    /// Object shadow length (in multiples of its height) that starts Asr
    pub fn shadow_factor(&self) -> f64 {
        match self {
            Jurisprudence::Standard => 1.0,
            Jurisprudence::Hanafi => 2.0,
        }
    }
}

impl std::str::FromStr for Jurisprudence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "shafi" => Ok(Jurisprudence::Standard),
            "hanafi" => Ok(Jurisprudence::Hanafi),
            _ => Err(format!("unknown jurisprudence '{s}'")),
        }
    }
}

/// How Fajr/Isha are bounded when twilight never fully ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HighLatitudeRule {
    MiddleOfTheNight,
    SeventhOfTheNight,
    TwilightAngle,
}

/// Per-prayer minute offsets applied after the astronomical computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Adjustments {
    pub fajr: i32,
    pub sunrise: i32,
    pub dhuhr: i32,
    pub asr: i32,
    pub maghrib: i32,
    pub isha: i32,
}

/// Everything the ephemeris needs to turn solar position into prayer times
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterBundle {
    pub fajr_angle: f64,
    pub isha_angle: f64,
    /// Fixed minutes after Maghrib; overrides `isha_angle` when set
    pub isha_interval_minutes: Option<u32>,
    /// Sun depression for Maghrib; `None` means Maghrib at sunset
    pub maghrib_angle: Option<f64>,
    pub high_latitude_rule: HighLatitudeRule,
    pub adjustments: Adjustments,
    pub asr_shadow_factor: f64,
}

impl ParameterBundle {
    fn preset(fajr_angle: f64, isha_angle: f64) -> Self {
        Self {
            fajr_angle,
            isha_angle,
            isha_interval_minutes: None,
            maghrib_angle: None,
            high_latitude_rule: HighLatitudeRule::MiddleOfTheNight,
            adjustments: Adjustments::default(),
            asr_shadow_factor: Jurisprudence::Standard.shadow_factor(),
        }
    }

    fn with_dhuhr(mut self, minutes: i32) -> Self {
        self.adjustments.dhuhr = minutes;
        self
    }
}

/// Resolve a convention and jurisprudence choice into a parameter bundle
pub fn resolve(method: CalculationConvention, jurisprudence: Jurisprudence) -> ParameterBundle {
    let mut bundle = match method {
        CalculationConvention::MuslimWorldLeague => ParameterBundle::preset(18.0, 17.0).with_dhuhr(1),
        CalculationConvention::Egyptian => ParameterBundle::preset(19.5, 17.5).with_dhuhr(1),
        CalculationConvention::Karachi => ParameterBundle::preset(18.0, 18.0).with_dhuhr(1),
        CalculationConvention::UmmAlQura => ParameterBundle {
            isha_interval_minutes: Some(90),
            ..ParameterBundle::preset(18.5, 0.0)
        },
        CalculationConvention::Dubai => ParameterBundle {
            adjustments: Adjustments {
                sunrise: -3,
                dhuhr: 3,
                asr: 3,
                maghrib: 3,
                ..Adjustments::default()
            },
            ..ParameterBundle::preset(18.2, 18.2)
        },
        CalculationConvention::MoonsightingCommittee => ParameterBundle {
            high_latitude_rule: HighLatitudeRule::SeventhOfTheNight,
            adjustments: Adjustments {
                dhuhr: 5,
                maghrib: 3,
                ..Adjustments::default()
            },
            ..ParameterBundle::preset(18.0, 18.0)
        },
        CalculationConvention::NorthAmerica => ParameterBundle::preset(15.0, 15.0).with_dhuhr(1),
        CalculationConvention::Kuwait => ParameterBundle::preset(18.0, 17.5),
        CalculationConvention::Qatar => ParameterBundle {
            isha_interval_minutes: Some(90),
            ..ParameterBundle::preset(18.0, 0.0)
        },
        CalculationConvention::Singapore => ParameterBundle::preset(20.0, 18.0).with_dhuhr(1),
        CalculationConvention::Tehran => ParameterBundle {
            maghrib_angle: Some(4.5),
            ..ParameterBundle::preset(17.7, 14.0)
        },
        CalculationConvention::Turkey => ParameterBundle {
            adjustments: Adjustments {
                sunrise: -7,
                dhuhr: 5,
                asr: 4,
                maghrib: 7,
                ..Adjustments::default()
            },
            ..ParameterBundle::preset(18.0, 17.0)
        },
    };
    bundle.asr_shadow_factor = jurisprudence.shadow_factor();
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_north_america_preset() {
        let b = resolve(CalculationConvention::NorthAmerica, Jurisprudence::Standard);
        assert_eq!(b.fajr_angle, 15.0);
        assert_eq!(b.isha_angle, 15.0);
        assert_eq!(b.adjustments.dhuhr, 1);
        assert_eq!(b.asr_shadow_factor, 1.0);
    }

    #[test]
    fn test_interval_conventions_use_fixed_isha() {
        for method in [CalculationConvention::UmmAlQura, CalculationConvention::Qatar] {
            let b = resolve(method, Jurisprudence::Standard);
            assert_eq!(b.isha_interval_minutes, Some(90), "{method:?}");
        }
        let b = resolve(CalculationConvention::Tehran, Jurisprudence::Standard);
        assert_eq!(b.maghrib_angle, Some(4.5));
        assert_eq!(b.isha_interval_minutes, None);
    }

    #[test]
    fn test_jurisprudence_only_changes_asr_factor() {
        for method in CalculationConvention::ALL {
            let standard = resolve(method, Jurisprudence::Standard);
            let hanafi = resolve(method, Jurisprudence::Hanafi);
            assert_eq!(hanafi.asr_shadow_factor, 2.0);
            assert_eq!(
                ParameterBundle {
                    asr_shadow_factor: standard.asr_shadow_factor,
                    ..hanafi
                },
                standard,
                "{method:?}"
            );
        }
    }

    #[test]
    fn test_all_lists_every_convention_once() {
        let mut seen = std::collections::HashSet::new();
        for method in CalculationConvention::ALL {
            assert!(seen.insert(method));
        }
        assert_eq!(seen.len(), 12);
    }

    #[test]
    fn test_convention_parses_name_and_label() {
        assert_eq!("isna".parse(), Ok(CalculationConvention::NorthAmerica));
        assert_eq!("UmmAlQura".parse(), Ok(CalculationConvention::UmmAlQura));
        assert!("Mars".parse::<CalculationConvention>().is_err());
    }

    #[test]
    fn test_convention_serde_matches_persisted_names() {
        let json = serde_json::to_string(&CalculationConvention::MoonsightingCommittee).unwrap();
        assert_eq!(json, "\"MoonsightingCommittee\"");
        let j: Jurisprudence = serde_json::from_str("\"Hanafi\"").unwrap();
        assert_eq!(j, Jurisprudence::Hanafi);
    }
}
