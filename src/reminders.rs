//! Reminder planning for the notification collaborator
//!
//! Turns a day's schedule and the notification settings into the list of
//! future alerts. Delivery is someone else's job.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::schedule::DaySchedule;
use crate::types::PrayerName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReminderKind {
    /// A few minutes ahead of the prayer
    BeforePrayer,
    AtPrayerTime,
    /// Ahead of a Friday khutbah
    Jumuah,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub kind: ReminderKind,
    pub prayer: Option<PrayerName>,
    pub fire_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
    pub sound: String,
}

fn sound_for(configured: &str, default: &str) -> String {
    if configured.trim().is_empty() {
        default.to_string()
    } else {
        configured.to_string()
    }
}

fn jumuah_reminders<Tz: TimeZone>(
    schedule: &DaySchedule,
    settings: &Settings,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Vec<Reminder> {
    let jumuah = &settings.jumuah;
    if !jumuah.enabled || schedule.date().weekday() != Weekday::Fri {
        return Vec::new();
    }

    let lead = Duration::minutes(jumuah.reminder_minutes as i64);
    let place = if jumuah.masjid_name.trim().is_empty() {
        "the masjid".to_string()
    } else {
        jumuah.masjid_name.clone()
    };

    jumuah
        .times
        .iter()
        .filter_map(|slot| {
            let khutbah = match NaiveTime::parse_from_str(&slot.khutbah, "%H:%M") {
                Ok(time) => time,
                Err(e) => {
                    warn!(khutbah = %slot.khutbah, error = %e, "Skipping Jumu'ah slot with invalid time");
                    return None;
                }
            };
            let start = tz
                .from_local_datetime(&schedule.date().and_time(khutbah))
                .earliest()?
                .with_timezone(&Utc);
            let fire_at = start - lead;
            (fire_at > now).then(|| Reminder {
                kind: ReminderKind::Jumuah,
                prayer: None,
                fire_at,
                title: format!("Jumu'ah khutbah at {}", slot.khutbah),
                body: format!("Iqamah at {} at {place}", slot.iqamah),
                sound: settings.notifications.default_sound.clone(),
            })
        })
        .collect()
}

/// Every reminder for `schedule` that is still in the future at `now`
///
/// Jumu'ah times are local wall-clock strings, resolved in `tz`.
pub fn plan_reminders<Tz: TimeZone>(
    schedule: &DaySchedule,
    settings: &Settings,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Vec<Reminder> {
    let notifications = &settings.notifications;
    if !notifications.enabled {
        return Vec::new();
    }

    let mut reminders = Vec::new();
    for (prayer, config) in notifications.prayers.iter().filter(|(_, c)| c.enabled) {
        let at = schedule.instant(prayer);
        let sound = sound_for(&config.sound, &notifications.default_sound);

        if config.reminder_minutes > 0 {
            let fire_at = at - Duration::minutes(config.reminder_minutes as i64);
            if fire_at > now {
                reminders.push(Reminder {
                    kind: ReminderKind::BeforePrayer,
                    prayer: Some(prayer),
                    fire_at,
                    title: format!("{prayer} in {} minutes", config.reminder_minutes),
                    body: format!("Prepare for {prayer}"),
                    sound: sound.clone(),
                });
            }
        }

        if config.at_prayer_time && at > now {
            reminders.push(Reminder {
                kind: ReminderKind::AtPrayerTime,
                prayer: Some(prayer),
                fire_at: at,
                title: format!("Time for {prayer}"),
                body: format!("It is time to pray {prayer}"),
                sound,
            });
        }
    }

    reminders.extend(jumuah_reminders(schedule, settings, now, tz));
    reminders.sort_by_key(|r| r.fire_at);
    debug!(count = reminders.len(), date = %schedule.date(), "Planned reminders");
    reminders
}
