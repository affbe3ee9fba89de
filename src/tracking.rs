//! Per-day record of which prayers were prayed on time
//!
//! Records live under their own key and only the last thirty days are kept.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

use crate::constants::config::TRACKING_KEY;
use crate::constants::tracking::RETENTION_DAYS;
use crate::persistence::KeyValueStore;
use crate::types::PrayerName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingStatus {
    #[serde(rename = "ontime")]
    OnTime,
    #[serde(rename = "missed")]
    Missed,
    #[serde(rename = "untracked")]
    Untracked,
}

impl std::str::FromStr for TrackingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "ontime" | "prayed" => Ok(TrackingStatus::OnTime),
            "missed" => Ok(TrackingStatus::Missed),
            "untracked" | "clear" => Ok(TrackingStatus::Untracked),
            _ => Err(format!("unknown tracking status '{s}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrayerRecord {
    pub date: NaiveDate,
    pub prayer: PrayerName,
    pub status: TrackingStatus,
    pub tracked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
struct TrackingData {
    records: Vec<PrayerRecord>,
}

/// Persisted shape, read record by record
#[derive(Deserialize)]
struct StoredTracking {
    #[serde(default)]
    records: Vec<serde_json::Value>,
}

impl From<StoredTracking> for TrackingData {
    fn from(stored: StoredTracking) -> Self {
        let records = stored
            .records
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<PrayerRecord>(raw.clone()) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(record = %raw, error = %e, "Skipping unreadable prayer record");
                    None
                }
            })
            .collect();
        TrackingData { records }
    }
}

/// Statuses recorded for one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub prayers: BTreeMap<PrayerName, TrackingStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStats {
    pub total_tracked: usize,
    pub on_time: usize,
    pub missed: usize,
    /// Rounded share of on-time prayers, 0 when nothing is tracked
    pub percentage: u32,
}

fn days_before(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_sub_days(Days::new(days.max(0) as u64))
        .unwrap_or(NaiveDate::MIN)
}

pub struct PrayerLog<S: KeyValueStore> {
    data: TrackingData,
    store: S,
}

impl<S: KeyValueStore> PrayerLog<S> {
    /// Load the log; unreadable records are skipped, unreadable data starts an empty one
    pub fn open(store: S) -> Self {
        let data = match store.get(TRACKING_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<StoredTracking>(&raw) {
                Ok(stored) => stored.into(),
                Err(e) => {
                    warn!(error = %e, "Failed to parse prayer tracking data, starting fresh");
                    TrackingData::default()
                }
            },
            Ok(None) => TrackingData::default(),
            Err(e) => {
                error!(error = %e, "Failed to load prayer tracking data");
                TrackingData::default()
            }
        };
        info!(records = data.records.len(), "Loaded prayer tracking data");
        Self { data, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn records(&self) -> &[PrayerRecord] {
        &self.data.records
    }

    fn save(&mut self) {
        match serde_json::to_string(&self.data) {
            Ok(json) => {
                if let Err(e) = self.store.set(TRACKING_KEY, &json) {
                    error!(error = %e, "Failed to save prayer tracking data");
                }
            }
            Err(e) => error!(error = %e, "Failed to serialize prayer tracking data"),
        }
    }

    /// Record `status` for `prayer` on `date`, replacing any earlier entry
    ///
    /// `Untracked` just removes the entry. Records older than the retention
    /// window (counted back from `today`) are dropped on every write.
    pub fn track(
        &mut self,
        prayer: PrayerName,
        status: TrackingStatus,
        date: NaiveDate,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) {
        self.data
            .records
            .retain(|r| !(r.date == date && r.prayer == prayer));

        if status != TrackingStatus::Untracked {
            self.data.records.push(PrayerRecord {
                date,
                prayer,
                status,
                tracked_at: now,
            });
        }

        let cutoff = days_before(today, RETENTION_DAYS);
        let before = self.data.records.len();
        self.data.records.retain(|r| r.date >= cutoff);
        let pruned = before - self.data.records.len();
        if pruned > 0 {
            info!(pruned, %cutoff, "Pruned old prayer records");
        }

        info!(prayer = %prayer, status = ?status, %date, "Tracked prayer");
        self.save();
    }

    pub fn status(&self, prayer: PrayerName, date: NaiveDate) -> TrackingStatus {
        self.data
            .records
            .iter()
            .find(|r| r.date == date && r.prayer == prayer)
            .map(|r| r.status)
            .unwrap_or(TrackingStatus::Untracked)
    }

    pub fn daily_record(&self, date: NaiveDate) -> DailyRecord {
        let prayers = self
            .data
            .records
            .iter()
            .filter(|r| r.date == date)
            .map(|r| (r.prayer, r.status))
            .collect();
        DailyRecord { date, prayers }
    }

    /// One entry per day for the last `days` days, newest first
    pub fn recent_records(&self, today: NaiveDate, days: i64) -> Vec<DailyRecord> {
        (0..days.max(0))
            .map(|i| self.daily_record(days_before(today, i)))
            .collect()
    }

    pub fn stats(&self, today: NaiveDate, days: i64) -> TrackingStats {
        let cutoff = days_before(today, days);
        let recent = self.data.records.iter().filter(|r| r.date >= cutoff);

        let (mut on_time, mut missed) = (0, 0);
        for record in recent {
            match record.status {
                TrackingStatus::OnTime => on_time += 1,
                TrackingStatus::Missed => missed += 1,
                TrackingStatus::Untracked => {}
            }
        }
        let total_tracked = on_time + missed;
        let percentage = if total_tracked > 0 {
            ((on_time as f64 / total_tracked as f64) * 100.0).round() as u32
        } else {
            0
        };

        TrackingStats {
            total_tracked,
            on_time,
            missed,
            percentage,
        }
    }
}
