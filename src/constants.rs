//! Application-wide constants
//!
//! This module contains the magic numbers and string literals used throughout
//! the engine, providing a single source of truth for constant values.

/// Persistence keys and on-disk layout
pub mod config {
    /// Directory name under the user's config dir
    pub const APP_DIR: &str = "ontime";

    /// Key under which the settings JSON is stored
    pub const SETTINGS_KEY: &str = "ontime_settings";

    /// Key under which prayer tracking records are stored
    pub const TRACKING_KEY: &str = "ontime_prayer_tracking";

    /// File extension used by the file-backed key-value store
    pub const STORE_EXTENSION: &str = "json";

    /// Current settings schema version (bumped whenever fields are added)
    pub const SETTINGS_VERSION: u32 = 2;
}

/// Travel (safar) constants
pub mod travel {
    /// ~48 miles, the common Sharia travel distance, stored in km
    pub const DEFAULT_DISTANCE_THRESHOLD_KM: f64 = 88.7;

    /// Mean Earth radius used by the haversine formula
    pub const EARTH_RADIUS_KM: f64 = 6371.0;

    /// 0 = no limit on the number of travel days
    pub const UNLIMITED_TRAVEL_DAYS: u32 = 0;
}

/// Qibla constants
pub mod kaaba {
    pub const LATITUDE: f64 = 21.4225;
    pub const LONGITUDE: f64 = 39.8262;
}

/// Notification defaults
pub mod notifications {
    pub const DEFAULT_REMINDER_MINUTES: u32 = 15;
    pub const DEFAULT_SOUND: &str = "default";
    pub const FAJR_SOUND: &str = "adhan_fajr";
    pub const JUMUAH_REMINDER_MINUTES: u32 = 30;
    pub const JUMUAH_KHUTBAH: &str = "13:00";
    pub const JUMUAH_IQAMAH: &str = "13:30";
}

/// Prayer tracking retention
pub mod tracking {
    /// Records older than this many days are pruned on every write
    pub const RETENTION_DAYS: i64 = 30;

    /// Default window for recent records and statistics
    pub const DEFAULT_STATS_DAYS: i64 = 7;
}

/// Live driver timing
pub mod timing {
    /// Countdown tick period in milliseconds
    pub const TICK_MILLIS: u64 = 1000;
}

/// Input validation ranges
pub mod validation {
    pub const MIN_LATITUDE: f64 = -90.0;
    pub const MAX_LATITUDE: f64 = 90.0;
    pub const MIN_LONGITUDE: f64 = -180.0;
    pub const MAX_LONGITUDE: f64 = 180.0;

    /// Upper bound accepted for any reminder offset (one day)
    pub const MAX_REMINDER_MINUTES: u32 = 24 * 60;
}

/// Labels shown in summaries
pub mod labels {
    pub const DEFAULT_CITY: &str = "Custom Location";
    pub const OFF: &str = "Off";
    pub const ENABLED: &str = "Enabled";
    pub const TRAVELING: &str = "Traveling";
}
