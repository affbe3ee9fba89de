//! User settings for ontime
//!
//! - **settings**: the schema and its hardcoded defaults
//! - **migrate**: deep-merge of persisted JSON over the defaults
//! - **store**: the single owner, with one named update per field group
//! - **summary**: short labels for each group

pub mod migrate;
pub mod settings;
pub mod store;
pub mod summary;

// Re-export commonly used types
pub use migrate::migrate;
pub use settings::{
    DisplaySettings, JumuahSettings, JumuahTime, NotificationSettings, OptionalPrayers,
    PrayerNotification, PrayerNotifications, Settings,
};
pub use store::{
    DisplayPatch, JumuahPatch, OptionalPrayer, PrayerNotificationPatch, SettingsStore, TravelPatch,
};
