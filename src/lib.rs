#![forbid(unsafe_code)]
//! Prayer schedule and travel-adjustment engine
//!
//! Builds a day's prayer times from a location and calculation convention,
//! tracks the current and next prayer, and derives Qasr/Jama status while
//! traveling. Settings are persisted as JSON and migrated forward on load.

pub mod compass;
pub mod config;
pub mod constants;
pub mod convention;
pub mod driver;
pub mod ephemeris;
pub mod error;
pub mod persistence;
pub mod reminders;
pub mod schedule;
pub mod tracker;
pub mod tracking;
pub mod travel;
pub mod types;

pub use error::{CoreError, CoreResult};
