// src/models/mod.rs

//! Domain models for the monitor application.

mod config;
mod slot;

// Re-export all public types
pub use config::{
    Config, EmailConfig, Facility, FetcherConfig, MonitorConfig, NotifyConfig, is_truthy,
    normalize_interval,
};
pub use slot::{CourtKind, Slot, SlotKey, SlotSet, format_time_label};
