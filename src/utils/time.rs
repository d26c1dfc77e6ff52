// src/utils/time.rs

//! Date and time parsing helpers for monitor options.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{Days, NaiveDate, NaiveTime};

use crate::error::{AppError, Result};

/// Parse `17`, `17:00` or `08:30` into a time of day.
pub fn parse_hhmm(text: &str) -> Result<NaiveTime> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::validation("Empty time component"));
    }

    let (hour, minute) = match text.split_once(':') {
        Some((h, m)) => (parse_number(h, text)?, parse_number(m, text)?),
        None => (parse_number(text, text)?, 0),
    };

    if hour > 23 || minute > 59 {
        return Err(AppError::validation(
            "Time must be between 00:00 and 23:59",
        ));
    }

    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| AppError::validation(format!("Invalid time '{text}'")))
}

fn parse_number(part: &str, whole: &str) -> Result<u32> {
    part.trim()
        .parse()
        .map_err(|_| AppError::validation(format!("Invalid time '{whole}'")))
}

/// Parse a slot label such as `17:00-18:00` into its start and end.
pub fn parse_time_label(label: &str) -> Option<(NaiveTime, NaiveTime)> {
    let compact: String = label.chars().filter(|c| !c.is_whitespace()).collect();
    let (start, end) = compact.split_once('-')?;
    Some((parse_hhmm(start).ok()?, parse_hhmm(end).ok()?))
}

/// Time-of-day window used to filter slots by their start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    /// Parse `HH-HH` or `HH:MM-HH:MM`.
    pub fn parse(text: &str) -> Result<Self> {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(AppError::validation(
                "Time window requires a value like 17-22",
            ));
        }
        let (start, end) = compact.split_once('-').ok_or_else(|| {
            AppError::validation("Time window must be in the form HH:MM-HH:MM or HH-HH")
        })?;

        let start = parse_hhmm(start)?;
        let end = parse_hhmm(end)?;
        if end <= start {
            return Err(AppError::validation("End time must be after start time"));
        }
        Ok(Self { start, end })
    }

    /// Half-open containment: `start <= time < end`.
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }

    pub fn label(&self) -> String {
        format!("{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("Invalid date '{text}'. Use YYYY-MM-DD.")))
}

/// Parse a comma-separated list of dates into sorted, unique dates.
pub fn parse_dates_list(csv: &str) -> Result<Vec<NaiveDate>> {
    let mut dates = BTreeSet::new();
    for part in csv.split(',') {
        if part.trim().is_empty() {
            continue;
        }
        dates.insert(parse_date(part)?);
    }
    if dates.is_empty() {
        return Err(AppError::validation("No valid dates provided"));
    }
    Ok(dates.into_iter().collect())
}

/// Dates from `start` through `start + days_ahead`, inclusive.
pub fn date_range(start: NaiveDate, days_ahead: u32) -> Vec<NaiveDate> {
    (0..=u64::from(days_ahead))
        .filter_map(|offset| start.checked_add_days(Days::new(offset)))
        .collect()
}

/// Human header for a date relative to `today`.
pub fn format_date_header(date: NaiveDate, today: NaiveDate) -> String {
    let iso = date.format("%Y-%m-%d");
    if date == today {
        format!("Today ({iso})")
    } else if Some(date) == today.succ_opt() {
        format!("Tomorrow ({iso})")
    } else {
        date.format("%A, %Y-%m-%d").to_string()
    }
}

/// "5 minutes", "1 minute", or "90 seconds".
pub fn format_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    if secs > 0 && secs % 60 == 0 {
        let mins = secs / 60;
        format!("{} minute{}", mins, if mins == 1 { "" } else { "s" })
    } else {
        format!("{secs} seconds")
    }
}
