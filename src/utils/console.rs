// src/utils/console.rs

//! Console output for the monitor: headers, legend, and availability tables.
//!
//! Diagnostic messages go through the `log` facade; this module prints the
//! human-facing tables on stdout.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveTime};

use crate::models::{CourtKind, SlotSet, format_time_label};
use crate::utils::time::{TimeWindow, format_interval};

/// Print a header
pub fn header(title: &str) {
    let border = "═".repeat(60);
    println!();
    println!("{border}");
    println!("  {title}");
    println!("{border}");
}

/// Print a separator line
pub fn separator() {
    println!("{}", "─".repeat(60));
}

/// Print a sub-item (indented)
pub fn sub_item(message: &str) {
    println!("    {message}");
}

/// Print a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("[{}] [SUMMARY] {}", Local::now().format("%H:%M:%S"), title);
    for (key, value) in items {
        println!("    {key}: {value}");
    }
}

/// Print the startup legend.
pub fn legend(
    facilities: &[String],
    dates: &[NaiveDate],
    window: Option<&TimeWindow>,
    interval: Duration,
) {
    header("Court Availability Monitor");
    sub_item(&format!("Facilities: {}", facilities.join(", ")));
    sub_item(&format!("Dates: {}", summarize_dates(dates)));
    if let Some(window) = window {
        sub_item(&format!("Time filter: {}", window.label()));
    }
    sub_item(&format!("Interval: {}", format_interval(interval)));
    separator();
    sub_item("[C] clay   [H] hard   [S] standard");
    sub_item("+ newly available   - no longer available");
    separator();
    println!("Press Ctrl+C to stop monitoring");
}

/// Compact description of a date list.
pub fn summarize_dates(dates: &[NaiveDate]) -> String {
    match dates {
        [] => "No dates".to_string(),
        [first, .., last] if dates.len() > 5 => format!(
            "{} … {} ({} dates)",
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d"),
            dates.len()
        ),
        _ => dates
            .iter()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Render table rows for one facility/date.
///
/// Rows list courts per time interval. Added courts are prefixed with `+`,
/// removed courts (no longer in `current`) with `-`.
pub fn availability_rows(current: &SlotSet, added: &SlotSet, removed: &SlotSet) -> Vec<String> {
    let mut rows: BTreeMap<(NaiveTime, NaiveTime), Vec<String>> = BTreeMap::new();

    for slot in current {
        let mark = if added.contains(slot) { "+" } else { "" };
        rows.entry((slot.start, slot.end))
            .or_default()
            .push(court_cell(mark, slot.court_kind(), &slot.court));
    }
    for slot in removed {
        rows.entry((slot.start, slot.end))
            .or_default()
            .push(court_cell("-", slot.court_kind(), &slot.court));
    }

    if rows.is_empty() {
        return vec!["  (no available slots)".to_string()];
    }

    rows.into_iter()
        .map(|((start, end), courts)| {
            format!("  {:<12} | {}", format_time_label(start, end), courts.join(", "))
        })
        .collect()
}

fn court_cell(mark: &str, kind: CourtKind, court: &str) -> String {
    format!("{}[{}] {}", mark, kind.marker(), court)
}

/// Print the table for one facility/date.
pub fn availability_table(title: &str, current: &SlotSet, added: &SlotSet, removed: &SlotSet) {
    println!();
    println!("{title}");
    for row in availability_rows(current, added, removed) {
        println!("{row}");
    }
}

/// Print when the next cycle starts.
pub fn next_check(interval: Duration) {
    let next = Local::now()
        + chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::zero());
    println!();
    println!(
        "Next check in {}... (at {})",
        format_interval(interval),
        next.format("%H:%M:%S")
    );
}
