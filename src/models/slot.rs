// src/models/slot.rs

//! Slot, SlotKey, and SlotSet data structures.

use std::collections::btree_set;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{NaiveDate, NaiveTime};

use crate::utils::time::TimeWindow;

/// A bookable interval for one court on one date.
///
/// Field order drives the derived ordering, so sets iterate by
/// facility, date, start time, end time, then court.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot {
    /// Facility name (e.g., "frogner")
    pub facility: String,

    /// Date of the slot
    pub date: NaiveDate,

    /// Start of the interval
    pub start: NaiveTime,

    /// End of the interval
    pub end: NaiveTime,

    /// Court display name (e.g., "Grusbane 1")
    pub court: String,
}

impl Slot {
    pub fn new(
        facility: impl Into<String>,
        court: impl Into<String>,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Self {
        Self {
            facility: facility.into(),
            date,
            start,
            end,
            court: court.into(),
        }
    }

    /// The (facility, date) key this slot belongs to.
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.facility.clone(), self.date)
    }

    /// Time label in `HH:MM-HH:MM` form.
    pub fn time_label(&self) -> String {
        format_time_label(self.start, self.end)
    }

    pub fn court_kind(&self) -> CourtKind {
        CourtKind::from_name(&self.court)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.facility,
            self.date,
            self.time_label(),
            self.court
        )
    }
}

/// Format a start/end pair as `HH:MM-HH:MM`.
pub fn format_time_label(start: NaiveTime, end: NaiveTime) -> String {
    format!("{}-{}", start.format("%H:%M"), end.format("%H:%M"))
}

/// Snapshot key: one facility on one date.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    pub facility: String,
    pub date: NaiveDate,
}

impl SlotKey {
    pub fn new(facility: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            facility: facility.into(),
            date,
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.facility, self.date.format("%Y-%m-%d"))
    }
}

/// A set of slots observed for one key at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotSet(BTreeSet<Slot>);

impl SlotSet {
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Insert a slot. Returns false if it was already present.
    pub fn insert(&mut self, slot: Slot) -> bool {
        self.0.insert(slot)
    }

    pub fn contains(&self, slot: &Slot) -> bool {
        self.0.contains(slot)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, Slot> {
        self.0.iter()
    }

    /// Slots in `self` that are not in `other`.
    pub fn difference(&self, other: &SlotSet) -> SlotSet {
        self.0.difference(&other.0).cloned().collect()
    }

    /// Slots in either set.
    pub fn union(&self, other: &SlotSet) -> SlotSet {
        self.0.union(&other.0).cloned().collect()
    }

    /// True when the two sets share no slot.
    pub fn is_disjoint(&self, other: &SlotSet) -> bool {
        self.0.is_disjoint(&other.0)
    }

    pub fn is_subset(&self, other: &SlotSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Keep only slots whose start time lies inside the window.
    pub fn within(&self, window: &TimeWindow) -> SlotSet {
        self.0
            .iter()
            .filter(|slot| window.contains(slot.start))
            .cloned()
            .collect()
    }

    /// Group courts by their time interval, in chronological order.
    pub fn by_time(&self) -> BTreeMap<(NaiveTime, NaiveTime), Vec<&str>> {
        let mut grouped: BTreeMap<(NaiveTime, NaiveTime), Vec<&str>> = BTreeMap::new();
        for slot in &self.0 {
            grouped
                .entry((slot.start, slot.end))
                .or_default()
                .push(slot.court.as_str());
        }
        grouped
    }
}

impl FromIterator<Slot> for SlotSet {
    fn from_iter<I: IntoIterator<Item = Slot>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Slot> for SlotSet {
    fn extend<I: IntoIterator<Item = Slot>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for SlotSet {
    type Item = Slot;
    type IntoIter = btree_set::IntoIter<Slot>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a SlotSet {
    type Item = &'a Slot;
    type IntoIter = btree_set::Iter<'a, Slot>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Court surface, inferred from the court name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourtKind {
    Clay,
    Hard,
    Standard,
}

impl CourtKind {
    /// Classify a court by name ("Grusbane 1" is clay, "Hardcourt 3" is hard).
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("grusbane") || lower.contains("clay") {
            CourtKind::Clay
        } else if lower.contains("hardcourt") || lower.contains("hard") {
            CourtKind::Hard
        } else {
            CourtKind::Standard
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CourtKind::Clay => "clay",
            CourtKind::Hard => "hard",
            CourtKind::Standard => "standard",
        }
    }

    /// Single-character marker used in console tables.
    pub fn marker(&self) -> char {
        match self {
            CourtKind::Clay => 'C',
            CourtKind::Hard => 'H',
            CourtKind::Standard => 'S',
        }
    }
}
