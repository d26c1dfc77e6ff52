// src/services/fetcher.rs

//! Slot fetcher service.
//!
//! Fetches a facility's schedule page for one date and extracts the free
//! slots from it.

use async_trait::async_trait;
use chrono::NaiveDate;
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Facility, FetcherConfig, Slot, SlotSet};
use crate::utils::http;
use crate::utils::time::parse_time_label;

/// CSS selector for free slot cells on the schedule page.
const FREE_SLOT_SELECTOR: &str = "td.slot.free";

/// Source of slot availability for one facility and date.
#[async_trait]
pub trait SlotFetcher: Send + Sync {
    /// Fetch the currently free slots.
    async fn fetch(&self, facility: &Facility, date: NaiveDate) -> Result<SlotSet>;
}

/// Fetcher for the Matchi schedule page.
pub struct MatchiFetcher {
    config: FetcherConfig,
    client: reqwest::Client,
}

impl MatchiFetcher {
    /// Create a new fetcher with its own HTTP client.
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let client = http::create_async_client(&config)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl SlotFetcher for MatchiFetcher {
    async fn fetch(&self, facility: &Facility, date: NaiveDate) -> Result<SlotSet> {
        let id = facility.id.to_string();
        let date_str = date.format("%Y-%m-%d").to_string();
        let query = [
            ("wl", ""),
            ("facilityId", id.as_str()),
            ("date", date_str.as_str()),
            ("sport", self.config.sport.as_str()),
        ];

        let document = http::fetch_page_async(&self.client, &self.config.base_url, &query)
            .await
            .map_err(|e| AppError::fetch(format!("{} {}", facility.name, date_str), e))?;

        parse_schedule(&document, &facility.name, date)
    }
}

/// Build the schedule link for a facility and date.
pub fn schedule_url(config: &FetcherConfig, facility: &Facility, date: NaiveDate) -> String {
    let id = facility.id.to_string();
    let date_str = date.format("%Y-%m-%d").to_string();
    url::Url::parse_with_params(
        &config.base_url,
        &[
            ("facilityId", id.as_str()),
            ("date", date_str.as_str()),
            ("sport", config.sport.as_str()),
        ],
    )
    .map(|u| u.to_string())
    .unwrap_or_else(|_| {
        format!(
            "{}?facilityId={}&date={}&sport={}",
            config.base_url, id, date_str, config.sport
        )
    })
}

/// Extract free slots from a schedule page.
///
/// Each free cell carries a `title` like `"Ledig<br>Grusbane 1<br>17:00-18:00"`:
/// the second part is the court, the third the time interval.
pub fn parse_schedule(document: &Html, facility: &str, date: NaiveDate) -> Result<SlotSet> {
    let cell_sel = parse_selector(FREE_SLOT_SELECTOR)?;
    let mut slots = SlotSet::new();

    for cell in document.select(&cell_sel) {
        let Some(title) = cell.value().attr("title") else {
            log::debug!("Free slot cell without title on {} {}", facility, date);
            continue;
        };
        match parse_slot_title(title, facility, date) {
            Some(slot) => {
                slots.insert(slot);
            }
            None => log::debug!("Skipping unparseable slot title {:?}", title),
        }
    }

    Ok(slots)
}

fn parse_slot_title(title: &str, facility: &str, date: NaiveDate) -> Option<Slot> {
    let parts: Vec<&str> = title.split("<br>").map(str::trim).collect();
    let court = parts.get(1).filter(|c| !c.is_empty())?;
    let (start, end) = parse_time_label(parts.get(2)?)?;
    Some(Slot::new(facility, *court, date, start, end))
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
