//! Notifier dispatch.
//!
//! Turns the changes collected during one poll cycle into at most one
//! desktop toast and at most one email. Channel failures are logged and
//! never propagated.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{Local, NaiveDate, NaiveTime};

use crate::error::Result;
use crate::models::{
    Config, CourtKind, Facility, FetcherConfig, SlotKey, SlotSet, format_time_label,
};
use crate::services::render::{TemplateData, html_to_text, render_or_plain};
use crate::services::{
    DesktopNotifier, EmailMessage, EmailSender, MessageRenderer, schedule_url,
};
use crate::utils::escape_html;
use crate::utils::quotes::random_quote;
use crate::utils::time::format_date_header;

use super::diff::SlotDiff;

/// Template used for new-slot emails.
pub const NEW_SLOTS_TEMPLATE: &str = "new_slots";
/// Template used for the diagnostic email.
pub const TEST_EMAIL_TEMPLATE: &str = "test_email";

/// Diff for one key within a cycle.
#[derive(Debug, Clone)]
pub struct KeyChange {
    pub key: SlotKey,
    pub diff: SlotDiff,
    /// The key had never been fetched successfully before this cycle
    pub first_observation: bool,
}

/// Everything observed during one poll cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Non-empty diffs, in processing order
    pub changes: Vec<KeyChange>,
    /// Keys whose fetch failed, with the error message
    pub failures: Vec<(SlotKey, String)>,
    /// Number of keys fetched successfully
    pub fetched: usize,
    /// A stop signal cut the cycle short; nothing was dispatched
    pub interrupted: bool,
}

impl CycleReport {
    /// Record a successful fetch. Empty diffs only count towards `fetched`.
    pub fn record(&mut self, key: SlotKey, diff: SlotDiff, first_observation: bool) {
        self.fetched += 1;
        if !diff.is_empty() {
            self.changes.push(KeyChange {
                key,
                diff,
                first_observation,
            });
        }
    }

    pub fn record_failure(&mut self, key: SlotKey, error: impl ToString) {
        self.failures.push((key, error.to_string()));
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Changes whose additions are eligible for email.
    pub fn emailable(&self) -> impl Iterator<Item = &KeyChange> {
        self.changes
            .iter()
            .filter(|c| !c.first_observation && c.diff.has_additions())
    }

    /// Diff for `key` in this cycle, if it changed.
    pub fn change_for(&self, key: &SlotKey) -> Option<&KeyChange> {
        self.changes.iter().find(|c| &c.key == key)
    }
}

/// Which changes produce which notifications.
#[derive(Debug, Clone)]
pub struct NotifyPolicy {
    pub desktop_on_first_observation: bool,
    pub desktop_on_removals: bool,
    pub email_enabled: bool,
    pub summary_lines: usize,
}

impl NotifyPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            desktop_on_first_observation: config.notify.desktop_on_first_observation,
            desktop_on_removals: config.notify.desktop_on_removals,
            email_enabled: config.email.enabled,
            summary_lines: config.notify.summary_lines.max(1),
        }
    }
}

impl Default for NotifyPolicy {
    fn default() -> Self {
        Self {
            desktop_on_first_observation: false,
            desktop_on_removals: false,
            email_enabled: false,
            summary_lines: 3,
        }
    }
}

/// What a dispatch call actually delivered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub desktop_sent: bool,
    pub email_sent: bool,
}

/// Routes cycle changes to the desktop and email channels.
pub struct NotifierDispatch {
    policy: NotifyPolicy,
    desktop: Box<dyn DesktopNotifier>,
    email: Option<Box<dyn EmailSender>>,
    recipients: Vec<String>,
    renderer: Box<dyn MessageRenderer>,
    facilities: Vec<Facility>,
    fetcher: FetcherConfig,
    quotes_file: Option<PathBuf>,
}

impl NotifierDispatch {
    pub fn new(
        policy: NotifyPolicy,
        desktop: Box<dyn DesktopNotifier>,
        renderer: Box<dyn MessageRenderer>,
    ) -> Self {
        Self {
            policy,
            desktop,
            email: None,
            recipients: Vec::new(),
            renderer,
            facilities: Vec::new(),
            fetcher: FetcherConfig::default(),
            quotes_file: None,
        }
    }

    /// Attach the email channel and its recipients.
    pub fn with_email(mut self, sender: Box<dyn EmailSender>, recipients: Vec<String>) -> Self {
        self.email = Some(sender);
        self.recipients = recipients;
        self
    }

    /// Facility metadata for display names and schedule links.
    pub fn with_facilities(mut self, facilities: Vec<Facility>, fetcher: FetcherConfig) -> Self {
        self.facilities = facilities;
        self.fetcher = fetcher;
        self
    }

    /// CSV file to draw email quotes from.
    pub fn with_quotes(mut self, path: PathBuf) -> Self {
        self.quotes_file = Some(path);
        self
    }

    pub fn policy(&self) -> &NotifyPolicy {
        &self.policy
    }

    /// Dispatch the diff of a single key.
    pub async fn dispatch(
        &self,
        key: &SlotKey,
        diff: &SlotDiff,
        first_observation: bool,
    ) -> DispatchOutcome {
        let mut report = CycleReport::default();
        report.record(key.clone(), diff.clone(), first_observation);
        self.dispatch_cycle(&report).await
    }

    /// Dispatch all changes of one cycle: at most one toast, at most one email.
    pub async fn dispatch_cycle(&self, report: &CycleReport) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        if !report.has_changes() {
            return outcome;
        }

        if let Some((title, body)) = self.desktop_message(report) {
            outcome.desktop_sent = self.notify_desktop(&title, &body);
        }

        let emailable: Vec<&KeyChange> = report.emailable().collect();
        if emailable.is_empty() {
            return outcome;
        }
        if !self.policy.email_enabled {
            log::debug!("Email notifications disabled");
            return outcome;
        }

        let message = self.compose_new_slots_email(&emailable);
        outcome.email_sent = match self.send_email(&message).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to send email: {}", e);
                false
            }
        };
        outcome
    }

    /// Show a toast, logging any failure. Returns whether it was shown.
    pub fn notify_desktop(&self, title: &str, body: &str) -> bool {
        match self.desktop.notify(title, body) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to show desktop notification: {}", e);
                false
            }
        }
    }

    /// Send a message through the email channel to the configured recipients.
    pub async fn send_email(&self, message: &EmailMessage) -> Result<()> {
        let sender = self
            .email
            .as_ref()
            .ok_or_else(|| crate::error::AppError::email("no email channel configured"))?;
        sender.send(message, &self.recipients).await
    }

    /// Build the toast title and body for a cycle, if anything qualifies.
    pub fn desktop_message(&self, report: &CycleReport) -> Option<(String, String)> {
        let today = Local::now().date_naive();
        let mut additions = Vec::new();
        let mut removals = Vec::new();

        for change in &report.changes {
            let place = format!(
                "{} on {}",
                self.display_name(&change.key.facility),
                format_date_header(change.key.date, today)
            );

            if change.diff.has_additions() {
                if !change.first_observation {
                    additions.push(format!("New courts available at {place}"));
                } else if self.policy.desktop_on_first_observation {
                    additions.push(format!("Courts available at {place}"));
                }
            }
            if change.diff.has_removals()
                && !change.first_observation
                && self.policy.desktop_on_removals
            {
                removals.push(format!("Courts taken at {place}"));
            }
        }

        let title = if !additions.is_empty() {
            "New Court Slots Available!"
        } else if !removals.is_empty() {
            "Court Slots Taken"
        } else {
            return None;
        };

        additions.extend(removals);
        Some((title.to_string(), summarize(&additions, self.policy.summary_lines)))
    }

    /// Compose the aggregated new-slots email for one cycle.
    pub fn compose_new_slots_email(&self, changes: &[&KeyChange]) -> EmailMessage {
        let stats = SlotStats::collect(changes);
        let subject = format!(
            "{} New Court Slot{} Available!",
            stats.total,
            if stats.total == 1 { "" } else { "s" }
        );
        let quote = self.quote();
        let most_popular = stats.most_popular_time.as_deref().unwrap_or("-");

        let mut text = vec![
            "New courts are available:".to_string(),
            format!(
                "{} facilities, {} dates, {} time slots, most popular time {}",
                stats.facilities, stats.dates, stats.time_slots, most_popular
            ),
            String::new(),
        ];
        let mut sections_html = String::new();

        for change in changes {
            let display = self.display_name(&change.key.facility);
            let date = change.key.date.format("%Y-%m-%d");
            let link = self.schedule_link(&change.key.facility, change.key.date);

            text.push(format!("{display} — {date}"));
            sections_html.push_str(&format!(
                "<h3>{} &mdash; {}</h3>\n<ul>\n",
                escape_html(&display),
                date
            ));

            for (time_label, courts) in grouped_courts(&change.diff.added) {
                let labelled: Vec<String> = courts
                    .iter()
                    .map(|court| format!("{} ({})", court, CourtKind::from_name(court).as_str()))
                    .collect();
                text.push(format!("  - {}: {}", time_label, labelled.join(", ")));
                sections_html.push_str(&format!(
                    "  <li><strong>{}</strong>: {}</li>\n",
                    time_label,
                    escape_html(&labelled.join(", "))
                ));
            }
            sections_html.push_str("</ul>\n");

            if let Some(link) = link {
                text.push(format!("  Link: {link}"));
                sections_html.push_str(&format!(
                    "<p><a href=\"{0}\">{0}</a></p>\n",
                    escape_html(&link)
                ));
            }
            text.push(String::new());
        }

        if let Some(quote) = &quote {
            text.push(format!("Quote: {quote}"));
        }
        let text_body = text.join("\n").trim().to_string();

        let mut data = TemplateData::new(subject.clone(), text_body.clone());
        data.insert("total", stats.total.to_string())
            .insert("facilities_count", stats.facilities.to_string())
            .insert("dates_count", stats.dates.to_string())
            .insert("time_slots_count", stats.time_slots.to_string())
            .insert("most_popular_time", most_popular)
            .insert("facilities_html", sections_html)
            .insert("quote_html", quote_html(quote.as_deref()));
        let html_body = render_or_plain(self.renderer.as_ref(), NEW_SLOTS_TEMPLATE, &data);

        EmailMessage {
            subject,
            html_body,
            text_body,
        }
    }

    /// Compose the diagnostic email.
    pub fn compose_test_email(&self) -> EmailMessage {
        let subject = "Email Test: slotwatch".to_string();
        let body = "If you received this message, your SMTP configuration works.\n\n\
                    This is an automated test message from slotwatch."
            .to_string();
        let quote = self.quote();

        let mut data = TemplateData::new(subject.clone(), body);
        data.insert("quote_html", quote_html(quote.as_deref()));
        let html_body = render_or_plain(self.renderer.as_ref(), TEST_EMAIL_TEMPLATE, &data);
        let text_body = html_to_text(&html_body);

        EmailMessage {
            subject,
            html_body,
            text_body,
        }
    }

    fn quote(&self) -> Option<String> {
        self.quotes_file.as_deref().and_then(random_quote)
    }

    fn facility(&self, name: &str) -> Option<&Facility> {
        self.facilities.iter().find(|f| f.name == name)
    }

    fn display_name(&self, name: &str) -> String {
        match self.facility(name) {
            Some(facility) => facility.display_name(),
            None => Facility::new(name, 0).display_name(),
        }
    }

    fn schedule_link(&self, name: &str, date: NaiveDate) -> Option<String> {
        self.facility(name)
            .map(|facility| schedule_url(&self.fetcher, facility, date))
    }
}

/// Summary numbers over the added slots of one cycle.
#[derive(Debug, Default, PartialEq, Eq)]
struct SlotStats {
    total: usize,
    facilities: usize,
    dates: usize,
    /// Distinct time intervals
    time_slots: usize,
    /// Interval with the most added courts, earliest on a tie
    most_popular_time: Option<String>,
}

impl SlotStats {
    fn collect(changes: &[&KeyChange]) -> Self {
        let mut facilities = BTreeSet::new();
        let mut dates = BTreeSet::new();
        let mut per_time: BTreeMap<(NaiveTime, NaiveTime), usize> = BTreeMap::new();
        let mut total = 0;

        for slot in changes.iter().flat_map(|c| c.diff.added.iter()) {
            let key = slot.key();
            facilities.insert(key.facility);
            dates.insert(key.date);
            *per_time.entry((slot.start, slot.end)).or_default() += 1;
            total += 1;
        }

        let most_popular_time = per_time
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|((start, end), _)| format_time_label(*start, *end));

        Self {
            total,
            facilities: facilities.len(),
            dates: dates.len(),
            time_slots: per_time.len(),
            most_popular_time,
        }
    }
}

/// Join up to `limit` lines with "; ", noting how many were left out.
fn summarize(lines: &[String], limit: usize) -> String {
    let mut summary = lines
        .iter()
        .take(limit)
        .cloned()
        .collect::<Vec<_>>()
        .join("; ");
    if lines.len() > limit {
        summary.push_str(&format!(" and {} more...", lines.len() - limit));
    }
    summary
}

fn grouped_courts(slots: &SlotSet) -> Vec<(String, Vec<&str>)> {
    slots
        .by_time()
        .into_iter()
        .map(|((start, end), courts)| (format_time_label(start, end), courts))
        .collect()
}

fn quote_html(quote: Option<&str>) -> String {
    quote
        .map(|q| format!("<blockquote>{}</blockquote>", escape_html(q)))
        .unwrap_or_default()
}
