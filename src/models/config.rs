//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::time::TimeWindow;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schedule page fetching settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Poll loop settings
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Desktop notification and message rendering settings
    #[serde(default)]
    pub notify: NotifyConfig,

    /// SMTP settings (overridable from the environment)
    #[serde(default)]
    pub email: EmailConfig,

    /// Facility definitions
    #[serde(default = "defaults::default_facilities")]
    pub facilities: Vec<Facility>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.fetcher.base_url).map_err(|e| {
            AppError::validation(format!("fetcher.base_url is not a valid URL: {e}"))
        })?;
        if let Some(between) = &self.monitor.between {
            TimeWindow::parse(between)?;
        }
        if self.notify.summary_lines == 0 {
            return Err(AppError::validation("notify.summary_lines must be > 0"));
        }
        if self.facilities.is_empty() {
            return Err(AppError::validation("No facilities defined"));
        }

        let mut seen = HashSet::new();
        for facility in &self.facilities {
            if facility.name.trim().is_empty() {
                return Err(AppError::validation("Facility with empty name"));
            }
            if facility.id == 0 {
                return Err(AppError::validation(format!(
                    "Facility '{}' has id 0",
                    facility.name
                )));
            }
            if !seen.insert(facility.name.to_lowercase()) {
                return Err(AppError::validation(format!(
                    "Facility '{}' is defined twice",
                    facility.name
                )));
            }
        }
        if self.active_facilities().next().is_none() {
            return Err(AppError::validation("No active facilities defined"));
        }
        Ok(())
    }

    /// Facilities that are currently monitored, in configured order.
    pub fn active_facilities(&self) -> impl Iterator<Item = &Facility> {
        self.facilities.iter().filter(|f| f.active)
    }

    /// Facilities that are kept for reference but not monitored.
    pub fn inactive_facilities(&self) -> impl Iterator<Item = &Facility> {
        self.facilities.iter().filter(|f| !f.active)
    }

    /// Look up a facility by name, ignoring case.
    pub fn find_facility(&self, name: &str) -> Option<&Facility> {
        let name = name.trim().to_lowercase();
        self.facilities
            .iter()
            .find(|f| f.name.to_lowercase() == name)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetcher: FetcherConfig::default(),
            monitor: MonitorConfig::default(),
            notify: NotifyConfig::default(),
            email: EmailConfig::default(),
            facilities: defaults::default_facilities(),
        }
    }
}

/// A bookable venue on the booking site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    /// Short lowercase name used as the snapshot key (e.g., "frogner")
    pub name: String,

    /// Booking site facility ID
    pub id: u32,

    /// Inactive facilities are kept for reference but not monitored
    #[serde(default = "defaults::active")]
    pub active: bool,

    /// Free-form note (e.g., "Winter closure")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Facility {
    pub fn new(name: impl Into<String>, id: u32) -> Self {
        Self {
            name: name.into(),
            id,
            active: true,
            note: None,
        }
    }

    /// Name with its first letter capitalized.
    pub fn display_name(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// Schedule page fetching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Schedule page URL
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Sport ID passed as the `sport` query parameter (1 = tennis)
    #[serde(default = "defaults::sport")]
    pub sport: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            sport: defaults::sport(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Poll loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Days after the start date to include (inclusive, 0 = only start date)
    #[serde(default = "defaults::days_ahead")]
    pub days_ahead: u32,

    /// Seconds between cycles
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Optional start-time window like "17-22"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub between: Option<String>,
}

impl MonitorConfig {
    /// Poll interval; zero falls back to the default.
    pub fn interval(&self) -> Duration {
        normalize_interval(self.interval_secs)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            days_ahead: defaults::days_ahead(),
            interval_secs: defaults::interval(),
            between: None,
        }
    }
}

/// Convert an interval in seconds, mapping 0 to the default interval.
pub fn normalize_interval(secs: u64) -> Duration {
    if secs == 0 {
        log::warn!(
            "Interval of 0 seconds is not allowed, using {}s",
            defaults::interval()
        );
        Duration::from_secs(defaults::interval())
    } else {
        Duration::from_secs(secs)
    }
}

/// Desktop notification and rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Show desktop toasts at all
    #[serde(default = "defaults::enabled")]
    pub desktop: bool,

    /// Toast when a key is seen for the first time and already has slots
    #[serde(default)]
    pub desktop_on_first_observation: bool,

    /// Toast when slots disappear
    #[serde(default)]
    pub desktop_on_removals: bool,

    /// Maximum summary lines in a toast body before "and N more..."
    #[serde(default = "defaults::summary_lines")]
    pub summary_lines: usize,

    /// Directory holding `*.html` email templates
    #[serde(default = "defaults::template_dir")]
    pub template_dir: PathBuf,

    /// Optional CSV of quotes appended to emails
    #[serde(default = "defaults::quotes_file")]
    pub quotes_file: PathBuf,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            desktop: defaults::enabled(),
            desktop_on_first_observation: false,
            desktop_on_removals: false,
            summary_lines: defaults::summary_lines(),
            template_dir: defaults::template_dir(),
            quotes_file: defaults::quotes_file(),
        }
    }
}

/// SMTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub smtp_host: String,

    #[serde(default = "defaults::smtp_port")]
    pub smtp_port: u16,

    /// Implicit TLS (SMTPS)
    #[serde(default)]
    pub smtp_ssl: bool,

    /// STARTTLS upgrade when not using implicit TLS
    #[serde(default = "defaults::enabled")]
    pub use_tls: bool,

    #[serde(default)]
    pub smtp_user: String,

    #[serde(default)]
    pub smtp_pass: String,

    #[serde(default)]
    pub from: String,

    #[serde(default = "defaults::from_name")]
    pub from_name: String,

    /// Comma-separated recipient list
    #[serde(default)]
    pub to: String,

    #[serde(default)]
    pub reply_to: String,

    #[serde(default = "defaults::smtp_timeout")]
    pub timeout_secs: u64,
}

impl EmailConfig {
    /// Apply `EMAIL_*` and `SMTP_*` environment variables on top of file values.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let text = |key: &str, target: &mut String| {
            if let Some(value) = lookup(key) {
                *target = value.trim().to_string();
            }
        };
        text("SMTP_HOST", &mut self.smtp_host);
        text("SMTP_USER", &mut self.smtp_user);
        text("SMTP_PASS", &mut self.smtp_pass);
        text("EMAIL_FROM", &mut self.from);
        text("EMAIL_FROM_NAME", &mut self.from_name);
        text("EMAIL_TO", &mut self.to);
        text("EMAIL_REPLY_TO", &mut self.reply_to);

        if let Some(value) = lookup("EMAIL_ENABLED") {
            self.enabled = is_truthy(&value);
        }
        if let Some(value) = lookup("SMTP_SSL") {
            self.smtp_ssl = is_truthy(&value);
        }
        if let Some(value) = lookup("SMTP_USE_TLS") {
            self.use_tls = is_truthy(&value);
        }
        if let Some(value) = lookup("SMTP_PORT") {
            self.smtp_port = value.trim().parse().unwrap_or_else(|_| {
                log::warn!("Invalid SMTP_PORT '{}', using {}", value, defaults::smtp_port());
                defaults::smtp_port()
            });
        }
        if let Some(value) = lookup("SMTP_TIMEOUT") {
            if let Ok(secs) = value.trim().parse() {
                self.timeout_secs = secs;
            }
        }
    }

    /// All fields needed to deliver a message are present.
    pub fn is_valid(&self) -> bool {
        [
            &self.smtp_host,
            &self.smtp_user,
            &self.smtp_pass,
            &self.from,
            &self.to,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }

    /// Recipient addresses that pass a basic syntax check.
    pub fn recipients(&self) -> Vec<String> {
        self.to
            .split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .filter(|addr| {
                let ok = email_pattern().is_match(addr);
                if !ok {
                    log::warn!("Invalid email address: {}", addr);
                }
                ok
            })
            .map(str::to_string)
            .collect()
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: defaults::smtp_port(),
            smtp_ssl: false,
            use_tls: defaults::enabled(),
            smtp_user: String::new(),
            smtp_pass: String::new(),
            from: String::new(),
            from_name: defaults::from_name(),
            to: String::new(),
            reply_to: String::new(),
            timeout_secs: defaults::smtp_timeout(),
        }
    }
}

/// `1`, `true`, `yes`, `on`, `enabled` (any case) are truthy.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "enabled"
    )
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("static email pattern is valid")
    })
}

mod defaults {
    use std::path::PathBuf;

    use super::Facility;

    pub fn enabled() -> bool {
        true
    }
    pub fn active() -> bool {
        true
    }

    // Fetcher defaults
    pub fn base_url() -> String {
        "https://www.matchi.se/book/schedule".into()
    }
    pub fn sport() -> String {
        "1".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; slotwatch/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Monitor defaults
    pub fn days_ahead() -> u32 {
        2
    }
    pub fn interval() -> u64 {
        300
    }

    // Notify defaults
    pub fn summary_lines() -> usize {
        3
    }
    pub fn template_dir() -> PathBuf {
        PathBuf::from("templates")
    }
    pub fn quotes_file() -> PathBuf {
        PathBuf::from("quotes.csv")
    }

    // Email defaults
    pub fn smtp_port() -> u16 {
        587
    }
    pub fn smtp_timeout() -> u64 {
        30
    }
    pub fn from_name() -> String {
        "Slotwatch".into()
    }

    pub fn default_facilities() -> Vec<Facility> {
        vec![
            Facility::new("frogner", 2259),
            Facility::new("ota", 1779),
            Facility::new("bergentennisarena", 301),
            Facility {
                name: "voldsløkka".to_string(),
                id: 642,
                active: false,
                note: Some("Winter closure".to_string()),
            },
        ]
    }
}
