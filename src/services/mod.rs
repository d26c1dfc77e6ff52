//! Service layer for the monitor application.
//!
//! This module contains the boundary collaborators:
//! - Slot fetching (`SlotFetcher`, `MatchiFetcher`)
//! - Desktop toasts (`DesktopNotifier`)
//! - Email delivery (`EmailSender`, `SmtpSender`)
//! - Message rendering (`MessageRenderer`)

pub mod desktop;
pub mod email;
pub mod fetcher;
pub mod render;

pub use desktop::{ConsoleNotifier, DesktopNotifier, select_notifier};
#[cfg(feature = "desktop")]
pub use desktop::SystemNotifier;
pub use email::{EmailMessage, EmailSender, SmtpSender};
pub use fetcher::{MatchiFetcher, SlotFetcher, schedule_url};
pub use render::{MessageRenderer, PlainRenderer, TemplateData, TemplateRenderer, select_renderer};
