// src/services/desktop.rs

//! Desktop notification channel.

use crate::error::Result;

/// Shows a short title/body alert to the local user.
pub trait DesktopNotifier: Send + Sync {
    fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// Prints alerts to the console. Used when native toasts are unavailable
/// or disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl DesktopNotifier for ConsoleNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        println!("[ALERT] {title}: {body}");
        Ok(())
    }
}

/// Native desktop toasts (auto-dismissed after a few seconds).
#[cfg(feature = "desktop")]
#[derive(Debug, Clone)]
pub struct SystemNotifier {
    app_name: String,
    timeout_ms: u32,
}

#[cfg(feature = "desktop")]
impl SystemNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            timeout_ms: 5_000,
        }
    }
}

#[cfg(feature = "desktop")]
impl DesktopNotifier for SystemNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        notify_rust::Notification::new()
            .appname(&self.app_name)
            .summary(title)
            .body(body)
            .timeout(notify_rust::Timeout::Milliseconds(self.timeout_ms))
            .show()
            .map(|_| ())
            .map_err(crate::error::AppError::notification)
    }
}

/// Pick the notifier for this build and configuration.
pub fn select_notifier(desktop_enabled: bool) -> Box<dyn DesktopNotifier> {
    if !desktop_enabled {
        log::info!("Desktop toasts disabled, alerts will be printed to the console");
        return Box::new(ConsoleNotifier);
    }

    #[cfg(feature = "desktop")]
    let notifier: Box<dyn DesktopNotifier> = Box::new(SystemNotifier::new(env!("CARGO_PKG_NAME")));

    #[cfg(not(feature = "desktop"))]
    let notifier: Box<dyn DesktopNotifier> = {
        log::info!("Built without desktop support, alerts will be printed to the console");
        Box::new(ConsoleNotifier)
    };

    notifier
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_notifier_never_fails() {
        assert!(ConsoleNotifier.notify("Title", "Body").is_ok());
    }

    #[test]
    fn test_disabled_selects_console() {
        let notifier = select_notifier(false);
        assert!(notifier.notify("Title", "Body").is_ok());
    }
}
