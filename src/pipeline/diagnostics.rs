//! Channel checks that bypass the poll loop.

use std::time::Duration;

use crate::error::Result;
use crate::services::DesktopNotifier;
use crate::utils::console;

use super::dispatch::NotifierDispatch;

/// Pause between test toasts.
pub const TEST_TOAST_PAUSE: Duration = Duration::from_secs(3);

const TEST_TOASTS: [(&str, &str); 3] = [
    ("Test Notification 1", "Desktop notifications are working."),
    (
        "New Court Slots Available!",
        "New courts available at Frogner on Today",
    ),
    ("Test Notification 3", "Last test notification."),
];

/// Show three test toasts, `pause` apart. Returns how many were shown.
pub async fn run_test_notifications(notifier: &dyn DesktopNotifier, pause: Duration) -> usize {
    let mut shown = 0;
    for (i, (title, body)) in TEST_TOASTS.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(pause).await;
        }
        console::sub_item(&format!("Sending test notification {}/{}", i + 1, TEST_TOASTS.len()));
        match notifier.notify(title, body) {
            Ok(()) => shown += 1,
            Err(e) => log::warn!("Test notification {} failed: {}", i + 1, e),
        }
    }
    shown
}

/// Compose and send the diagnostic email.
pub async fn run_test_email(dispatch: &NotifierDispatch) -> Result<()> {
    if !dispatch.policy().email_enabled {
        log::warn!("Email notifications are disabled; sending the test email anyway");
    }
    let message = dispatch.compose_test_email();
    dispatch.send_email(&message).await
}
