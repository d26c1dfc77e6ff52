//! Monitoring pipeline.
//!
//! - `diff`: What changed between two observations of a key
//! - `snapshot`: Last observed slots per key
//! - `dispatch`: Turns a cycle's changes into toasts and emails
//! - `monitor`: The poll loop driving fetch, diff and dispatch
//! - `diagnostics`: Channel checks outside the poll loop

pub mod diagnostics;
pub mod diff;
pub mod dispatch;
pub mod monitor;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod testing;

pub use diagnostics::{TEST_TOAST_PAUSE, run_test_email, run_test_notifications};
pub use diff::{SlotDiff, calculate_diff};
pub use dispatch::{CycleReport, DispatchOutcome, KeyChange, NotifierDispatch, NotifyPolicy};
pub use monitor::{MonitorState, PollLoop, WatchTarget, build_targets};
pub use snapshot::SnapshotStore;
