//! Poll loop.
//!
//! Fetches every (facility, date) target in a fixed order, diffs it against
//! the snapshot store, hands the cycle's changes to the dispatcher, then
//! sleeps until the next cycle or a stop signal.

use std::time::Duration;

use chrono::{Local, NaiveDate};
use tokio::sync::watch;

use crate::error::{AppError, Result};
use crate::models::{Facility, SlotKey, SlotSet, normalize_interval};
use crate::services::SlotFetcher;
use crate::utils::console;
use crate::utils::time::{TimeWindow, format_date_header};

use super::diff::calculate_diff;
use super::dispatch::{CycleReport, NotifierDispatch};
use super::snapshot::SnapshotStore;

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Fetching,
    Diffing,
    Notifying,
    Sleeping,
    Stopped,
}

/// One facility on one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub facility: Facility,
    pub date: NaiveDate,
}

impl WatchTarget {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.facility.name.clone(), self.date)
    }
}

/// Cross product of facilities and dates: facility order first, then date.
pub fn build_targets(facilities: &[Facility], dates: &[NaiveDate]) -> Vec<WatchTarget> {
    let mut dates = dates.to_vec();
    dates.sort();
    dates.dedup();

    facilities
        .iter()
        .flat_map(|facility| {
            dates.iter().map(move |date| WatchTarget {
                facility: facility.clone(),
                date: *date,
            })
        })
        .collect()
}

pub struct PollLoop {
    targets: Vec<WatchTarget>,
    window: Option<TimeWindow>,
    interval: Duration,
    fetcher: Box<dyn SlotFetcher>,
    dispatch: NotifierDispatch,
    store: SnapshotStore,
    state: MonitorState,
    cycles: u64,
    quiet: bool,
}

impl PollLoop {
    /// Create a loop over `targets`. Fails if there is nothing to watch.
    pub fn new(
        targets: Vec<WatchTarget>,
        window: Option<TimeWindow>,
        interval: Duration,
        fetcher: Box<dyn SlotFetcher>,
        dispatch: NotifierDispatch,
    ) -> Result<Self> {
        if targets.is_empty() {
            return Err(AppError::config(
                "nothing to monitor: no facility/date combinations",
            ));
        }

        Ok(Self {
            targets,
            window,
            interval: normalize_interval(interval.as_secs()),
            fetcher,
            dispatch,
            store: SnapshotStore::new(),
            state: MonitorState::Idle,
            cycles: 0,
            quiet: false,
        })
    }

    /// Suppress console tables.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one full cycle over all targets and dispatch its changes.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let (_keep, mut shutdown) = watch::channel(false);
        self.run_cycle_until(&mut shutdown).await
    }

    /// Run one cycle, abandoning it as soon as `shutdown` turns true.
    ///
    /// An abandoned cycle keeps the snapshots fetched so far but dispatches
    /// nothing and does not count as a completed cycle.
    pub async fn run_cycle_until(&mut self, shutdown: &mut watch::Receiver<bool>) -> CycleReport {
        let mut report = CycleReport::default();
        let today = Local::now().date_naive();
        let unmarked = SlotSet::new();

        for target in &self.targets {
            if *shutdown.borrow() {
                report.interrupted = true;
                break;
            }
            let key = target.key();
            self.state = MonitorState::Fetching;

            let result = tokio::select! {
                result = self.fetcher.fetch(&target.facility, target.date) => Some(result),
                _ = wait_for_stop(shutdown) => None,
            };
            let fetched = match result {
                Some(Ok(slots)) => slots,
                Some(Err(e)) => {
                    log::warn!("Skipping {} this cycle: {}", key, e);
                    report.record_failure(key, e);
                    continue;
                }
                None => {
                    report.interrupted = true;
                    break;
                }
            };
            let current = match &self.window {
                Some(window) => fetched.within(window),
                None => fetched,
            };

            self.state = MonitorState::Diffing;
            let first_observation = !self.store.is_known(&key);
            let diff = calculate_diff(self.store.get(&key), &current);

            if !self.quiet {
                let title = format!(
                    "{} - {}",
                    target.facility.display_name(),
                    format_date_header(target.date, today)
                );
                let added = if first_observation { &unmarked } else { &diff.added };
                console::availability_table(&title, &current, added, &diff.removed);
            }

            report.record(key.clone(), diff, first_observation);
            self.store.put(key, current);
        }

        if report.interrupted {
            log::info!(
                "Stop signal during cycle, skipping notifications ({} fetched)",
                report.fetched
            );
            return report;
        }

        self.state = MonitorState::Notifying;
        let outcome = self.dispatch.dispatch_cycle(&report).await;
        self.cycles += 1;

        log::info!(
            "Cycle {}: {} fetched, {} changed, {} failed (desktop: {}, email: {})",
            self.cycles,
            report.fetched,
            report.changes.len(),
            report.failures.len(),
            outcome.desktop_sent,
            outcome.email_sent
        );
        report
    }

    /// Run cycles until `shutdown` turns true.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        while !*shutdown.borrow() {
            let report = self.run_cycle_until(&mut shutdown).await;
            if report.interrupted || *shutdown.borrow() {
                break;
            }

            self.state = MonitorState::Sleeping;
            if !self.quiet {
                console::next_check(self.interval);
            }
            let stopped = tokio::select! {
                _ = tokio::time::sleep(self.interval) => false,
                _ = wait_for_stop(&mut shutdown) => true,
            };
            if stopped {
                break;
            }
        }

        self.state = MonitorState::Stopped;
        log::info!("Monitoring stopped after {} cycles", self.cycles);
        if !self.quiet {
            console::summary(
                "Monitoring stopped",
                &[
                    ("Cycles", self.cycles.to_string()),
                    ("Keys tracked", self.store.len().to_string()),
                ],
            );
        }
    }
}

/// Resolve once the shutdown flag is true. Never resolves if the sender is
/// dropped while the flag is still false.
async fn wait_for_stop(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::dispatch::NotifyPolicy;
    use crate::pipeline::testing::{
        RecordingEmail, RecordingNotifier, ScriptedFetcher, slot, slot_set, test_date,
    };
    use crate::services::PlainRenderer;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Raises the stop flag on its `stop_at`-th call (0-based). Calls
    /// before the third return nothing, later calls return one slot.
    struct StoppingFetcher {
        stop: watch::Sender<bool>,
        stop_at: usize,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SlotFetcher for StoppingFetcher {
        async fn fetch(&self, facility: &Facility, _date: NaiveDate) -> Result<SlotSet> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == self.stop_at {
                let _ = self.stop.send(true);
            }
            if n < 3 {
                Ok(SlotSet::new())
            } else {
                Ok(slot_set(&[slot(&facility.name, "Court 1", 18)]))
            }
        }
    }

    /// Never answers within a test's lifetime.
    struct HangingFetcher;

    #[async_trait]
    impl SlotFetcher for HangingFetcher {
        async fn fetch(&self, _facility: &Facility, _date: NaiveDate) -> Result<SlotSet> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(SlotSet::new())
        }
    }

    struct Harness {
        fetcher: ScriptedFetcher,
        notifier: RecordingNotifier,
        email: RecordingEmail,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                fetcher: ScriptedFetcher::default(),
                notifier: RecordingNotifier::default(),
                email: RecordingEmail::default(),
            }
        }

        fn poll_loop(&self, facilities: &[&str], window: Option<TimeWindow>) -> PollLoop {
            self.poll_loop_with(facilities, window, Box::new(self.fetcher.clone()))
        }

        fn poll_loop_with(
            &self,
            facilities: &[&str],
            window: Option<TimeWindow>,
            fetcher: Box<dyn SlotFetcher>,
        ) -> PollLoop {
            let facilities: Vec<Facility> = facilities
                .iter()
                .enumerate()
                .map(|(i, name)| Facility::new(*name, i as u32 + 1))
                .collect();
            let policy = NotifyPolicy {
                email_enabled: true,
                ..NotifyPolicy::default()
            };
            let dispatch = NotifierDispatch::new(
                policy,
                Box::new(self.notifier.clone()),
                Box::new(PlainRenderer),
            )
            .with_email(Box::new(self.email.clone()), vec!["me@example.com".to_string()]);

            PollLoop::new(
                build_targets(&facilities, &[test_date()]),
                window,
                Duration::from_secs(3600),
                fetcher,
                dispatch,
            )
            .unwrap()
            .quiet(true)
        }
    }

    fn key(facility: &str) -> SlotKey {
        SlotKey::new(facility, test_date())
    }

    #[test]
    fn test_targets_are_ordered() {
        let facilities = vec![Facility::new("ota", 1779), Facility::new("frogner", 2259)];
        let d1 = NaiveDate::from_ymd_opt(2025, 8, 21).unwrap();
        let d0 = NaiveDate::from_ymd_opt(2025, 8, 20).unwrap();

        let keys: Vec<String> = build_targets(&facilities, &[d1, d0, d1])
            .iter()
            .map(|t| t.key().to_string())
            .collect();
        assert_eq!(
            keys,
            vec![
                "ota 2025-08-20",
                "ota 2025-08-21",
                "frogner 2025-08-20",
                "frogner 2025-08-21",
            ]
        );
    }

    #[test]
    fn test_no_targets_is_config_error() {
        let dispatch = NotifierDispatch::new(
            NotifyPolicy::default(),
            Box::new(RecordingNotifier::default()),
            Box::new(PlainRenderer),
        );
        let result = PollLoop::new(
            Vec::new(),
            None,
            Duration::from_secs(300),
            Box::new(ScriptedFetcher::default()),
            dispatch,
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_zero_interval_is_normalized() {
        let h = Harness::new();
        let dispatch = NotifierDispatch::new(
            NotifyPolicy::default(),
            Box::new(h.notifier.clone()),
            Box::new(PlainRenderer),
        );
        let poll = PollLoop::new(
            build_targets(&[Facility::new("frogner", 2259)], &[test_date()]),
            None,
            Duration::ZERO,
            Box::new(h.fetcher.clone()),
            dispatch,
        )
        .unwrap();
        assert_eq!(poll.interval(), Duration::from_secs(300));
        assert_eq!(poll.state(), MonitorState::Idle);
    }

    #[tokio::test]
    async fn test_scenario_facilityx() {
        let h = Harness::new();
        h.fetcher
            .respond(&key("facilityx"), slot_set(&[slot("facilityx", "Court 1", 17)]))
            .respond(
                &key("facilityx"),
                slot_set(&[
                    slot("facilityx", "Court 1", 17),
                    slot("facilityx", "Court 1", 18),
                ]),
            );
        let mut poll = h.poll_loop(&["facilityx"], None);

        let first = poll.run_cycle().await;
        assert!(first.changes[0].first_observation);
        assert!(h.email.sent().is_empty());
        assert!(h.notifier.calls().is_empty());

        let second = poll.run_cycle().await;
        let change = second.change_for(&key("facilityx")).unwrap();
        assert_eq!(change.diff.added, slot_set(&[slot("facilityx", "Court 1", 18)]));
        assert!(change.diff.removed.is_empty());

        assert_eq!(h.notifier.calls().len(), 1);
        let sent = h.email.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.text_body.contains("18:00-19:00"));
        assert_eq!(poll.state(), MonitorState::Notifying);
        assert_eq!(poll.cycles(), 2);
    }

    #[tokio::test]
    async fn test_failed_key_is_isolated() {
        let h = Harness::new();
        let a = key("frogner");
        let b = key("ota");
        let a_slots = slot_set(&[slot("frogner", "Court 1", 17)]);
        h.fetcher
            .respond(&a, a_slots.clone())
            .fail(&a, "connection reset");
        h.fetcher
            .respond(&b, SlotSet::new())
            .respond(&b, slot_set(&[slot("ota", "Court 2", 19)]));
        let mut poll = h.poll_loop(&["frogner", "ota"], None);

        poll.run_cycle().await;
        let report = poll.run_cycle().await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, a);
        assert_eq!(poll.store().get(&a), &a_slots);
        assert_eq!(poll.store().get(&b), &slot_set(&[slot("ota", "Court 2", 19)]));

        let sent = h.email.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.text_body.contains("Ota"));
        assert!(!sent[0].0.text_body.contains("Frogner"));
    }

    #[tokio::test]
    async fn test_failed_first_fetch_leaves_key_unknown() {
        let h = Harness::new();
        let a = key("frogner");
        h.fetcher
            .fail(&a, "timeout")
            .respond(&a, slot_set(&[slot("frogner", "Court 1", 17)]));
        let mut poll = h.poll_loop(&["frogner"], None);

        poll.run_cycle().await;
        assert!(!poll.store().is_known(&a));

        let report = poll.run_cycle().await;
        assert!(report.changes[0].first_observation);
        assert!(h.email.sent().is_empty());
    }

    #[tokio::test]
    async fn test_one_email_for_two_keys() {
        let h = Harness::new();
        for facility in ["frogner", "ota"] {
            h.fetcher
                .respond(&key(facility), SlotSet::new())
                .respond(&key(facility), slot_set(&[slot(facility, "Court 1", 18)]));
        }
        let mut poll = h.poll_loop(&["frogner", "ota"], None);

        poll.run_cycle().await;
        poll.run_cycle().await;

        let sent = h.email.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.text_body.contains("Frogner"));
        assert!(sent[0].0.text_body.contains("Ota"));
        assert_eq!(h.notifier.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_removal_only_cycle_sends_no_email() {
        let h = Harness::new();
        h.fetcher
            .respond(&key("frogner"), slot_set(&[slot("frogner", "Court 1", 18)]))
            .respond(&key("frogner"), SlotSet::new());
        let mut poll = h.poll_loop(&["frogner"], None);

        poll.run_cycle().await;
        let report = poll.run_cycle().await;

        assert!(report.changes[0].diff.has_removals());
        assert!(h.email.sent().is_empty());
        assert!(h.notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn test_time_window_filters_before_diff() {
        let h = Harness::new();
        h.fetcher
            .respond(&key("frogner"), SlotSet::new())
            .respond(
                &key("frogner"),
                slot_set(&[slot("frogner", "Court 1", 16), slot("frogner", "Court 1", 20)]),
            );
        let window = TimeWindow::parse("17-22").unwrap();
        let mut poll = h.poll_loop(&["frogner"], Some(window));

        poll.run_cycle().await;
        let report = poll.run_cycle().await;

        assert_eq!(
            report.changes[0].diff.added,
            slot_set(&[slot("frogner", "Court 1", 20)])
        );
        assert_eq!(poll.store().get(&key("frogner")).len(), 1);
    }

    #[tokio::test]
    async fn test_stop_before_start_runs_no_cycle() {
        let h = Harness::new();
        let mut poll = h.poll_loop(&["frogner"], None);
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        poll.run(rx).await;

        assert_eq!(poll.cycles(), 0);
        assert!(h.fetcher.calls().is_empty());
        assert_eq!(poll.state(), MonitorState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_interrupts_sleep() {
        let h = Harness::new();
        let mut poll = h.poll_loop(&["frogner"], None);
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(true);
        });

        tokio::time::timeout(Duration::from_secs(5), poll.run(rx))
            .await
            .expect("stop signal should cut the one-hour sleep short");

        assert_eq!(poll.cycles(), 1);
        assert_eq!(poll.state(), MonitorState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_during_fetch_skips_remaining_keys_and_dispatch() {
        let h = Harness::new();
        let (tx, rx) = watch::channel(false);
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = StoppingFetcher {
            stop: tx,
            stop_at: 3,
            calls: Arc::clone(&calls),
        };
        let mut poll = h.poll_loop_with(&["frogner", "ota", "bergen"], None, Box::new(fetcher));

        poll.run_cycle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        poll.run(rx).await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(poll.cycles(), 1);
        assert_eq!(poll.state(), MonitorState::Stopped);
        assert!(h.notifier.calls().is_empty());
        assert!(h.email.sent().is_empty());
    }

    #[tokio::test]
    async fn test_stop_cancels_hanging_fetch() {
        let h = Harness::new();
        let mut poll = h.poll_loop_with(&["frogner", "ota"], None, Box::new(HangingFetcher));
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(true);
        });

        tokio::time::timeout(Duration::from_secs(5), poll.run(rx))
            .await
            .expect("stop signal should cancel the pending fetch");

        assert_eq!(poll.cycles(), 0);
        assert_eq!(poll.state(), MonitorState::Stopped);
    }

    #[tokio::test]
    async fn test_false_signal_does_not_shorten_sleep() {
        let h = Harness::new();
        let mut poll = h.poll_loop(&["frogner"], None);
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(false);
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(tx);
        });

        let finished = tokio::time::timeout(Duration::from_millis(200), poll.run(rx)).await;

        assert!(finished.is_err());
        assert_eq!(poll.cycles(), 1);
        assert_eq!(h.fetcher.calls().len(), 1);
    }
}
