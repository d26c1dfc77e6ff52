//! Test doubles for the boundary collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use crate::error::{AppError, Result};
use crate::models::{Facility, Slot, SlotKey, SlotSet};
use crate::services::{DesktopNotifier, EmailMessage, EmailSender, SlotFetcher};

pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, 20).unwrap()
}

/// One-hour slot on 2025-08-20 starting at `hour`.
pub fn slot(facility: &str, court: &str, hour: u32) -> Slot {
    Slot::new(
        facility,
        court,
        test_date(),
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(hour + 1, 0, 0).unwrap(),
    )
}

pub fn slot_set(slots: &[Slot]) -> SlotSet {
    slots.iter().cloned().collect()
}

/// Records every toast.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    calls: Arc<Mutex<Vec<(String, String)>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl DesktopNotifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        if self.fail {
            return Err(AppError::notification("no notification daemon"));
        }
        Ok(())
    }
}

/// Records every email send attempt.
#[derive(Clone, Default)]
pub struct RecordingEmail {
    sent: Arc<Mutex<Vec<(EmailMessage, Vec<String>)>>>,
    fail: bool,
}

impl RecordingEmail {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(EmailMessage, Vec<String>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmail {
    async fn send(&self, message: &EmailMessage, recipients: &[String]) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((message.clone(), recipients.to_vec()));
        if self.fail {
            return Err(AppError::email("connection refused"));
        }
        Ok(())
    }
}

type Script = HashMap<SlotKey, VecDeque<std::result::Result<SlotSet, String>>>;

/// Replays scripted responses per key. An exhausted script repeats its
/// last successful set, or an empty set if there was none.
#[derive(Clone, Default)]
pub struct ScriptedFetcher {
    script: Arc<Mutex<Script>>,
    last: Arc<Mutex<HashMap<SlotKey, SlotSet>>>,
    calls: Arc<Mutex<Vec<SlotKey>>>,
}

impl ScriptedFetcher {
    pub fn respond(&self, key: &SlotKey, slots: SlotSet) -> &Self {
        self.push(key, Ok(slots))
    }

    pub fn fail(&self, key: &SlotKey, error: &str) -> &Self {
        self.push(key, Err(error.to_string()))
    }

    fn push(&self, key: &SlotKey, response: std::result::Result<SlotSet, String>) -> &Self {
        self.script
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_default()
            .push_back(response);
        self
    }

    /// Keys fetched so far, in call order.
    pub fn calls(&self) -> Vec<SlotKey> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SlotFetcher for ScriptedFetcher {
    async fn fetch(&self, facility: &Facility, date: NaiveDate) -> Result<SlotSet> {
        let key = SlotKey::new(facility.name.clone(), date);
        self.calls.lock().unwrap().push(key.clone());

        let next = self
            .script
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Ok(slots)) => {
                self.last.lock().unwrap().insert(key, slots.clone());
                Ok(slots)
            }
            Some(Err(message)) => Err(AppError::fetch(key.to_string(), message)),
            None => Ok(self
                .last
                .lock()
                .unwrap()
                .get(&key)
                .cloned()
                .unwrap_or_default()),
        }
    }
}
