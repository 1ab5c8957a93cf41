// tests/common/mod.rs
//
// Shared fakes: in-memory stores, a scriptable listing reader, a recording
// notifier and a canned rate provider.
//
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;

use study_watch::bridge::{Notification, Notifier};
use study_watch::currency::{Currency, CurrencyNormalizer, RateProvider};
use study_watch::error::{RateError, ReadError};
use study_watch::listing::{ListingReader, RawItem};
use study_watch::model::Study;
use study_watch::pipeline::Pipeline;
use study_watch::store::{Items, KvStore, MemoryStore, StudyStore};

pub const FIXTURE: &str = include_str!("../fixtures/studies.html");

/* ---------- builders ---------- */

pub fn items(v: Value) -> Items {
    match v {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn raw(id: &str, title: &str, host: &str, reward: &str) -> RawItem {
    RawItem {
        test_id: Some(format!("study-{id}")),
        title: Some(title.into()),
        host: Some(format!("By {host}")),
        reward: Some(reward.into()),
        reward_per_hour: Some("£6.00/hr".into()),
        completion_time: Some("10 mins".into()),
    }
}

pub fn raws(ids: &[&str]) -> Vec<RawItem> {
    ids.iter().map(|id| raw(id, &format!("Study {id}"), "Some Lab", "£1.00")).collect()
}

pub fn study(id: &str, reward: Option<&str>) -> Study {
    Study {
        id: id.into(),
        title: Some(format!("Study {id}")),
        researcher: Some("Some Lab".into()),
        reward: reward.map(String::from),
        reward_per_hour: None,
        time: Some("10 mins".into()),
        time_in_minutes: 10,
        created_at: Utc::now(),
    }
}

/* ---------- stores ---------- */

pub struct Rig {
    pub sync: Arc<MemoryStore>,
    pub local: Arc<MemoryStore>,
    pub studies: StudyStore,
    pub rates: Arc<CurrencyNormalizer>,
}

impl Rig {
    /// `settings` seeds the sync store, e.g. `json!({"currency": "GBP"})`.
    pub fn new(settings: Value) -> Self {
        let sync = Arc::new(MemoryStore::with_items(items(settings)));
        let local = Arc::new(MemoryStore::new());
        let studies = StudyStore::new(local.clone());
        let rates = Arc::new(CurrencyNormalizer::new(local.clone()));
        Self { sync, local, studies, rates }
    }

    pub fn pipeline<R: ListingReader + 'static>(&self, reader: R) -> Pipeline<R> {
        Pipeline::new(reader, self.sync.clone(), self.studies.clone(), Arc::clone(&self.rates))
    }

    pub fn current_ids(&self) -> Vec<String> {
        self.studies.current_studies().unwrap().into_iter().map(|s| s.id).collect()
    }
}

/* ---------- listing reader ---------- */

/// Serves whatever was last `set`. `hold()` makes reads block until `release()`.
#[derive(Default)]
pub struct FakeReader {
    items: Mutex<Option<Vec<RawItem>>>,
    reads: AtomicUsize,
    held: AtomicBool,
    entered: AtomicBool,
}

impl FakeReader {
    pub fn with(items: Option<Vec<RawItem>>) -> Self {
        let r = Self::default();
        r.set(items);
        r
    }

    pub fn set(&self, items: Option<Vec<RawItem>>) {
        *self.items.lock().unwrap() = items;
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn hold(&self) {
        self.entered.store(false, Ordering::SeqCst);
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
    }

    /// Blocks until a read is parked on `hold()`.
    pub fn wait_entered(&self, timeout: Duration) -> bool {
        wait_for(|| self.entered.load(Ordering::SeqCst), timeout)
    }
}

impl ListingReader for FakeReader {
    fn read_listing(&self) -> Result<Option<Vec<RawItem>>, ReadError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.entered.store(true, Ordering::SeqCst);
        while self.held.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(5));
        }
        Ok(self.items.lock().unwrap().clone())
    }
}

pub fn wait_for(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

pub async fn eventually(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

/* ---------- notifier ---------- */

#[derive(Clone, Debug, PartialEq)]
pub enum Alert {
    Sound(String, f64),
    Note(Notification),
    Badge(String),
    Focus,
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub alerts: Mutex<Vec<Alert>>,
}

impl RecordingNotifier {
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn notes(&self) -> Vec<Notification> {
        self.alerts()
            .into_iter()
            .filter_map(|a| match a {
                Alert::Note(n) => Some(n),
                _ => None,
            })
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn play_sound(&self, audio: &str, gain: f64) {
        self.alerts.lock().unwrap().push(Alert::Sound(audio.into(), gain));
    }
    fn show_notification(&self, note: &Notification) {
        self.alerts.lock().unwrap().push(Alert::Note(note.clone()));
    }
    fn set_badge(&self, text: &str) {
        self.alerts.lock().unwrap().push(Alert::Badge(text.into()));
    }
    fn focus_page(&self) {
        self.alerts.lock().unwrap().push(Alert::Focus);
    }
}

/* ---------- rates ---------- */

pub struct FakeRates {
    pub rates: HashMap<String, f64>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakeRates {
    pub fn ok(pairs: &[(&str, f64)]) -> Self {
        Self {
            rates: pairs.iter().map(|(c, r)| (c.to_string(), *r)).collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self { rates: HashMap::new(), fail: true, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RateProvider for FakeRates {
    async fn fetch_rates(&self, _base: Currency) -> Result<HashMap<String, f64>, RateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RateError::Provider("error".into()));
        }
        Ok(self.rates.clone())
    }
}
