// src/store/reconcile.rs
//! Reconciliation of extracted deltas into persisted state.
//!
//! Two independent buckets live in the local store:
//! - `currentStudies`: bounded rolling window of recently accepted studies.
//! - `studyHistory`: lifecycle ledger keyed by id, capped at [`HISTORY_CAP`].
//!
//! This module is the only writer of either bucket. Every merge re-reads the
//! bucket right before writing it back.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{KvStore, read_key, write_key};
use crate::config::consts::{COUNTER, CURRENT_STUDIES, HISTORY_CAP, STUDY_HISTORY};
use crate::error::StoreError;
use crate::model::{HistoryEntry, Status, Study, StudyHistory};

/// Accumulate (`track_ids`) or replace, then keep the newest `cap` entries.
pub fn merge_current(existing: Vec<Study>, delta: &[Study], track_ids: bool, cap: usize) -> Vec<Study> {
    let mut merged = if track_ids { existing } else { Vec::with_capacity(delta.len()) };
    merged.extend_from_slice(delta);
    keep_newest(&mut merged, cap);
    merged
}

/// Upsert `delta` into `history` by id, preserving lifecycle fields, then cap.
pub fn merge_history(history: &mut StudyHistory, delta: &[Study], now: DateTime<Utc>, cap: usize) {
    let mut index: HashMap<String, usize> = history
        .studies
        .iter()
        .enumerate()
        .map(|(i, e)| (e.study.id.clone(), i))
        .collect();

    for study in delta {
        match index.get(&study.id) {
            Some(&i) => history.studies[i].resighted(study.clone(), now),
            None => {
                index.insert(study.id.clone(), history.studies.len());
                history.studies.push(HistoryEntry::first_sighting(study.clone(), now));
            }
        }
    }

    keep_newest(&mut history.studies, cap);
    history.last_updated = now;
}

fn keep_newest<T>(v: &mut Vec<T>, cap: usize) {
    if v.len() > cap {
        v.drain(..v.len() - cap);
    }
}

/// Typed access to the `currentStudies` / `studyHistory` / `counter` buckets.
#[derive(Clone)]
pub struct StudyStore {
    local: Arc<dyn KvStore>,
    history_cap: usize,
}

impl StudyStore {
    pub fn new(local: Arc<dyn KvStore>) -> Self {
        Self { local, history_cap: HISTORY_CAP }
    }

    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.history_cap = cap;
        self
    }

    /* ---------- current studies ---------- */

    pub fn current_studies(&self) -> Result<Vec<Study>, StoreError> {
        Ok(read_key(&*self.local, CURRENT_STUDIES)?.unwrap_or_default())
    }

    pub fn known_ids(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.current_studies()?.into_iter().map(|s| s.id).collect())
    }

    pub fn clear_current(&self) -> Result<(), StoreError> {
        debug!("clearing current studies");
        write_key(&*self.local, CURRENT_STUDIES, &Vec::<Study>::new())
    }

    /// Returns `false` (and writes nothing) for an empty delta.
    pub fn merge_current(&self, delta: &[Study], track_ids: bool, cap: usize) -> Result<bool, StoreError> {
        if delta.is_empty() {
            return Ok(false);
        }
        let existing = self.current_studies()?;
        let merged = merge_current(existing, delta, track_ids, cap);
        write_key(&*self.local, CURRENT_STUDIES, &merged)?;
        debug!(added = delta.len(), total = merged.len(), track_ids, "current studies merged");
        Ok(true)
    }

    /* ---------- history ---------- */

    pub fn history(&self) -> Result<StudyHistory, StoreError> {
        Ok(read_key(&*self.local, STUDY_HISTORY)?.unwrap_or_else(|| StudyHistory::empty(Utc::now())))
    }

    /// Returns `false` (and writes nothing) for an empty delta.
    pub fn merge_history(&self, delta: &[Study], now: DateTime<Utc>) -> Result<bool, StoreError> {
        if delta.is_empty() {
            return Ok(false);
        }
        let mut history = self.history()?;
        merge_history(&mut history, delta, now, self.history_cap);
        write_key(&*self.local, STUDY_HISTORY, &history)?;
        debug!(added = delta.len(), total = history.studies.len(), "history merged");
        Ok(true)
    }

    /// Explicit user action: completed, dated, approved.
    pub fn mark_completed(&self, id: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let found = self.update_entry(id, |e| {
            e.completed = true;
            e.completed_date = Some(now);
            e.status = Status::Approved;
        })?;
        if found {
            info!(id, "study marked completed");
        }
        Ok(found)
    }

    pub fn mark_clicked(&self, id: &str) -> Result<bool, StoreError> {
        self.update_entry(id, |e| e.clicked = true)
    }

    /// Explicit approval outcome, optionally with the amount actually paid.
    pub fn record_outcome(&self, id: &str, status: Status, actual_pay: Option<f64>) -> Result<bool, StoreError> {
        self.update_entry(id, |e| {
            e.status = status;
            if actual_pay.is_some() {
                e.actual_pay = actual_pay;
            }
        })
    }

    pub fn clear_history(&self, now: DateTime<Utc>) -> Result<(), StoreError> {
        info!("study history cleared");
        write_key(&*self.local, STUDY_HISTORY, &StudyHistory::empty(now))
    }

    fn update_entry(&self, id: &str, f: impl FnOnce(&mut HistoryEntry)) -> Result<bool, StoreError> {
        let mut history = self.history()?;
        let Some(entry) = history.studies.iter_mut().find(|e| e.id() == id) else {
            return Ok(false);
        };
        f(entry);
        write_key(&*self.local, STUDY_HISTORY, &history)?;
        Ok(true)
    }

    /* ---------- badge counter ---------- */

    pub fn counter(&self) -> Result<u64, StoreError> {
        Ok(read_key(&*self.local, COUNTER)?.unwrap_or(0))
    }

    pub fn add_to_counter(&self, by: u64) -> Result<u64, StoreError> {
        let total = self.counter()?.saturating_add(by);
        write_key(&*self.local, COUNTER, &total)?;
        Ok(total)
    }
}
