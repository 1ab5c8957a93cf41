// src/pipeline.rs
//! One extraction pass: listing → extractor → filter → store → bus.
//!
//! Passes never overlap. A trigger arriving while a pass is in flight is
//! dropped, not queued; the next natural trigger picks up whatever changed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::bus::{Envelope, Message, Target};
use crate::config::Settings;
use crate::currency::CurrencyNormalizer;
use crate::error::Result;
use crate::extract::Extractor;
use crate::filter::FilterEngine;
use crate::listing::ListingReader;
use crate::model::Study;
use crate::progress::Progress;
use crate::store::{KvStore, StudyStore};

/// What woke the pipeline up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// Structural change on the page.
    Mutation,
    /// Auto-refresh tick.
    Poll,
    /// Explicit request (CLI `scan`).
    Manual,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PassOutcome {
    /// Another pass was in flight.
    Skipped,
    /// Listing container not on the page; nothing read, nothing written.
    NoContainer,
    /// Container present but empty. `cleared` when the current window was reset.
    NoListing { cleared: bool },
    /// `extracted` new ids were seen; `accepted` passed the filters and were persisted.
    Delta { extracted: usize, accepted: Vec<Study> },
}

impl PassOutcome {
    pub fn accepted(&self) -> &[Study] {
        match self {
            PassOutcome::Delta { accepted, .. } => accepted,
            _ => &[],
        }
    }
}

/// Holds the busy flag for the lifetime of one pass.
pub struct PassGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

pub struct Pipeline<R> {
    reader: R,
    sync: Arc<dyn KvStore>,
    studies: StudyStore,
    rates: Arc<CurrencyNormalizer>,
    bus: Option<UnboundedSender<Envelope>>,
    busy: Arc<AtomicBool>,
}

impl<R: ListingReader + 'static> Pipeline<R> {
    pub fn new(reader: R, sync: Arc<dyn KvStore>, studies: StudyStore, rates: Arc<CurrencyNormalizer>) -> Self {
        Self {
            reader,
            sync,
            studies,
            rates,
            bus: None,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Emit `new-studies` envelopes here after each non-empty pass.
    pub fn with_bus(mut self, bus: UnboundedSender<Envelope>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn sync(&self) -> &Arc<dyn KvStore> {
        &self.sync
    }

    pub fn studies(&self) -> &StudyStore {
        &self.studies
    }

    pub fn rates(&self) -> &Arc<CurrencyNormalizer> {
        &self.rates
    }

    /// Fresh settings snapshot; never cached across passes.
    pub fn settings(&self) -> Result<Settings> {
        Ok(Settings::load(&*self.sync)?)
    }

    pub fn container_present(&self) -> Result<bool> {
        Ok(self.reader.read_listing()?.is_some())
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claim the busy flag, or `None` if a pass already holds it.
    pub fn try_begin(&self) -> Option<PassGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassGuard { busy: Arc::clone(&self.busy) })
    }

    /// Run one pass on the calling thread.
    pub fn run_pass(&self, trigger: Trigger, progress: Option<&mut dyn Progress>) -> Result<PassOutcome> {
        let Some(_guard) = self.try_begin() else {
            debug!(?trigger, "pass in flight, trigger dropped");
            return Ok(PassOutcome::Skipped);
        };
        self.pass(trigger, progress)
    }

    /// Run one pass on the blocking pool. `None` when the trigger was dropped.
    /// Errors are logged here; the handle still carries them.
    pub fn trigger(self: &Arc<Self>, trigger: Trigger) -> Option<JoinHandle<Result<PassOutcome>>> {
        let Some(guard) = self.try_begin() else {
            debug!(?trigger, "pass in flight, trigger dropped");
            return None;
        };
        let this = Arc::clone(self);
        Some(tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let outcome = this.pass(trigger, None);
            if let Err(e) = &outcome {
                error!(?trigger, error = %e, "extraction pass abandoned");
            }
            outcome
        }))
    }

    fn pass(&self, trigger: Trigger, progress: Option<&mut dyn Progress>) -> Result<PassOutcome> {
        let settings = self.settings()?;

        let items = match self.reader.read_listing()? {
            Some(items) => items,
            // Watch triggers fire on every page change, rendered or not.
            None if trigger != Trigger::Manual => return Ok(PassOutcome::NoContainer),
            None => Vec::new(),
        };

        if items.is_empty() {
            let cleared = !settings.track_ids;
            if cleared {
                self.studies.clear_current()?;
            }
            debug!(?trigger, cleared, "listing empty");
            return Ok(PassOutcome::NoListing { cleared });
        }

        let known = self.studies.known_ids()?;
        let table = self.rates.table();
        let now = Utc::now();

        let delta = Extractor::new(&known, &table, settings.currency, now).extract(&items, progress);
        let extracted = delta.len();
        let accepted = FilterEngine::new(&settings).apply(delta);

        self.studies.merge_history(&accepted, now)?;
        self.studies.merge_current(&accepted, settings.track_ids, settings.study_history_len)?;

        if accepted.is_empty() {
            debug!(?trigger, items = items.len(), extracted, "no new studies");
        } else {
            info!(?trigger, items = items.len(), extracted, accepted = accepted.len(), "new studies");
            self.emit(&accepted);
        }

        Ok(PassOutcome::Delta { extracted, accepted })
    }

    fn emit(&self, accepted: &[Study]) {
        let Some(bus) = &self.bus else { return };
        let envelope = Envelope::new(Target::Background, Message::NewStudies(accepted.to_vec()));
        if bus.send(envelope).is_err() {
            debug!("bus closed, new-studies event dropped");
        }
    }
}
