// src/watcher.rs
//! Change watcher: decides *when* the pipeline runs.
//!
//! Two trigger sources feed one [`Pipeline`]:
//! - structural mutation batches from a [`ChangeSource`];
//! - an optional polling fallback that re-resolves the listing container
//!   before each pass, since the page may not have rendered it yet.
//!
//! Both go through the pipeline's busy flag, so a trigger that lands during a
//! pass is dropped. `stop()` detaches immediately; a pass already on the
//! blocking pool finishes and writes its results.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use rand::Rng;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::consts::{CONTAINER_RETRY_MS, DEFAULT_REFRESH_SECS};
use crate::error::{Result, WatchError};
use crate::listing::ListingReader;
use crate::pipeline::{Pipeline, Trigger};

/* ---------- mutations ---------- */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    Attributes,
    CharacterData,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mutation {
    pub kind: MutationKind,
    pub added: usize,
    pub removed: usize,
}

impl Mutation {
    pub fn child_list(added: usize, removed: usize) -> Self {
        Self { kind: MutationKind::ChildList, added, removed }
    }

    pub fn attributes() -> Self {
        Self { kind: MutationKind::Attributes, added: 0, removed: 0 }
    }

    pub fn is_structural(&self) -> bool {
        self.added > 0 || self.removed > 0 || self.kind == MutationKind::ChildList
    }
}

pub type MutationBatch = Vec<Mutation>;

/// A batch qualifies when any one of its mutations is structural.
pub fn is_structural(batch: &[Mutation]) -> bool {
    batch.iter().any(Mutation::is_structural)
}

/* ---------- sources ---------- */

/// Live registration with a change source. Dropping it cancels the observation.
pub trait Observation: Send {}

pub trait ChangeSource: Send + Sync {
    fn attach(&self, tx: UnboundedSender<MutationBatch>) -> std::result::Result<Box<dyn Observation>, WatchError>;
}

/// Watches the page snapshot on disk. The parent directory is watched so
/// atomic replace-by-rename is seen too.
#[derive(Clone, Debug)]
pub struct FileChangeSource {
    path: PathBuf,
}

impl FileChangeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

struct FileObservation {
    _watcher: RecommendedWatcher,
}

impl Observation for FileObservation {}

/// Filesystem event → mutation. Reads are not changes.
fn to_mutation(kind: &EventKind) -> Option<Mutation> {
    match kind {
        EventKind::Create(_) => Some(Mutation::child_list(1, 0)),
        EventKind::Remove(_) => Some(Mutation::child_list(0, 1)),
        EventKind::Modify(ModifyKind::Metadata(_)) => Some(Mutation::attributes()),
        EventKind::Modify(_) | EventKind::Any => Some(Mutation::child_list(1, 1)),
        EventKind::Access(_) | EventKind::Other => None,
    }
}

fn concerns(event: &Event, name: &std::ffi::OsStr) -> bool {
    event.paths.iter().any(|p| p.file_name() == Some(name))
}

impl ChangeSource for FileChangeSource {
    fn attach(&self, tx: UnboundedSender<MutationBatch>) -> std::result::Result<Box<dyn Observation>, WatchError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            Some(_) => PathBuf::from("."),
            None => return Err(WatchError::NoParent(self.path.clone())),
        };
        let Some(name) = self.path.file_name().map(|n| n.to_os_string()) else {
            return Err(WatchError::NoParent(self.path.clone()));
        };

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if concerns(&event, &name) => {
                if let Some(m) = to_mutation(&event.kind) {
                    let _ = tx.send(vec![m]);
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "snapshot watch error"),
        })?;
        watcher.watch(&parent, RecursiveMode::NonRecursive)?;
        debug!(path = %self.path.display(), "watching snapshot");

        Ok(Box::new(FileObservation { _watcher: watcher }))
    }
}

/// Source driven by hand; batches pushed while nothing is attached are lost.
#[derive(Clone, Default)]
pub struct ManualChangeSource {
    slot: Arc<Mutex<Option<UnboundedSender<MutationBatch>>>>,
}

impl ManualChangeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.lock().is_some()
    }

    /// `false` when no observer is attached.
    pub fn push(&self, batch: MutationBatch) -> bool {
        match self.lock().as_ref() {
            Some(tx) => tx.send(batch).is_ok(),
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<UnboundedSender<MutationBatch>>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct ManualObservation {
    slot: Arc<Mutex<Option<UnboundedSender<MutationBatch>>>>,
}

impl Observation for ManualObservation {}

impl Drop for ManualObservation {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl ChangeSource for ManualChangeSource {
    fn attach(&self, tx: UnboundedSender<MutationBatch>) -> std::result::Result<Box<dyn Observation>, WatchError> {
        *self.lock() = Some(tx);
        Ok(Box::new(ManualObservation { slot: Arc::clone(&self.slot) }))
    }
}

/* ---------- watcher ---------- */

/// Aborts its task when dropped.
struct TaskGuard(JoinHandle<()>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct ActiveWatch {
    _observation: Box<dyn Observation>,
    _dispatcher: TaskGuard,
    poller: Option<TaskGuard>,
}

impl ActiveWatch {
    fn is_polling(&self) -> bool {
        self.poller.is_some()
    }
}

enum WatcherState {
    Idle,
    Watching(ActiveWatch),
}

pub struct ChangeWatcher<R> {
    pipeline: Arc<Pipeline<R>>,
    source: Arc<dyn ChangeSource>,
    state: WatcherState,
}

impl<R: ListingReader + 'static> ChangeWatcher<R> {
    pub fn new(pipeline: Arc<Pipeline<R>>, source: Arc<dyn ChangeSource>) -> Self {
        Self { pipeline, source, state: WatcherState::Idle }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline<R>> {
        &self.pipeline
    }

    pub fn is_watching(&self) -> bool {
        matches!(self.state, WatcherState::Watching(_))
    }

    pub fn is_polling(&self) -> bool {
        matches!(&self.state, WatcherState::Watching(w) if w.is_polling())
    }

    /// `idle → watching`. Returns `false` if already watching.
    /// Must be called within a tokio runtime.
    pub fn start(&mut self) -> Result<bool> {
        if self.is_watching() {
            return Ok(false);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let observation = self.source.attach(tx)?;
        let dispatcher = TaskGuard(tokio::spawn(dispatch(Arc::clone(&self.pipeline), rx)));

        let settings = self.pipeline.settings()?;
        let poller = (settings.auto_refresh_enabled && settings.refresh_rate > 0)
            .then(|| spawn_poller(Arc::clone(&self.pipeline), settings.refresh_rate, settings.refresh_jitter));

        info!(polling = poller.is_some(), "watcher started");
        self.state = WatcherState::Watching(ActiveWatch {
            _observation: observation,
            _dispatcher: dispatcher,
            poller,
        });
        Ok(true)
    }

    /// `watching → idle`. Returns `false` if already idle.
    pub fn stop(&mut self) -> bool {
        match std::mem::replace(&mut self.state, WatcherState::Idle) {
            WatcherState::Idle => false,
            WatcherState::Watching(_) => {
                info!("watcher stopped");
                true
            }
        }
    }

    /// (Re)start or stop the polling fallback. Enabling uses `refreshRate`,
    /// or the default period when unset. No effect while idle.
    pub fn set_auto_refresh(&mut self, enabled: bool) -> Result<bool> {
        let WatcherState::Watching(active) = &mut self.state else {
            debug!(enabled, "auto-refresh toggled while idle");
            return Ok(false);
        };
        active.poller = None;
        if enabled {
            let settings = self.pipeline.settings()?;
            let secs = if settings.refresh_rate > 0 { settings.refresh_rate } else { DEFAULT_REFRESH_SECS };
            active.poller = Some(spawn_poller(Arc::clone(&self.pipeline), secs, settings.refresh_jitter));
        }
        info!(enabled, "auto-refresh toggled");
        Ok(true)
    }
}

async fn dispatch<R: ListingReader + 'static>(pipeline: Arc<Pipeline<R>>, mut rx: mpsc::UnboundedReceiver<MutationBatch>) {
    while let Some(batch) = rx.recv().await {
        if !is_structural(&batch) {
            continue;
        }
        // Passes run detached; a busy pipeline drops the trigger.
        let _ = pipeline.trigger(Trigger::Mutation);
    }
    debug!("mutation stream closed");
}

fn spawn_poller<R: ListingReader + 'static>(pipeline: Arc<Pipeline<R>>, secs: u64, jitter: u64) -> TaskGuard {
    let period = Duration::from_secs(secs);
    debug!(secs, jitter, "polling fallback started");
    TaskGuard(tokio::spawn(async move {
        loop {
            tokio::time::sleep(period + jitter_delay(jitter)).await;
            match wait_for_container(&pipeline).await {
                Ok(()) => {
                    let _ = pipeline.trigger(Trigger::Poll);
                }
                Err(e) => warn!(error = %e, "poll tick skipped"),
            }
        }
    }))
}

fn jitter_delay(max_secs: u64) -> Duration {
    if max_secs == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_secs.saturating_mul(1000)))
}

/// Resolves once the listing container is on the page.
async fn wait_for_container<R: ListingReader + 'static>(pipeline: &Arc<Pipeline<R>>) -> Result<()> {
    loop {
        let p = Arc::clone(pipeline);
        if tokio::task::spawn_blocking(move || p.container_present()).await?? {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(CONTAINER_RETRY_MS)).await;
    }
}

