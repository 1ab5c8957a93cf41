// src/bridge.rs
//! Notifier bridge and the controller that routes bus messages.
//!
//! The [`Controller`] owns the watcher, consumes [`Envelope`]s and turns
//! `new-studies` into sound / focus / notifications / badge through a
//! [`Notifier`]. It also schedules the background exchange-rate refresh.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bus::{AlertType, BusReceiver, Envelope, Message, Target};
use crate::config::consts::{AUTO_REFRESH_ENABLED, LISTING_URL, NOTIFY_GAP_MS, NOTIFY_MESSAGE, NOTIFY_TITLE, RATE_CHECK_SECS};
use crate::config::settings::{AlertSettings, initial_values};
use crate::currency::{RateProvider, RateTable};
use crate::error::Result;
use crate::listing::ListingReader;
use crate::model::Study;
use crate::store::{KvStore, StudyStore, write_key};
use crate::watcher::ChangeWatcher;

/// Side effects the host environment provides.
pub trait Notifier: Send + Sync + 'static {
    /// `gain` in `0.0..=1.0`.
    fn play_sound(&self, audio: &str, gain: f64);
    fn show_notification(&self, note: &Notification);
    fn set_badge(&self, text: &str);
    /// Bring the listing page to the foreground.
    fn focus_page(&self);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// Study id, `None` for generic alerts.
    pub id: Option<String>,
    pub title: String,
    pub message: String,
    /// Page opened when the notification is clicked.
    pub link: String,
}

impl Notification {
    pub fn generic() -> Self {
        Self { id: None, title: s!(NOTIFY_TITLE), message: s!(NOTIFY_MESSAGE), link: s!(LISTING_URL) }
    }

    pub fn for_study(study: &Study) -> Self {
        let title = match (&study.title, &study.researcher) {
            (Some(t), Some(r)) => format!("{t}\nBy {r}"),
            _ => s!(NOTIFY_TITLE),
        };

        let mut message = s!(NOTIFY_MESSAGE);
        if let Some(r) = &study.reward {
            message.push_str(&format!("\nReward: {r}"));
        }
        if let Some(r) = &study.reward_per_hour {
            message.push_str(&format!("\nReward per hour: {r}"));
        }
        if let Some(t) = &study.time {
            message.push_str(&format!("\nTime: {t}"));
        }

        Self { id: Some(study.id.clone()), title, message, link: study.url() }
    }
}

/// Notifications for one delta, best-paying first, each with its delay from
/// the start: the first immediately, then one per `gap`.
pub fn notification_plan(studies: &[Study], table: &RateTable, gap: Duration) -> Vec<(Duration, Notification)> {
    let mut ranked: Vec<(f64, &Study)> = studies
        .iter()
        .map(|s| (table.to_gbp(s.reward_money()), s))
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

    ranked
        .into_iter()
        .enumerate()
        .map(|(i, (_, s))| (gap * i as u32, Notification::for_study(s)))
        .collect()
}

/// Clear the current window and write default settings.
pub fn reset_values(sync: &dyn KvStore, studies: &StudyStore) -> Result<()> {
    studies.clear_current()?;
    sync.set(initial_values())?;
    info!("settings reset to defaults");
    Ok(())
}

/// Writes every side effect to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn play_sound(&self, audio: &str, gain: f64) {
        info!(target: "study_watch::notify", audio, gain, "play sound");
    }

    fn show_notification(&self, note: &Notification) {
        info!(target: "study_watch::notify", id = ?note.id, link = %note.link, title = %note.title, message = %note.message, "notification");
    }

    fn set_badge(&self, text: &str) {
        info!(target: "study_watch::notify", text, "badge");
    }

    fn focus_page(&self) {
        info!(target: "study_watch::notify", "focus page");
    }
}

pub struct Controller<R, N, P> {
    watcher: ChangeWatcher<R>,
    notifier: Arc<N>,
    provider: Arc<P>,
    gap: Duration,
}

impl<R, N, P> Controller<R, N, P>
where
    R: ListingReader + 'static,
    N: Notifier,
    P: RateProvider,
{
    pub fn new(watcher: ChangeWatcher<R>, notifier: Arc<N>, provider: Arc<P>) -> Self {
        Self { watcher, notifier, provider, gap: Duration::from_millis(NOTIFY_GAP_MS) }
    }

    /// Delay between staggered notifications.
    pub fn with_gap(mut self, gap: Duration) -> Self {
        self.gap = gap;
        self
    }

    pub fn watcher(&self) -> &ChangeWatcher<R> {
        &self.watcher
    }

    /// Route one envelope. Each side handles only the types addressed to it.
    pub fn dispatch(&mut self, envelope: &Envelope) -> Result<()> {
        debug!(to = ?envelope.target, "dispatch");
        if envelope.target.reaches(Target::Content) {
            self.on_content(&envelope.message)?;
        }
        if envelope.target.reaches(Target::Background) {
            self.on_background(&envelope.message)?;
        }
        Ok(())
    }

    fn on_content(&mut self, message: &Message) -> Result<()> {
        match message {
            Message::ChangeAlertType(AlertType::Website) => {
                self.watcher.start()?;
            }
            Message::ChangeAlertType(AlertType::Other) => {
                self.watcher.stop();
            }
            Message::ToggleAutoRefresh(enabled) => {
                write_key(&**self.watcher.pipeline().sync(), AUTO_REFRESH_ENABLED, enabled)?;
                self.watcher.set_auto_refresh(*enabled)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn on_background(&self, message: &Message) -> Result<()> {
        let pipeline = self.watcher.pipeline();
        match message {
            Message::NewStudies(studies) => {
                self.handle_new_studies(studies)?;
            }
            Message::PlaySound => {
                let alerts = AlertSettings::load(&**pipeline.sync())?;
                self.notifier.play_sound(&alerts.audio, alerts.gain());
                self.notifier.show_notification(&Notification::generic());
            }
            Message::ShowNotification => self.notifier.show_notification(&Notification::generic()),
            Message::ResetValues => self.reset_values()?,
            Message::MarkCompleted(id) => {
                if !pipeline.studies().mark_completed(id, Utc::now())? {
                    warn!(%id, "mark completed: no such study in history");
                }
            }
            Message::ClearHistory => pipeline.studies().clear_history(Utc::now())?,
            Message::ChangeAlertType(_) | Message::ToggleAutoRefresh(_) => {}
        }
        Ok(())
    }

    /// Alert for a freshly accepted delta. The returned handle completes once
    /// every staggered notification has been shown.
    pub fn handle_new_studies(&self, studies: &[Study]) -> Result<Option<JoinHandle<()>>> {
        if studies.is_empty() {
            return Ok(None);
        }
        let pipeline = self.watcher.pipeline();
        let alerts = AlertSettings::load(&**pipeline.sync())?;
        if alerts.use_old {
            debug!("title-based alerting selected, new studies not announced");
            return Ok(None);
        }

        if alerts.audio_active {
            self.notifier.play_sound(&alerts.audio, alerts.gain());
        }
        if alerts.focus_prolific {
            self.notifier.focus_page();
        }

        let shown = alerts.show_notification.then(|| {
            let plan = notification_plan(studies, &pipeline.rates().table(), self.gap);
            let notifier = Arc::clone(&self.notifier);
            tokio::spawn(async move {
                let start = tokio::time::Instant::now();
                for (delay, note) in plan {
                    tokio::time::sleep_until(start + delay).await;
                    notifier.show_notification(&note);
                }
            })
        });

        let total = pipeline.studies().add_to_counter(studies.len() as u64)?;
        self.notifier.set_badge(&total.to_string());
        info!(count = studies.len(), total, "new studies announced");
        Ok(shown)
    }

    pub fn reset_values(&self) -> Result<()> {
        let pipeline = self.watcher.pipeline();
        reset_values(&**pipeline.sync(), pipeline.studies())
    }

    /// Load cached rates, keep them fresh in the background, start watching,
    /// then serve the bus until it closes or `shutdown` resolves.
    pub async fn run<F>(mut self, mut rx: BusReceiver, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let rates = Arc::clone(self.watcher.pipeline().rates());
        if let Err(e) = rates.load_cached() {
            warn!(error = %e, "cached exchange rates unreadable");
        }
        let provider = Arc::clone(&self.provider);
        let refresher = tokio::spawn(async move {
            let mut every = tokio::time::interval(Duration::from_secs(RATE_CHECK_SECS));
            loop {
                every.tick().await;
                rates.refresh_if_stale(&*provider, Utc::now()).await;
            }
        });

        self.watcher.start()?;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                next = rx.recv() => match next {
                    Some(envelope) => {
                        if let Err(e) = self.dispatch(&envelope) {
                            error!(error = %e, "message handling failed");
                        }
                    }
                    None => break,
                },
            }
        }

        refresher.abort();
        self.watcher.stop();
        Ok(())
    }
}
