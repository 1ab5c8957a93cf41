// src/bus.rs
//! Typed messages between the pipeline, the controller and whatever drives
//! them (CLI, tests). Serialized as `{"type": "...", "data": ...}`.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::model::Study;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Target {
    /// Notifier side: sound, notifications, badge, history actions.
    Background,
    /// Page side: watcher lifecycle.
    Content,
    /// Both.
    Everything,
}

impl Target {
    /// Whether a receiver listening as `listener` handles this target.
    pub fn reaches(self, listener: Target) -> bool {
        self == listener || self == Target::Everything
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    /// Alert from the page listing itself; the watcher runs.
    Website,
    /// Any other alert source; the watcher stands down.
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum Message {
    NewStudies(Vec<Study>),
    ChangeAlertType(AlertType),
    ToggleAutoRefresh(bool),
    PlaySound,
    ShowNotification,
    ResetValues,
    MarkCompleted(String),
    ClearHistory,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub target: Target,
    pub message: Message,
}

impl Envelope {
    pub fn new(target: Target, message: Message) -> Self {
        Self { target, message }
    }
}

pub type BusSender = mpsc::UnboundedSender<Envelope>;
pub type BusReceiver = mpsc::UnboundedReceiver<Envelope>;

pub fn channel() -> (BusSender, BusReceiver) {
    mpsc::unbounded_channel()
}
