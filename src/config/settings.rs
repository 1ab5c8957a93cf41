// src/config/settings.rs
//! Typed views over the sync-scoped settings store.
//!
//! Settings are owned by whoever edits them (popup, CLI `set`); the core
//! reads them fresh on every pass. Missing keys take the documented defaults
//! and malformed values are dropped with a warning, so a bad value for one
//! knob never blocks extraction.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use super::consts::{DEFAULT_AUDIO, NUMBER_OF_STUDIES_TO_STORE};
use crate::currency::Currency;
use crate::error::StoreError;
use crate::store::{Items, KvStore};

/// Filter thresholds, retention and cadence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Minimum reward, display currency.
    pub reward: f64,
    /// Minimum reward per hour, display currency.
    pub reward_per_hour: f64,
    /// Minimum completion time, minutes.
    pub time: u32,
    pub name_blacklist: Vec<String>,
    pub researcher_blacklist: Vec<String>,
    pub min_pay: f64,
    pub hide_under_one_dollar: bool,
    pub use_whitelist: bool,
    pub researcher_whitelist: Vec<String>,
    /// Size of the current-studies window.
    pub study_history_len: usize,
    /// "Ignore old studies": accumulate the current window instead of replacing it.
    pub track_ids: bool,
    pub currency: Currency,
    /// Polling period in seconds; 0 disables polling.
    pub refresh_rate: u64,
    pub auto_refresh_enabled: bool,
    /// Extra random delay per poll tick, `0..=refresh_jitter` seconds.
    pub refresh_jitter: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reward: 0.0,
            reward_per_hour: 0.0,
            time: 0,
            name_blacklist: Vec::new(),
            researcher_blacklist: Vec::new(),
            min_pay: 0.0,
            hide_under_one_dollar: false,
            use_whitelist: false,
            researcher_whitelist: Vec::new(),
            study_history_len: NUMBER_OF_STUDIES_TO_STORE,
            track_ids: true,
            currency: Currency::Usd,
            refresh_rate: 0,
            auto_refresh_enabled: false,
            refresh_jitter: 0,
        }
    }
}

impl Settings {
    pub const KEYS: &'static [&'static str] = &[
        "reward",
        "rewardPerHour",
        "time",
        "nameBlacklist",
        "researcherBlacklist",
        "minPay",
        "hideUnderOneDollar",
        "useWhitelist",
        "researcherWhitelist",
        "studyHistoryLen",
        "trackIds",
        "currency",
        "refreshRate",
        "autoRefreshEnabled",
        "refreshJitter",
    ];

    pub fn load(store: &dyn KvStore) -> Result<Self, StoreError> {
        Ok(from_items(store.get(Self::KEYS)?))
    }
}

/// Knobs consumed by the notifier bridge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlertSettings {
    pub show_notification: bool,
    pub audio_active: bool,
    pub focus_prolific: bool,
    pub audio: String,
    /// Percent, 0..=100.
    pub volume: f64,
    /// Legacy title-based alerting; suppresses new-study alerts entirely.
    pub use_old: bool,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            show_notification: true,
            audio_active: true,
            focus_prolific: false,
            audio: s!(DEFAULT_AUDIO),
            volume: 100.0,
            use_old: false,
        }
    }
}

impl AlertSettings {
    pub const KEYS: &'static [&'static str] = &[
        "showNotification",
        "audioActive",
        "focusProlific",
        "audio",
        "volume",
        "useOld",
    ];

    pub fn load(store: &dyn KvStore) -> Result<Self, StoreError> {
        Ok(from_items(store.get(Self::KEYS)?))
    }

    /// Playback gain in `0.0..=1.0`.
    pub fn gain(&self) -> f64 {
        (self.volume / 100.0).clamp(0.0, 1.0)
    }
}

/// Values written by "reset values".
pub fn initial_values() -> Items {
    let v = json!({
        "audioActive": true,
        "audio": DEFAULT_AUDIO,
        "showNotification": true,
        "focusProlific": false,
        "useOld": false,
        "openProlific": false,
        "volume": 100,
        "trackIds": true,
        "studyHistoryLen": NUMBER_OF_STUDIES_TO_STORE,
        "sortStudies": "created+",
        "refreshRate": 0,
        "reward": 0,
        "rewardPerHour": 0,
        "time": 0,
        "researcherBlacklist": [],
        "nameBlacklist": [],
    });
    match v {
        Value::Object(map) => map,
        _ => Items::new(),
    }
}

/// Deserialize `T` from raw store items, dropping keys whose values don't fit.
pub(crate) fn from_items<T>(mut items: Items) -> T
where
    T: DeserializeOwned + Default,
{
    loop {
        let err = match serde_json::from_value::<T>(Value::Object(items.clone())) {
            Ok(v) => return v,
            Err(e) => e,
        };

        let offending = items
            .iter()
            .find(|(k, v)| {
                let mut one = Items::new();
                one.insert((*k).clone(), (*v).clone());
                serde_json::from_value::<T>(Value::Object(one)).is_err()
            })
            .map(|(k, _)| k.clone());

        match offending {
            Some(key) => {
                warn!(%key, error = %err, "ignoring malformed setting");
                items.remove(&key);
            }
            None => {
                warn!(error = %err, "settings unreadable, using defaults");
                return T::default();
            }
        }
    }
}
