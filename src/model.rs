// src/model.rs
//! Persisted record shapes. Field names follow the stored camelCase layout.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::money::{Money, parse_money};

/// One listed study as extracted from the page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Study {
    pub id: String,
    pub title: Option<String>,
    pub researcher: Option<String>,
    /// Display string in the user's currency, e.g. `"$1.91"`.
    pub reward: Option<String>,
    pub reward_per_hour: Option<String>,
    /// Display string, e.g. `"10 min"`.
    pub time: Option<String>,
    #[serde(default)]
    pub time_in_minutes: u32,
    /// When this record was extracted (not when it was posted).
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

impl Study {
    pub fn reward_money(&self) -> Money {
        self.reward.as_deref().map(parse_money).unwrap_or(Money::ZERO)
    }

    pub fn reward_per_hour_money(&self) -> Money {
        self.reward_per_hour.as_deref().map(parse_money).unwrap_or(Money::ZERO)
    }

    /// Study page on the host site.
    pub fn url(&self) -> String {
        let mut url = s!(crate::config::consts::STUDY_URL_PREFIX);
        url.push_str(&self.id);
        url
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Pending => "pending",
            Status::Approved => "approved",
            Status::Rejected => "rejected",
        })
    }
}

impl FromStr for Status {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "approved" => Ok(Status::Approved),
            "rejected" => Ok(Status::Rejected),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// A study plus user lifecycle tracking. Lifecycle fields are sticky across
/// re-sightings; only `last_seen` moves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub study: Study,
    #[serde(default)]
    pub first_seen: DateTime<Utc>,
    #[serde(default)]
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub clicked: bool,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actual_pay: Option<f64>,
    #[serde(default)]
    pub status: Status,
}

impl HistoryEntry {
    pub fn first_sighting(study: Study, now: DateTime<Utc>) -> Self {
        Self {
            study,
            first_seen: now,
            last_seen: now,
            clicked: false,
            completed: false,
            completed_date: None,
            actual_pay: None,
            status: Status::Pending,
        }
    }

    /// Take the freshly extracted fields, keep every lifecycle field.
    pub fn resighted(&mut self, study: Study, now: DateTime<Utc>) {
        self.study = study;
        self.last_seen = now;
    }

    pub fn id(&self) -> &str {
        &self.study.id
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyHistory {
    #[serde(default)]
    pub studies: Vec<HistoryEntry>,
    #[serde(default)]
    pub last_updated: DateTime<Utc>,
}

impl StudyHistory {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self { studies: Vec::new(), last_updated: now }
    }
}
