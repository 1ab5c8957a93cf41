// src/extract.rs
//! Study extractor: raw list items → new `Study` records.
//!
//! Stateless given its inputs. Items already persisted in the current window
//! (or repeated within the same read) are not new and are left out; items
//! without an id are dropped; everything else degrades field by field.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::core::money::parse_duration;
use crate::currency::{Currency, RateTable};
use crate::listing::RawItem;
use crate::model::Study;
use crate::progress::Progress;

/// Second segment of a hyphen-delimited test id: `"study-abc123"` → `"abc123"`.
pub fn study_id(test_id: &str) -> Option<&str> {
    test_id.split('-').nth(1).filter(|id| !id.is_empty())
}

/// Host line minus its leading label word: `"By Oxford Lab"` → `"Oxford Lab"`.
pub fn researcher_name(host: &str) -> Option<String> {
    let name = host.split(' ').skip(1).collect::<Vec<_>>().join(" ");
    let name = name.trim();
    (!name.is_empty()).then(|| s!(name))
}

pub struct Extractor<'a> {
    known: &'a HashSet<String>,
    rates: &'a RateTable,
    currency: Currency,
    now: DateTime<Utc>,
}

impl<'a> Extractor<'a> {
    pub fn new(known: &'a HashSet<String>, rates: &'a RateTable, currency: Currency, now: DateTime<Utc>) -> Self {
        Self { known, rates, currency, now }
    }

    /// The delta: newly seen studies in page order.
    pub fn extract(&self, items: &[RawItem], mut progress: Option<&mut dyn Progress>) -> Vec<Study> {
        if let Some(p) = progress.as_deref_mut() {
            p.begin(items.len());
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut delta = Vec::new();

        for item in items {
            let Some(id) = item.test_id.as_deref().and_then(study_id) else {
                if let Some(p) = progress.as_deref_mut() {
                    p.log("skipping list item without a study id");
                }
                continue;
            };
            if self.known.contains(id) || !seen.insert(id) {
                continue;
            }
            let study = self.study(id, item);
            if let Some(p) = progress.as_deref_mut() {
                p.item_done(&study.id);
            }
            delta.push(study);
        }

        if let Some(p) = progress.as_deref_mut() {
            p.finish();
        }
        delta
    }

    fn study(&self, id: &str, item: &RawItem) -> Study {
        let reward_per_hour = item
            .reward_per_hour
            .as_deref()
            .map(|t| t.replace("/hr", ""))
            .map(|t| s!(t.trim()))
            .filter(|t| !t.is_empty());

        Study {
            id: s!(id),
            title: item.title.clone(),
            researcher: item.host.as_deref().and_then(researcher_name),
            reward: item.reward.as_deref().map(|t| self.display(t)),
            reward_per_hour: reward_per_hour.as_deref().map(|t| self.display(t)),
            time: item.completion_time.clone(),
            time_in_minutes: parse_duration(item.completion_time.as_deref()),
            created_at: self.now,
        }
    }

    /// Source amount in the display currency; text without a number is kept as is.
    fn display(&self, text: &str) -> String {
        self.rates
            .convert_display(text, self.currency)
            .unwrap_or_else(|| s!(text))
    }
}
