// src/filter.rs
//! Filter engine: predicate composition over an extracted delta.
//!
//! Built once per pass from a fresh [`Settings`] snapshot. A study is accepted
//! iff it passes every active rule; rules don't see each other.

use crate::config::Settings;
use crate::model::Study;

#[derive(Clone, Debug, PartialEq)]
enum Rule {
    /// Reward rules pass studies that show no reward at all.
    MinReward(f64),
    /// Skipped for studies with an unknown (zero) duration.
    MinTime(u32),
    NameBlacklist(Vec<String>),
    ResearcherBlacklist(Vec<String>),
    MinHourly(f64),
    MinPay(f64),
    HideUnderOne,
    Whitelist(Vec<String>),
}

impl Rule {
    fn accepts(&self, study: &Study) -> bool {
        match self {
            Rule::MinReward(min) => reward(study).is_none_or(|r| r >= *min),
            Rule::MinTime(min) => study.time_in_minutes == 0 || study.time_in_minutes >= *min,
            Rule::NameBlacklist(names) => !contains_any(study.title.as_deref(), names),
            Rule::ResearcherBlacklist(names) => !contains_any(study.researcher.as_deref(), names),
            Rule::MinHourly(min) => hourly(study).is_none_or(|r| r >= *min),
            Rule::MinPay(min) => reward(study).is_none_or(|r| r >= *min),
            Rule::HideUnderOne => reward(study).is_none_or(|r| r >= 1.0),
            Rule::Whitelist(names) => contains_any(study.researcher.as_deref(), names),
        }
    }
}

/// `None` when the listing showed no reward; present but unreadable text reads as 0.
fn reward(study: &Study) -> Option<f64> {
    shown(study.reward.as_deref()).then(|| study.reward_money().amount)
}

fn hourly(study: &Study) -> Option<f64> {
    shown(study.reward_per_hour.as_deref()).then(|| study.reward_per_hour_money().amount)
}

fn shown(text: Option<&str>) -> bool {
    text.is_some_and(|t| !t.trim().is_empty())
}

/// Case-insensitive substring match of any needle; `None` haystacks match nothing.
fn contains_any(haystack: Option<&str>, needles: &[String]) -> bool {
    let Some(h) = haystack else { return false };
    let h = h.to_lowercase();
    needles.iter().any(|n| h.contains(n.as_str()))
}

/// Lowercased, trimmed, blanks removed.
fn needles(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Clone, Debug, Default)]
pub struct FilterEngine {
    rules: Vec<Rule>,
}

impl FilterEngine {
    pub fn new(settings: &Settings) -> Self {
        let mut rules = Vec::new();

        if settings.reward > 0.0 {
            rules.push(Rule::MinReward(settings.reward));
        }
        if settings.time > 0 {
            rules.push(Rule::MinTime(settings.time));
        }
        let names = needles(&settings.name_blacklist);
        if !names.is_empty() {
            rules.push(Rule::NameBlacklist(names));
        }
        let researchers = needles(&settings.researcher_blacklist);
        if !researchers.is_empty() {
            rules.push(Rule::ResearcherBlacklist(researchers));
        }
        if settings.reward_per_hour > 0.0 {
            rules.push(Rule::MinHourly(settings.reward_per_hour));
        }
        if settings.min_pay > 0.0 {
            rules.push(Rule::MinPay(settings.min_pay));
        }
        if settings.hide_under_one_dollar {
            rules.push(Rule::HideUnderOne);
        }
        if settings.use_whitelist {
            let allowed = needles(&settings.researcher_whitelist);
            if !allowed.is_empty() {
                rules.push(Rule::Whitelist(allowed));
            }
        }

        Self { rules }
    }

    /// Whether any knob is set at all.
    pub fn is_active(&self) -> bool {
        !self.rules.is_empty()
    }

    pub fn accepts(&self, study: &Study) -> bool {
        self.rules.iter().all(|r| r.accepts(study))
    }

    /// Accepted studies in their original order.
    pub fn apply(&self, delta: Vec<Study>) -> Vec<Study> {
        if !self.is_active() {
            return delta;
        }
        delta.into_iter().filter(|s| self.accepts(s)).collect()
    }
}

/// Case-insensitive match of `term` against title or researcher. A blank term matches everything.
pub fn search<'a>(studies: &'a [Study], term: &str) -> Vec<&'a Study> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return studies.iter().collect();
    }
    let needle = [term];
    studies
        .iter()
        .filter(|s| contains_any(s.title.as_deref(), &needle) || contains_any(s.researcher.as_deref(), &needle))
        .collect()
}
