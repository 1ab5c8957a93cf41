// tests/extract_filter.rs
//
// Extractor (raw items → delta) and filter engine (delta → accepted).
//
mod common;

use std::collections::HashSet;

use chrono::Utc;
use study_watch::config::Settings;
use study_watch::currency::{Currency, RateTable};
use study_watch::extract::{Extractor, researcher_name, study_id};
use study_watch::filter::{FilterEngine, search};
use study_watch::listing::RawItem;
use study_watch::progress::Progress;
use study_watch::specs::studies::parse_listing;

use common::study;

#[derive(Default)]
struct Counting {
    total: usize,
    done: Vec<String>,
    logs: usize,
    finished: bool,
}

impl Progress for Counting {
    fn begin(&mut self, total: usize) { self.total = total; }
    fn log(&mut self, _msg: &str) { self.logs += 1; }
    fn item_done(&mut self, id: &str) { self.done.push(id.to_string()); }
    fn finish(&mut self) { self.finished = true; }
}

#[test]
fn id_and_researcher_helpers() {
    assert_eq!(study_id("study-abc123"), Some("abc123"));
    assert_eq!(study_id("study-abc-extra"), Some("abc"));
    assert_eq!(study_id("study-"), None);
    assert_eq!(study_id("noid"), None);

    assert_eq!(researcher_name("By Oxford Lab").as_deref(), Some("Oxford Lab"));
    assert_eq!(researcher_name("By"), None);
    assert_eq!(researcher_name(""), None);
}

#[test]
fn fixture_extracts_new_ids_once() {
    let items = parse_listing(common::FIXTURE).unwrap();
    let known = HashSet::new();
    let table = RateTable::fallback();
    let mut progress = Counting::default();

    let delta = Extractor::new(&known, &table, Currency::Gbp, Utc::now()).extract(&items, Some(&mut progress));

    let ids: Vec<&str> = delta.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["aaa111", "bbb222", "ccc333", "ddd444"]);
    assert_eq!(progress.total, 6);
    assert_eq!(progress.done, ["aaa111", "bbb222", "ccc333", "ddd444"]);
    assert_eq!(progress.logs, 1, "one item without id");
    assert!(progress.finished);

    let a = &delta[0];
    assert_eq!(a.title.as_deref(), Some("Decision making & memory"));
    assert_eq!(a.researcher.as_deref(), Some("Oxford Lab"));
    assert_eq!(a.reward.as_deref(), Some("£1.50"));
    assert_eq!(a.reward_per_hour.as_deref(), Some("£9.00"));
    assert_eq!(a.time.as_deref(), Some("10 mins"));
    assert_eq!(a.time_in_minutes, 10);

    // Source dollars are approximated to GBP at 0.8.
    let c = &delta[2];
    assert_eq!(c.reward.as_deref(), Some("£2.00"));
    assert_eq!(c.reward_per_hour.as_deref(), Some("£8.00"));
    assert_eq!(c.time_in_minutes, 75);

    let d = &delta[3];
    assert_eq!((d.researcher.as_deref(), d.reward.as_deref(), d.time_in_minutes), (None, None, 0));
}

#[test]
fn known_ids_are_not_new() {
    let items = parse_listing(common::FIXTURE).unwrap();
    let known: HashSet<String> = ["aaa111", "ccc333"].into_iter().map(String::from).collect();
    let table = RateTable::fallback();

    let delta = Extractor::new(&known, &table, Currency::Gbp, Utc::now()).extract(&items, None);
    let ids: Vec<&str> = delta.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["bbb222", "ddd444"]);
}

#[test]
fn rewards_shown_in_display_currency() {
    let item = RawItem {
        test_id: Some("study-x1".into()),
        reward: Some("£2.00".into()),
        reward_per_hour: Some("Unknown/hr".into()),
        ..Default::default()
    };
    let known = HashSet::new();
    let table = RateTable::fallback();
    let delta = Extractor::new(&known, &table, Currency::Usd, Utc::now()).extract(&[item], None);

    assert_eq!(delta[0].reward.as_deref(), Some("$2.54"));
    // No number: the text stays as it was.
    assert_eq!(delta[0].reward_per_hour.as_deref(), Some("Unknown"));
}

fn settings(f: impl FnOnce(&mut Settings)) -> Settings {
    let mut s = Settings::default();
    f(&mut s);
    s
}

#[test]
fn default_settings_filter_nothing() {
    let engine = FilterEngine::new(&Settings::default());
    assert!(!engine.is_active());

    let delta = vec![study("a", None), study("b", Some("£0.01"))];
    assert_eq!(engine.apply(delta.clone()), delta);
}

#[test]
fn all_active_rules_must_pass() {
    let engine = FilterEngine::new(&settings(|s| {
        s.min_pay = 2.0;
        s.hide_under_one_dollar = true;
    }));
    assert!(engine.is_active());
    assert!(!engine.accepts(&study("a", Some("$1.50"))));
    assert!(engine.accepts(&study("b", Some("$2.50"))));
    assert!(!engine.accepts(&study("c", Some("$0.50"))));
}

#[test]
fn whitelist_excludes_everything_unmatched() {
    let engine = FilterEngine::new(&settings(|s| {
        s.use_whitelist = true;
        s.researcher_whitelist = vec!["Oxford".into()];
    }));

    let mut stanford = study("a", Some("£1.00"));
    stanford.researcher = Some("Stanford Lab".into());
    let mut oxford = study("b", Some("£1.00"));
    oxford.researcher = Some("University of Oxford".into());
    let mut nobody = study("c", Some("£1.00"));
    nobody.researcher = None;

    assert!(!engine.accepts(&stanford));
    assert!(engine.accepts(&oxford));
    assert!(!engine.accepts(&nobody));
}

#[test]
fn whitelist_needs_entries_and_flag() {
    let off = FilterEngine::new(&settings(|s| s.researcher_whitelist = vec!["Oxford".into()]));
    assert!(!off.is_active());
    let empty = FilterEngine::new(&settings(|s| s.use_whitelist = true));
    assert!(!empty.is_active());
}

#[test]
fn blacklists_are_case_insensitive_substrings() {
    let engine = FilterEngine::new(&settings(|s| {
        s.name_blacklist = vec!["SURVEY".into()];
        s.researcher_blacklist = vec!["spam".into()];
    }));

    let mut titled = study("a", Some("£1.00"));
    titled.title = Some("Quick survey about food".into());
    let mut hosted = study("b", Some("£1.00"));
    hosted.researcher = Some("SpamCo Research".into());
    let clean = study("c", Some("£1.00"));

    assert!(!engine.accepts(&titled));
    assert!(!engine.accepts(&hosted));
    assert!(engine.accepts(&clean));
}

#[test]
fn time_rule_skips_unknown_durations() {
    let engine = FilterEngine::new(&settings(|s| s.time = 15));

    let short = study("a", Some("£1.00")); // 10 minutes
    let mut long = study("b", Some("£1.00"));
    long.time_in_minutes = 20;
    let mut unknown = study("c", Some("£1.00"));
    unknown.time_in_minutes = 0;

    assert!(!engine.accepts(&short));
    assert!(engine.accepts(&long));
    assert!(engine.accepts(&unknown));
}

#[test]
fn reward_thresholds() {
    let engine = FilterEngine::new(&settings(|s| {
        s.reward = 1.0;
        s.reward_per_hour = 6.0;
    }));

    let mut ok = study("a", Some("£1.20"));
    ok.reward_per_hour = Some("£7.00".into());
    let mut cheap_hourly = study("b", Some("£1.20"));
    cheap_hourly.reward_per_hour = Some("£5.00".into());
    let mut no_reward = study("c", None);
    no_reward.reward_per_hour = Some("£7.00".into());
    let mut unreadable = study("d", Some("soon"));
    unreadable.reward_per_hour = Some("£7.00".into());

    assert!(engine.accepts(&ok));
    assert!(!engine.accepts(&cheap_hourly));
    assert!(engine.accepts(&no_reward));
    assert!(!engine.accepts(&unreadable));
}

#[test]
fn missing_amounts_skip_their_rules() {
    let bare = study("x", None);
    assert_eq!(bare.reward_per_hour, None);

    let cases: [(&str, Settings); 4] = [
        ("reward", settings(|s| s.reward = 1.0)),
        ("minPay", settings(|s| s.min_pay = 1.0)),
        ("hideUnderOneDollar", settings(|s| s.hide_under_one_dollar = true)),
        ("rewardPerHour", settings(|s| s.reward_per_hour = 5.0)),
    ];
    for (knob, s) in cases {
        let engine = FilterEngine::new(&s);
        assert!(engine.is_active(), "{knob}");
        assert!(engine.accepts(&bare), "{knob} rejected a study without that amount");
    }

    let mut blank = study("y", Some("  "));
    blank.reward_per_hour = Some(String::new());
    assert!(FilterEngine::new(&settings(|s| {
        s.min_pay = 1.0;
        s.reward_per_hour = 5.0;
    }))
    .accepts(&blank));

    let mut cheap = study("z", Some("£0.50"));
    cheap.reward_per_hour = Some("£2.00".into());
    for (knob, s) in [
        ("reward", settings(|s| s.reward = 1.0)),
        ("minPay", settings(|s| s.min_pay = 1.0)),
        ("hideUnderOneDollar", settings(|s| s.hide_under_one_dollar = true)),
        ("rewardPerHour", settings(|s| s.reward_per_hour = 5.0)),
    ] {
        assert!(!FilterEngine::new(&s).accepts(&cheap), "{knob}");
    }
}

#[test]
fn apply_keeps_order() {
    let engine = FilterEngine::new(&settings(|s| s.min_pay = 1.0));
    let delta = vec![
        study("a", Some("£3.00")),
        study("b", Some("£0.50")),
        study("c", Some("£1.00")),
    ];
    let ids: Vec<String> = engine.apply(delta).into_iter().map(|s| s.id).collect();
    assert_eq!(ids, ["a", "c"]);
}

#[test]
fn search_title_or_researcher() {
    let mut a = study("a", None);
    a.title = Some("Memory game".into());
    let mut b = study("b", None);
    b.researcher = Some("Memorial Lab".into());
    let c = study("c", None);
    let all = vec![a, b, c];

    let hits: Vec<&str> = search(&all, "MEMOR").iter().map(|s| s.id.as_str()).collect();
    assert_eq!(hits, ["a", "b"]);
    assert_eq!(search(&all, "  ").len(), 3);
}
