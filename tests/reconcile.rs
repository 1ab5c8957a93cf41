// tests/reconcile.rs
//
// Current-window and history merges, and the explicit history actions.
//
mod common;

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use study_watch::model::{Status, Study, StudyHistory};
use study_watch::store::{self, KvStore, MemoryStore, StudyStore, merge_current, merge_history};

use common::study;

fn ids(v: &[Study]) -> Vec<&str> {
    v.iter().map(|s| s.id.as_str()).collect()
}

#[test]
fn accumulate_or_replace_then_cap() {
    let existing = vec![study("a", None), study("b", None)];
    let delta = vec![study("c", None), study("d", None)];

    let kept = merge_current(existing.clone(), &delta, true, 3);
    assert_eq!(ids(&kept), ["b", "c", "d"]);

    let replaced = merge_current(existing, &delta, false, 3);
    assert_eq!(ids(&replaced), ["c", "d"]);
}

#[test]
fn history_sighting_keeps_lifecycle() {
    let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let t1 = t0 + Duration::hours(2);
    let done = t0 + Duration::minutes(30);

    let mut history = StudyHistory::empty(t0);
    merge_history(&mut history, &[study("a", Some("£1.00"))], t0, 500);

    {
        let e = &mut history.studies[0];
        assert_eq!((e.first_seen, e.last_seen), (t0, t0));
        assert_eq!(e.status, Status::Pending);
        assert!(!e.completed && !e.clicked);
        e.completed = true;
        e.clicked = true;
        e.completed_date = Some(done);
        e.status = Status::Approved;
        e.actual_pay = Some(1.0);
    }

    let mut again = study("a", Some("£1.25"));
    again.title = Some("Renamed".into());
    merge_history(&mut history, &[again], t1, 500);

    assert_eq!(history.studies.len(), 1);
    let e = &history.studies[0];
    assert_eq!(e.study.reward.as_deref(), Some("£1.25"));
    assert_eq!(e.study.title.as_deref(), Some("Renamed"));
    assert_eq!(e.first_seen, t0);
    assert_eq!(e.last_seen, t1);
    assert!(e.completed && e.clicked);
    assert_eq!(e.completed_date, Some(done));
    assert_eq!(e.status, Status::Approved);
    assert_eq!(e.actual_pay, Some(1.0));
    assert_eq!(history.last_updated, t1);
}

#[test]
fn history_capped_oldest_first() {
    let now = Utc::now();
    let mut history = StudyHistory::empty(now);
    for batch in 0..6 {
        let delta: Vec<Study> = (0..100).map(|i| study(&format!("s{batch}-{i}"), None)).collect();
        merge_history(&mut history, &delta, now, 500);
        assert!(history.studies.len() <= 500);
    }
    assert_eq!(history.studies.len(), 500);
    assert_eq!(history.studies[0].id(), "s1-0");
    assert_eq!(history.studies[499].id(), "s5-99");
}

#[test]
fn empty_delta_writes_nothing() {
    let local = Arc::new(MemoryStore::new());
    let studies = StudyStore::new(local.clone());

    assert!(!studies.merge_current(&[], true, 100).unwrap());
    assert!(!studies.merge_history(&[], Utc::now()).unwrap());
    assert!(local.snapshot().is_empty());
}

#[test]
fn store_round_trip_uses_camel_case() {
    let local = Arc::new(MemoryStore::new());
    let studies = StudyStore::new(local.clone());
    studies.merge_current(&[study("a", Some("£1.00"))], true, 100).unwrap();
    studies.merge_history(&[study("a", Some("£1.00"))], Utc::now()).unwrap();

    let raw = local.snapshot();
    let current = &raw["currentStudies"][0];
    assert_eq!(current["id"], "a");
    assert_eq!(current["timeInMinutes"], 10);
    assert!(current.get("createdAt").is_some());

    let entry = &raw["studyHistory"]["studies"][0];
    assert_eq!(entry["id"], "a");
    assert_eq!(entry["status"], "pending");
    assert_eq!(entry["completedDate"], serde_json::Value::Null);
    assert!(raw["studyHistory"].get("lastUpdated").is_some());
}

#[test]
fn merge_rereads_bucket_before_writing() {
    let local = Arc::new(MemoryStore::new());
    let a = StudyStore::new(local.clone());
    let b = StudyStore::new(local.clone());

    a.merge_history(&[study("x", None)], Utc::now()).unwrap();
    assert!(b.mark_completed("x", Utc::now()).unwrap());
    a.merge_history(&[study("y", None)], Utc::now()).unwrap();

    let history = a.history().unwrap();
    assert_eq!(history.studies.len(), 2);
    assert!(history.studies[0].completed, "concurrent completion kept");
}

#[test]
fn history_actions() {
    let local = Arc::new(MemoryStore::new());
    let studies = StudyStore::new(local.clone());
    let now = Utc::now();
    studies.merge_history(&[study("a", None), study("b", None)], now).unwrap();

    assert!(studies.mark_clicked("a").unwrap());
    assert!(studies.mark_completed("a", now).unwrap());
    assert!(studies.record_outcome("b", Status::Rejected, None).unwrap());
    assert!(studies.record_outcome("a", Status::Approved, Some(1.75)).unwrap());
    assert!(!studies.mark_completed("nope", now).unwrap());

    let h = studies.history().unwrap();
    let a = &h.studies[0];
    assert!(a.clicked && a.completed);
    assert_eq!(a.completed_date, Some(now));
    assert_eq!((a.status, a.actual_pay), (Status::Approved, Some(1.75)));
    let b = &h.studies[1];
    assert_eq!((b.status, b.completed), (Status::Rejected, false));

    studies.clear_history(now).unwrap();
    assert!(studies.history().unwrap().studies.is_empty());
}

#[test]
fn counter_accumulates() {
    let studies = StudyStore::new(Arc::new(MemoryStore::new()));
    assert_eq!(studies.counter().unwrap(), 0);
    assert_eq!(studies.add_to_counter(2).unwrap(), 2);
    assert_eq!(studies.add_to_counter(3).unwrap(), 5);
}

#[test]
fn malformed_bucket_is_an_error() {
    let local = Arc::new(MemoryStore::new());
    local.set(common::items(serde_json::json!({"currentStudies": "oops"}))).unwrap();
    let err = store::read_key::<Vec<Study>>(&*local, "currentStudies").unwrap_err();
    assert!(err.to_string().contains("currentStudies"));
    assert!(StudyStore::new(local).current_studies().is_err());
}
