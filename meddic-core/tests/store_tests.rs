use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rusqlite::Connection;
use tempfile::TempDir;

use meddic_core::services::{AuditAction, FicheStore, ListFilter};
use meddic_core::{Error, FicheForm, FixedClock, MeddicField, Priority, Status};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 9, 30, 0).unwrap()
}

fn open_at(dir: &TempDir, now: DateTime<Utc>, audit: bool) -> FicheStore {
    FicheStore::open(dir.path().join("meddic.db"), audit)
        .expect("open store")
        .with_clock(FixedClock(now))
}

fn open(dir: &TempDir) -> FicheStore {
    open_at(dir, t0(), true)
}

fn audit_rows(dir: &TempDir) -> i64 {
    let conn = Connection::open(dir.path().join("meddic.db")).expect("open sqlite");
    conn.query_row("SELECT COUNT(*) FROM audit_log", [], |r| r.get(0))
        .expect("count audit")
}

fn full_form() -> FicheForm {
    let mut f = FicheForm::new("Jean Dupont", "Acme");
    f.meeting_date = Some("2024-05-01".into());
    f.commercial = Some("Claire".into());
    f.notes = Some("first call went well".into());
    for field in MeddicField::ALL {
        f = f.with(field, format!("{} details", field.label()));
    }
    f.with_status("Qualified")
}

// ----------------------- save / get -----------------------

#[test]
fn save_then_get_round_trips_every_field() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);

    let form = full_form();
    let saved = store.save(&form).expect("save");
    let got = store.get(saved.id).expect("get");

    assert_eq!(got, saved);
    assert_eq!(got.client_name, "Jean Dupont");
    assert_eq!(got.company, "Acme");
    assert_eq!(got.meeting_date, NaiveDate::from_ymd_opt(2024, 5, 1));
    assert_eq!(got.commercial.as_deref(), Some("Claire"));
    assert_eq!(got.notes.as_deref(), Some("first call went well"));
    for field in MeddicField::ALL {
        assert_eq!(got.field(field), form.field(field), "{field}");
    }
    assert_eq!(got.status, Status::Qualified);
    assert_eq!(got.priority, Priority::High);
    assert_eq!(got.created_at, t0());
    assert_eq!(got.updated_at, t0());
}

#[test]
fn fresh_empty_in_progress_record_is_medium() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);

    let saved = store
        .save(&FicheForm::new("Jean Dupont", "Acme").with_status("In Progress"))
        .unwrap();
    assert_eq!(saved.priority, Priority::Medium);
    assert_eq!(saved.status, Status::InProgress);
    assert_eq!(meddic_core::completion_score(&saved), 0.0);
}

#[test]
fn status_defaults_to_in_progress() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let saved = store.save(&FicheForm::new("a", "b")).unwrap();
    assert_eq!(store.get(saved.id).unwrap().status, Status::InProgress);
}

#[test]
fn rejected_save_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    store.save(&FicheForm::new("a", "b")).unwrap();
    let before = audit_rows(&dir);

    let bad = FicheForm {
        company: "  ".into(),
        meeting_date: Some("2024-13-40".into()),
        status: Some("Lost in space".into()),
        ..FicheForm::new("Jean", "")
    };
    match store.save(&bad) {
        Err(Error::Validation(errs)) => {
            assert!(errs.contains("company"));
            assert!(errs.contains("meeting_date"));
            assert!(errs.contains("status"));
            assert!(!errs.contains("client_name"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(audit_rows(&dir), before);
}

#[test]
fn update_keeps_created_at_and_refreshes_updated_at() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let saved = store.save(&FicheForm::new("a", "Acme")).unwrap();
    drop(store);

    let later = t0() + Duration::days(3);
    let mut store = open_at(&dir, later, true);
    let mut form = FicheForm::from(&saved);
    form.notes = Some("follow-up booked".into());
    let updated = store.save(&form).unwrap();

    assert_eq!(updated.id, saved.id);
    assert_eq!(updated.created_at, t0());
    assert_eq!(updated.updated_at, later);
    assert_eq!(store.get(saved.id).unwrap(), updated);
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn priority_is_recomputed_from_final_values() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let saved = store.save(&FicheForm::new("a", "Acme")).unwrap();
    assert_eq!(saved.priority, Priority::Medium);

    let mut form = full_form();
    form.id = Some(saved.id);
    let upgraded = store.save(&form).unwrap();
    assert_eq!(upgraded.priority, Priority::High);

    let mut form = FicheForm::from(&upgraded);
    form.status = Some("Closed-Lost".into());
    form.metrics = None;
    form.champion = None;
    form.economic_buyer = None;
    form.decision_process = None;
    let downgraded = store.save(&form).unwrap();
    // 1 (33%) + 1 (other status) + 3 (fresh)
    assert_eq!(downgraded.priority, Priority::Low);
    assert_eq!(store.get(saved.id).unwrap().priority, Priority::Low);
}

#[test]
fn updating_unknown_id_is_not_found_and_inserts_nothing() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let mut form = FicheForm::new("a", "b");
    form.id = Some(42);
    assert!(matches!(store.save(&form), Err(Error::NotFound(42))));
    assert_eq!(store.count().unwrap(), 0);
    assert_eq!(audit_rows(&dir), 0);
}

#[test]
fn get_missing_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    assert!(matches!(store.get(7), Err(Error::NotFound(7))));
}

// ----------------------- delete ---------------------------

#[test]
fn delete_missing_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    store.save(&FicheForm::new("a", "b")).unwrap();
    let before = audit_rows(&dir);

    assert!(!store.delete(999).expect("delete missing"));
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(audit_rows(&dir), before);
}

#[test]
fn delete_removes_record_and_keeps_history() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let saved = store.save(&FicheForm::new("a", "b")).unwrap();
    store.save(&FicheForm::from(&saved)).unwrap();

    assert!(store.delete(saved.id).unwrap());
    assert!(matches!(store.get(saved.id), Err(Error::NotFound(_))));

    let actions: Vec<AuditAction> = store
        .history(saved.id)
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(
        actions,
        vec![AuditAction::Create, AuditAction::Update, AuditAction::Delete]
    );
}

// ----------------------- audit ----------------------------

#[test]
fn every_write_appends_exactly_one_entry() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let a = store.save(&FicheForm::new("a", "A")).unwrap();
    assert_eq!(audit_rows(&dir), 1);
    let b = store.save(&FicheForm::new("b", "B")).unwrap();
    assert_eq!(audit_rows(&dir), 2);
    store.save(&FicheForm::from(&a)).unwrap();
    assert_eq!(audit_rows(&dir), 3);
    store.delete(b.id).unwrap();
    assert_eq!(audit_rows(&dir), 4);

    let recent = store.recent_activity(2).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].action, AuditAction::Delete);
    assert_eq!(recent[0].fiche_id, b.id);
    assert_eq!(recent[0].timestamp, t0());
    assert_eq!(recent[1].action, AuditAction::Update);
}

#[test]
fn update_entry_describes_changed_fields() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let saved = store.save(&FicheForm::new("a", "Acme")).unwrap();

    let mut one = FicheForm::from(&saved);
    one.champion = Some("Marie".into());
    store.save(&one).unwrap();

    let mut two = one.clone();
    two.status = Some("Waiting".into());
    two.company = "Acme Corp".into();
    store.save(&two).unwrap();

    store.save(&two).unwrap();

    let history = store.history(saved.id).unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].change, None);

    let single = history[1].change.as_ref().expect("single change");
    assert_eq!(single.field, "champion");
    assert_eq!(single.old_value, None);
    assert_eq!(single.new_value.as_deref(), Some("Marie"));

    let multi = history[2].change.as_ref().expect("multi change");
    assert_eq!(multi.field, "company,status");
    assert_eq!(multi.old_value, None);

    assert_eq!(history[3].action, AuditAction::Update);
    assert_eq!(history[3].change, None, "unchanged save records no diff");
}

#[test]
fn disabled_audit_writes_no_entries() {
    let dir = TempDir::new().unwrap();
    let mut store = open_at(&dir, t0(), false);
    assert!(!store.audit_enabled());
    let saved = store.save(&FicheForm::new("a", "b")).unwrap();
    store.save(&FicheForm::from(&saved)).unwrap();
    store.delete(saved.id).unwrap();
    assert_eq!(audit_rows(&dir), 0);
    assert_eq!(store.count().unwrap(), 0);
}

// ----------------------- list / search --------------------

#[test]
fn list_orders_by_most_recent_update() {
    let dir = TempDir::new().unwrap();
    let mut store = open_at(&dir, t0(), true);
    let first = store.save(&FicheForm::new("a", "First")).unwrap();
    drop(store);

    let mut store = open_at(&dir, t0() + Duration::hours(1), true);
    let second = store.save(&FicheForm::new("b", "Second")).unwrap();
    let third = store.save(&FicheForm::new("c", "Third")).unwrap();
    drop(store);

    let mut store = open_at(&dir, t0() + Duration::hours(2), true);
    store.save(&FicheForm::from(&first)).unwrap();

    let ids: Vec<_> = store.list_all(false).unwrap().iter().map(|l| l.fiche.id).collect();
    // Same timestamp for second/third: newest id first.
    assert_eq!(ids, vec![first.id, third.id, second.id]);
}

#[test]
fn list_with_scores_attaches_annotations() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    store.save(&full_form()).unwrap();
    store
        .save(&FicheForm::new("x", "Bare").with(MeddicField::Metrics, "m"))
        .unwrap();

    let plain = store.list_all(false).unwrap();
    assert!(plain.iter().all(|l| l.completion_score.is_none() && l.formatted_date.is_none()));

    let scored = store.list_all(true).unwrap();
    let bare = &scored[0];
    assert_eq!(bare.fiche.company, "Bare");
    assert!((bare.completion_score.unwrap() - 100.0 / 6.0).abs() < 1e-9);
    assert_eq!(bare.formatted_date, None);

    let full = &scored[1];
    assert_eq!(full.completion_score, Some(100.0));
    assert_eq!(full.formatted_date.as_deref(), Some("01/05/2024"));
}

#[test]
fn search_is_case_insensitive_across_text_fields() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let acme = store.save(&FicheForm::new("Jean", "ACME Corp")).unwrap();
    let globex = store
        .save(&FicheForm::new("Hank", "Globex").with(MeddicField::IdentifyPain, "Invoices keyed by hand"))
        .unwrap();
    let mut noted = FicheForm::new("Lucy", "Initech");
    noted.notes = Some("Met at the acme trade show".into());
    let noted = store.save(&noted).unwrap();

    let ids = |term: &str| -> Vec<_> {
        store.search(Some(term)).unwrap().into_iter().map(|f| f.id).collect()
    };
    assert_eq!(ids("acme"), vec![noted.id, acme.id]);
    assert_eq!(ids("KEYED BY"), vec![globex.id]);
    assert_eq!(ids("hank"), vec![globex.id]);
    assert!(ids("umbrella").is_empty());
}

#[test]
fn empty_search_matches_list_all() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    for company in ["A", "B", "C"] {
        store.save(&FicheForm::new("x", company)).unwrap();
    }
    let listed: Vec<_> = store.list_all(false).unwrap().into_iter().map(|l| l.fiche).collect();
    assert_eq!(store.search(Some("")).unwrap(), listed);
    assert_eq!(store.search(None).unwrap(), listed);
}

#[test]
fn list_filter_combines_criteria() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let mut a = FicheForm::new("Jean", "Acme").with_status("Waiting");
    a.commercial = Some("Claire".into());
    let a = store.save(&a).unwrap();
    let mut b = FicheForm::new("Marie", "Acme").with_status("Qualified");
    b.commercial = Some("Paul".into());
    let b = store.save(&b).unwrap();
    let mut c = FicheForm::new("Hank", "Globex").with_status("Waiting");
    c.commercial = Some("Claire".into());
    c.notes = Some("asked for pricing".into());
    let c = store.save(&c).unwrap();

    let ids = |filter: &ListFilter| -> Vec<_> {
        store.list(filter, true).unwrap().into_iter().map(|l| l.fiche.id).collect()
    };

    assert_eq!(ids(&ListFilter::default()), vec![c.id, b.id, a.id]);
    let waiting = ListFilter {
        status: Some(Status::Waiting),
        ..ListFilter::default()
    };
    assert_eq!(ids(&waiting), vec![c.id, a.id]);
    let acme_claire = ListFilter {
        company: Some("Acme".into()),
        commercial: Some("Claire".into()),
        ..ListFilter::default()
    };
    assert_eq!(ids(&acme_claire), vec![a.id]);
    let searched = ListFilter {
        status: Some(Status::Waiting),
        search: Some("PRICING".into()),
        ..ListFilter::default()
    };
    assert_eq!(ids(&searched), vec![c.id]);
    // Company match is exact, not a substring.
    let partial = ListFilter {
        company: Some("Acm".into()),
        ..ListFilter::default()
    };
    assert!(ids(&partial).is_empty());

    let listed = store.list(&waiting, true).unwrap();
    assert_eq!(listed[0].completion_score, Some(0.0));
}

#[test]
fn failed_audit_write_rolls_back_the_record_write() {
    let dir = TempDir::new().unwrap();
    let mut store = open(&dir);
    let saved = store.save(&FicheForm::new("Jean", "Acme")).unwrap();

    Connection::open(dir.path().join("meddic.db"))
        .unwrap()
        .execute_batch("DROP TABLE audit_log;")
        .unwrap();

    let insert = store.save(&FicheForm::new("Marie", "Globex"));
    assert!(matches!(insert, Err(Error::Storage(_))), "{insert:?}");
    assert_eq!(store.count().unwrap(), 1);

    let mut edit = FicheForm::from(&saved);
    edit.notes = Some("should not stick".into());
    let update = store.save(&edit);
    assert!(matches!(update, Err(Error::Storage(_))), "{update:?}");
    assert_eq!(store.get(saved.id).unwrap(), saved);

    let delete = store.delete(saved.id);
    assert!(matches!(delete, Err(Error::Storage(_))), "{delete:?}");
    assert_eq!(store.get(saved.id).unwrap(), saved);
    assert_eq!(store.count().unwrap(), 1);
}
