use rosterd::config::{Argon2Config, AuthConfig};
use rosterd::grading::average_score;
use rosterd::models::{keys, Class, Student};
use rosterd::storage::SqliteStore;
use rosterd::store::RecordStore;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn cheap_auth() -> AuthConfig {
    AuthConfig {
        argon2: Argon2Config {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        },
        ..AuthConfig::default()
    }
}

fn obj(v: Value) -> Map<String, Value> {
    v.as_object().cloned().expect("json object")
}

fn student(code: &str, name: &str, class_id: Option<&str>) -> Student {
    Student {
        id: String::new(),
        student_code: code.to_string(),
        full_name: name.to_string(),
        class_id: class_id.map(str::to_string),
        date_of_birth: None,
        gender: None,
    }
}

fn seeded() -> RecordStore {
    let store = RecordStore::in_memory();
    store.ensure_defaults(&cheap_auth()).expect("seed");
    store
}

#[test]
fn seeding_fills_defaults_once_and_respects_empty_lists() {
    let store = RecordStore::in_memory();
    let first = store.ensure_defaults(&cheap_auth()).expect("seed");
    assert!(first.admin_created);
    assert_eq!(store.classes().len(), 4);
    assert_eq!(store.subjects().len(), 8);
    assert_eq!(store.users().len(), 1);
    assert!(store.students().is_empty());

    let names: Vec<String> = store.classes().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["10A1", "10A2", "11A1", "12A1"]);

    store.save_all::<Class>(&[]).expect("clear classes");
    let second = store.ensure_defaults(&cheap_auth()).expect("reseed");
    assert!(second.seeded.is_empty());
    assert!(!second.admin_created);
    assert!(store.classes().is_empty(), "a persisted empty list is kept");
    assert_eq!(store.users().len(), 1);
}

#[test]
fn insert_assigns_fresh_ids_and_update_never_changes_them() {
    let store = seeded();
    let a = store
        .add_student(student("HS001", "Nguyen An", Some("class001")))
        .expect("add a");
    let b = store
        .add_student(student("HS002", "Tran Binh", None))
        .expect("add b");
    assert!(!a.id.is_empty());
    assert_ne!(a.id, b.id);

    let updated = store
        .update_student(&a.id, &obj(json!({ "id": "hijack", "fullName": "Nguyen Van An" })))
        .expect("update")
        .expect("found");
    assert_eq!(updated.id, a.id);
    assert_eq!(updated.full_name, "Nguyen Van An");
    assert_eq!(updated.student_code, "HS001");
    assert_eq!(updated.class_id.as_deref(), Some("class001"));

    let missing = store
        .update_student("nope", &obj(json!({ "fullName": "X" })))
        .expect("update missing");
    assert!(missing.is_none());
    assert!(!store.delete_student("nope").expect("delete missing"));
}

#[test]
fn student_validation_rejects_duplicates_and_unknown_classes() {
    let store = seeded();
    store
        .add_student(student("HS001", "Nguyen An", Some("class001")))
        .expect("add");

    let dup = store
        .add_student(student("HS001", "Someone Else", None))
        .expect_err("duplicate code");
    assert_eq!(dup.code(), "bad_params");

    let bad_class = store
        .add_student(student("HS002", "Le Chi", Some("class999")))
        .expect_err("unknown class");
    assert_eq!(bad_class.code(), "bad_params");

    let blank = store
        .add_student(student("HS003", "  ", None))
        .expect_err("blank name");
    assert_eq!(blank.code(), "bad_params");
}

#[test]
fn score_upsert_merges_by_student_and_subject() {
    let store = seeded();
    let s = store
        .add_student(student("HS001", "Nguyen An", Some("class001")))
        .expect("add");

    store
        .add_or_update_score(&obj(json!({ "studentId": s.id, "subjectId": "subj001", "oral": 8 })))
        .expect("first upsert");
    let merged = store
        .add_or_update_score(&obj(json!({ "studentId": s.id, "subjectId": "subj001", "final": 9 })))
        .expect("second upsert");

    let rows = store.scores();
    assert_eq!(rows.len(), 1);
    assert_eq!(merged.oral, Some(8.0));
    assert_eq!(merged.final_exam, Some(9.0));
    assert_eq!(merged.class_id.as_deref(), Some("class001"));
    let avg = average_score(&merged).expect("average");
    assert!((avg - 8.75).abs() < 1e-9);

    let before = store.scores();
    store
        .add_or_update_score(&obj(json!({ "studentId": s.id, "subjectId": "subj001", "final": 9 })))
        .expect("repeat upsert");
    assert_eq!(store.scores(), before, "identical input leaves the store unchanged");

    let cleared = store
        .add_or_update_score(&obj(json!({ "studentId": s.id, "subjectId": "subj001", "oral": null })))
        .expect("clear oral");
    assert_eq!(cleared.oral, None);
    assert_eq!(cleared.final_exam, Some(9.0));
}

#[test]
fn score_upsert_rejects_out_of_range_and_missing_keys() {
    let store = seeded();
    for bad in [
        json!({ "studentId": "s1", "subjectId": "subj001", "oral": 11 }),
        json!({ "studentId": "s1", "subjectId": "subj001", "test15": -0.5 }),
        json!({ "studentId": "s1", "subjectId": "subj001", "midterm": "9" }),
        json!({ "subjectId": "subj001", "oral": 5 }),
        json!({ "studentId": "s1", "subjectId": "", "oral": 5 }),
    ] {
        let e = store.add_or_update_score(&obj(bad)).expect_err("rejected");
        assert_eq!(e.code(), "bad_params");
    }
    assert!(store.scores().is_empty());
}

#[test]
fn score_upsert_needs_an_existing_student_and_subject() {
    let store = seeded();
    let s = store
        .add_student(student("HS001", "Nguyen An", Some("class001")))
        .expect("add");

    let e = store
        .add_or_update_score(&obj(json!({ "studentId": "ghost", "subjectId": "subj001", "oral": 8 })))
        .expect_err("unknown student");
    assert_eq!(e.code(), "bad_params");
    let e = store
        .add_or_update_score(&obj(json!({ "studentId": s.id, "subjectId": "subj-gone", "oral": 8 })))
        .expect_err("unknown subject");
    assert_eq!(e.code(), "bad_params");
    assert!(store.scores().is_empty());

    store
        .add_or_update_score(&obj(json!({ "studentId": s.id, "subjectId": "subj001", "oral": 8 })))
        .expect("upsert");
    assert!(store.delete_student(&s.id).expect("delete"));
    let e = store
        .add_or_update_score(&obj(json!({ "studentId": s.id, "subjectId": "subj001", "final": 9 })))
        .expect_err("deleted student");
    assert_eq!(e.code(), "bad_params");
    assert!(store.scores().is_empty());
}

#[test]
fn deleting_a_student_removes_their_scores() {
    let store = seeded();
    let a = store
        .add_student(student("HS001", "Nguyen An", Some("class001")))
        .expect("add a");
    let b = store
        .add_student(student("HS002", "Tran Binh", Some("class001")))
        .expect("add b");
    for sid in [&a.id, &b.id] {
        store
            .add_or_update_score(&obj(json!({ "studentId": sid, "subjectId": "subj001", "oral": 7 })))
            .expect("upsert");
    }

    assert!(store.delete_student(&a.id).expect("delete"));
    let remaining = store.scores();
    assert_eq!(remaining.len(), 1);
    assert!(remaining.iter().all(|s| s.student_id == b.id));
}

#[test]
fn deleting_a_class_unassigns_its_students() {
    let store = seeded();
    let a = store
        .add_student(student("HS001", "Nguyen An", Some("class002")))
        .expect("add");
    assert_eq!(
        store
            .classes_with_counts()
            .iter()
            .find(|c| c.id == "class002")
            .map(|c| c.student_count),
        Some(1)
    );

    assert!(store.delete_class("class002").expect("delete class"));
    let after = store.find_student(&a.id).expect("student survives");
    assert_eq!(after.class_id, None);
    assert_eq!(store.classes().len(), 3);
}

#[test]
fn scores_by_class_joins_through_current_members() {
    let store = seeded();
    let a = store
        .add_student(student("HS001", "Nguyen An", Some("class001")))
        .expect("add a");
    let b = store
        .add_student(student("HS002", "Tran Binh", Some("class002")))
        .expect("add b");
    for sid in [&a.id, &b.id] {
        store
            .add_or_update_score(&obj(json!({ "studentId": sid, "subjectId": "subj002", "test45": 6 })))
            .expect("upsert");
    }

    let c1 = store.scores_by_class("class001");
    assert_eq!(c1.len(), 1);
    assert_eq!(c1[0].student_id, a.id);
    assert_eq!(store.scores_for("class002", "subj002").len(), 1);
    assert!(store.scores_for("class002", "subj001").is_empty());
    assert_eq!(store.scores_by_student(&b.id).len(), 1);
}

#[test]
fn malformed_collection_reads_as_empty_and_is_not_reseeded() {
    let store = RecordStore::in_memory();
    store
        .documents()
        .set_raw(keys::STUDENTS, "{not json")
        .expect("write garbage");
    store
        .documents()
        .set_raw(keys::CLASSES, "{\"shape\":\"wrong\"}")
        .expect("write wrong shape");

    assert!(store.students().is_empty());
    assert!(store.classes().is_empty());

    store.ensure_defaults(&cheap_auth()).expect("seed");
    assert!(store.classes().is_empty(), "present but unreadable is not absent");
    assert_eq!(store.subjects().len(), 8);
}

#[test]
fn sqlite_workspace_persists_across_reopen() {
    let workspace = temp_dir("rosterd-store-reopen");
    let id = {
        let store = RecordStore::new(Box::new(SqliteStore::open(&workspace).expect("open")));
        store.ensure_defaults(&cheap_auth()).expect("seed");
        store
            .add_student(student("HS010", "Pham Dung", Some("class003")))
            .expect("add")
            .id
    };

    let store = RecordStore::new(Box::new(SqliteStore::open(&workspace).expect("reopen")));
    let report = store.ensure_defaults(&cheap_auth()).expect("reseed");
    assert!(report.seeded.is_empty());
    let s = store.find_student(&id).expect("persisted student");
    assert_eq!(s.full_name, "Pham Dung");
    assert_eq!(store.students_by_class("class003").len(), 1);

    drop(store);
    let _ = std::fs::remove_dir_all(workspace);
}
