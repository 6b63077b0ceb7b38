use rosterd::backup;
use rosterd::config::{Argon2Config, AuthConfig};
use rosterd::db::DB_FILE;
use rosterd::models::Student;
use rosterd::storage::SqliteStore;
use rosterd::store::RecordStore;
use std::fs::File;
use std::io::{Read, Write};
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

#[test]
fn zip_export_and_import_roundtrip() {
    let workspace = temp_dir("rosterd-backup-src");
    let workspace2 = temp_dir("rosterd-backup-dst");
    let out_dir = temp_dir("rosterd-backup-out");

    let student_id = {
        let store = RecordStore::new(Box::new(SqliteStore::open(&workspace).expect("open")));
        store.ensure_defaults(&cheap_auth()).expect("seed");
        store
            .add_student(Student {
                id: String::new(),
                student_code: "HS001".into(),
                full_name: "Nguyen An".into(),
                class_id: Some("class001".into()),
                date_of_birth: None,
                gender: None,
            })
            .expect("add student")
            .id
    };

    let bundle_path = out_dir.join("workspace.rosterbackup.zip");
    let export = backup::export_workspace_bundle(&workspace, &bundle_path).expect("export bundle");
    assert_eq!(export.bundle_format, backup::BUNDLE_FORMAT);
    assert_eq!(export.entry_count, 2);
    assert_eq!(export.db_sha256.len(), 64);

    let f = File::open(&bundle_path).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    assert!(manifest.contains(backup::BUNDLE_FORMAT));
    assert!(manifest.contains(&export.db_sha256));
    archive
        .by_name("db/roster.sqlite3")
        .expect("database entry in bundle");

    let import = backup::import_workspace_bundle(&bundle_path, &workspace2).expect("import bundle");
    assert_eq!(import.bundle_format_detected, backup::BUNDLE_FORMAT);

    let restored = RecordStore::new(Box::new(SqliteStore::open(&workspace2).expect("open restored")));
    let s = restored.find_student(&student_id).expect("student restored");
    assert_eq!(s.student_code, "HS001");
    assert_eq!(restored.classes().len(), 4);
    drop(restored);

    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(workspace2);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn export_without_a_database_fails() {
    let workspace = temp_dir("rosterd-backup-empty");
    let out = workspace.join("out.zip");
    assert!(backup::export_workspace_bundle(&workspace, &out).is_err());
    assert!(!out.exists());
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn tampered_bundle_is_rejected_and_leaves_the_workspace_alone() {
    let out_dir = temp_dir("rosterd-backup-tamper");
    let workspace = temp_dir("rosterd-backup-tamper-dst");
    std::fs::write(workspace.join(DB_FILE), b"current-db").expect("existing db");

    let bundle_path = out_dir.join("tampered.zip");
    {
        let f = File::create(&bundle_path).expect("create zip");
        let mut zip = zip::ZipWriter::new(f);
        let opts = zip::write::FileOptions::default();
        zip.start_file("manifest.json", opts).expect("manifest");
        zip.write_all(
            format!(
                "{{\"format\":\"{}\",\"version\":1,\"dbSha256\":\"{}\"}}",
                backup::BUNDLE_FORMAT,
                "0".repeat(64)
            )
            .as_bytes(),
        )
        .expect("write manifest");
        zip.start_file("db/roster.sqlite3", opts).expect("db entry");
        zip.write_all(b"not the original bytes").expect("write db");
        zip.finish().expect("finish zip");
    }

    let err = backup::import_workspace_bundle(&bundle_path, &workspace).expect_err("digest mismatch");
    assert!(err.to_string().contains("digest mismatch"));
    let current = std::fs::read(workspace.join(DB_FILE)).expect("db still there");
    assert_eq!(current, b"current-db");

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn unknown_bundle_format_is_rejected() {
    let out_dir = temp_dir("rosterd-backup-format");
    let workspace = temp_dir("rosterd-backup-format-dst");
    let bundle_path = out_dir.join("other.zip");
    {
        let f = File::create(&bundle_path).expect("create zip");
        let mut zip = zip::ZipWriter::new(f);
        zip.start_file("manifest.json", zip::write::FileOptions::default())
            .expect("manifest");
        zip.write_all(b"{\"format\":\"something-else\"}")
            .expect("write manifest");
        zip.finish().expect("finish zip");
    }

    let err = backup::import_workspace_bundle(&bundle_path, &workspace).expect_err("bad format");
    assert!(err.to_string().contains("unsupported bundle format"));

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn legacy_sqlite_import_is_supported() {
    let legacy_ws = temp_dir("rosterd-backup-legacy");
    let workspace = temp_dir("rosterd-backup-legacy-dst");

    let student_id = {
        let store = RecordStore::new(Box::new(SqliteStore::open(&legacy_ws).expect("open")));
        store.ensure_defaults(&cheap_auth()).expect("seed");
        store
            .add_student(Student {
                id: String::new(),
                student_code: "HS009".into(),
                full_name: "Le Chi".into(),
                class_id: None,
                date_of_birth: None,
                gender: None,
            })
            .expect("add student")
            .id
    };
    let legacy_file = legacy_ws.join(DB_FILE);

    let import =
        backup::import_workspace_bundle(&legacy_file, &workspace).expect("import legacy sqlite");
    assert_eq!(import.bundle_format_detected, backup::LEGACY_FORMAT);

    let restored = RecordStore::new(Box::new(SqliteStore::open(&workspace).expect("reopen")));
    let student = restored.find_student(&student_id).expect("student restored");
    assert_eq!(student.student_code, "HS009");

    let _ = std::fs::remove_dir_all(legacy_ws);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn non_database_input_leaves_the_workspace_untouched() {
    let workspace = temp_dir("rosterd-backup-junk");
    let out_dir = temp_dir("rosterd-backup-junk-in");

    let student_id = {
        let store = RecordStore::new(Box::new(SqliteStore::open(&workspace).expect("open")));
        store.ensure_defaults(&cheap_auth()).expect("seed");
        store
            .add_student(Student {
                id: String::new(),
                student_code: "HS001".into(),
                full_name: "Nguyen An".into(),
                class_id: Some("class001".into()),
                date_of_birth: None,
                gender: None,
            })
            .expect("add student")
            .id
    };
    let before = std::fs::read(workspace.join(DB_FILE)).expect("read db");

    for (name, bytes) in [
        ("notes.txt", b"just some text, not a database".as_slice()),
        ("tiny.bin", b"SQL".as_slice()),
        ("empty.sqlite3", b"".as_slice()),
    ] {
        let junk = out_dir.join(name);
        std::fs::write(&junk, bytes).expect("write junk");
        let err = backup::import_workspace_bundle(&junk, &workspace).expect_err("rejected");
        assert!(
            format!("{err:#}").contains("not a zip bundle or sqlite database"),
            "{name}: {err:#}"
        );
    }

    assert_eq!(std::fs::read(workspace.join(DB_FILE)).expect("read db"), before);
    let store = RecordStore::new(Box::new(SqliteStore::open(&workspace).expect("reopen")));
    assert!(store.find_student(&student_id).is_some());

    let _ = std::fs::remove_dir_all(out_dir);
    let _ = std::fs::remove_dir_all(workspace);
}
