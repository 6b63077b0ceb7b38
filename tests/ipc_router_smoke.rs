use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
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

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rosterd");
    let mut child = Command::new(exe)
        .env("ROSTERD_AUTH__ARGON2__MEMORY_COST", "1024")
        .env("ROSTERD_AUTH__ARGON2__TIME_COST", "1")
        .env_remove("ROSTERD_WORKSPACE__PATH")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rosterd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

fn expect_ok(resp: &serde_json::Value, what: &str) -> serde_json::Value {
    assert_eq!(
        resp.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{what} failed: {resp}"
    );
    resp["result"].clone()
}

fn error_code(resp: &serde_json::Value) -> Option<&str> {
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("rosterd-router-smoke");
    let bundle_out = workspace.join("smoke-backup.rosterbackup.zip");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(expect_ok(&health, "health")["workspacePath"], serde_json::Value::Null);

    let early = request(&mut stdin, &mut reader, "2", "classes.list", json!({}));
    assert_eq!(error_code(&early), Some("no_workspace"));

    let selected = request(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let selected = expect_ok(&selected, "workspace.select");
    assert!(selected["seeded"]
        .as_array()
        .is_some_and(|keys| keys.iter().any(|k| k == "classes")));

    let anon = request(&mut stdin, &mut reader, "4", "students.list", json!({}));
    assert_eq!(error_code(&anon), Some("not_logged_in"));

    let bad_login = request(
        &mut stdin,
        &mut reader,
        "5",
        "auth.login",
        json!({ "username": "admin", "password": "nope" }),
    );
    assert_eq!(expect_ok(&bad_login, "bad login")["session"], serde_json::Value::Null);

    let login = request(
        &mut stdin,
        &mut reader,
        "6",
        "auth.login",
        json!({ "username": "admin", "password": "admin123" }),
    );
    let login = expect_ok(&login, "login");
    assert_eq!(login["session"]["role"], "admin");
    assert_eq!(login["view"]["view"], "dashboard");

    let classes = request(&mut stdin, &mut reader, "7", "classes.list", json!({}));
    let classes = expect_ok(&classes, "classes.list");
    assert_eq!(classes["classes"].as_array().map(Vec::len), Some(4));

    let created = request(
        &mut stdin,
        &mut reader,
        "8",
        "students.create",
        json!({ "student": {
            "studentCode": "HS001",
            "fullName": "Nguyen An",
            "classId": "class001"
        }}),
    );
    let student_id = expect_ok(&created, "students.create")["student"]["id"]
        .as_str()
        .expect("student id")
        .to_string();

    let upsert = request(
        &mut stdin,
        &mut reader,
        "9",
        "scores.upsert",
        json!({ "score": { "studentId": student_id, "subjectId": "subj001", "oral": 8 } }),
    );
    assert_eq!(expect_ok(&upsert, "scores.upsert")["score"]["classId"], "class001");

    let column = request(
        &mut stdin,
        &mut reader,
        "10",
        "scores.saveColumn",
        json!({
            "classId": "class001",
            "subjectId": "subj001",
            "field": "final",
            "values": { student_id.clone(): 9 }
        }),
    );
    assert_eq!(expect_ok(&column, "scores.saveColumn")["saved"], 1);

    let out_of_range = request(
        &mut stdin,
        &mut reader,
        "11",
        "scores.saveColumn",
        json!({
            "classId": "class001",
            "subjectId": "subj001",
            "field": "oral",
            "values": { student_id.clone(): 12 }
        }),
    );
    assert_eq!(error_code(&out_of_range), Some("bad_params"));

    let report = request(
        &mut stdin,
        &mut reader,
        "12",
        "reports.class",
        json!({ "classId": "class001", "subjectId": "subj001" }),
    );
    let report = expect_ok(&report, "reports.class");
    assert_eq!(report["report"]["rows"][0]["average"], 8.8);

    let switched = request(
        &mut stdin,
        &mut reader,
        "13",
        "view.switch",
        json!({ "view": "students" }),
    );
    let switched = expect_ok(&switched, "view.switch");
    assert_eq!(switched["view"]["view"], "students");

    let action = request(
        &mut stdin,
        &mut reader,
        "14",
        "view.action",
        json!({ "action": { "type": "select_class", "classId": "class001" } }),
    );
    let action = expect_ok(&action, "view.action");
    assert_eq!(action["outcome"]["outcome"], "rendered");
    assert_eq!(
        action["outcome"]["snapshot"]["filters"]["classId"],
        "class001"
    );

    let unbound = request(
        &mut stdin,
        &mut reader,
        "15",
        "view.action",
        json!({ "action": { "type": "select_subject", "subjectId": "subj001" } }),
    );
    assert_eq!(error_code(&unbound), Some("bad_params"));

    let csv = request(
        &mut stdin,
        &mut reader,
        "16",
        "export.collection",
        json!({ "collection": "students", "format": "csv" }),
    );
    let csv = expect_ok(&csv, "export.collection");
    let content = csv["content"].as_str().expect("csv content");
    assert!(content.contains("HS001"));
    assert!(content.lines().count() >= 2);

    let users_csv = request(
        &mut stdin,
        &mut reader,
        "17",
        "export.collection",
        json!({ "collection": "users", "format": "json" }),
    );
    let users_json = expect_ok(&users_csv, "export users")["content"]
        .as_str()
        .expect("json content")
        .to_string();
    assert!(!users_json.contains("$argon2"));

    let backup = request(
        &mut stdin,
        &mut reader,
        "18",
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle_out.to_string_lossy() }),
    );
    assert_eq!(expect_ok(&backup, "backup export")["entryCount"], 2);
    assert!(bundle_out.is_file());

    let me = request(&mut stdin, &mut reader, "19", "auth.currentUser", json!({}));
    let admin_id = expect_ok(&me, "auth.currentUser")["session"]["userId"]
        .as_str()
        .expect("admin id")
        .to_string();
    let delete_admin = request(
        &mut stdin,
        &mut reader,
        "20",
        "users.delete",
        json!({ "id": admin_id }),
    );
    assert_eq!(error_code(&delete_admin), Some("permission_denied"));

    let activities = request(&mut stdin, &mut reader, "21", "activities.list", json!({}));
    assert!(expect_ok(&activities, "activities.list")["total"]
        .as_u64()
        .is_some_and(|n| n >= 1));

    let restored = request(
        &mut stdin,
        &mut reader,
        "22",
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle_out.to_string_lossy() }),
    );
    let restored = expect_ok(&restored, "backup import");
    assert_eq!(restored["view"]["view"], "login");
    let after = request(&mut stdin, &mut reader, "23", "students.list", json!({}));
    assert_eq!(error_code(&after), Some("not_logged_in"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn unknown_methods_and_bad_json_are_reported() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response");
    let bad: serde_json::Value = serde_json::from_str(line.trim()).expect("parse");
    assert_eq!(error_code(&bad), Some("bad_json"));

    let payload = json!({ "id": "x1", "method": "nope.nothing", "params": {} });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush");
    line.clear();
    reader.read_line(&mut line).expect("read response");
    let resp: serde_json::Value = serde_json::from_str(line.trim()).expect("parse");
    assert_eq!(resp["id"], "x1");
    assert_eq!(error_code(&resp), Some("not_implemented"));

    drop(stdin);
    let _ = child.wait();
}
