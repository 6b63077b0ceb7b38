use rosterd::auth::Auth;
use rosterd::config::{Argon2Config, AuthConfig};
use rosterd::models::{keys, Role};
use rosterd::store::RecordStore;
use serde_json::json;

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

fn legacy_users() -> String {
    json!([
        {
            "id": "u-admin",
            "username": "admin",
            "password": "admin123",
            "fullName": "Quản trị viên",
            "role": "admin",
            "isActive": true
        },
        {
            "id": "u-gv1",
            "username": "gv1",
            "password": "5f4dcc3b5aa765d61d8327deb882cf99",
            "fullName": "Nguyen Thi Lan",
            "role": "subject_teacher"
        },
        { "username": "broken" }
    ])
    .to_string()
}

#[test]
fn legacy_users_are_merged_and_the_key_is_dropped() {
    let store = RecordStore::in_memory();
    store
        .documents()
        .set_raw(keys::LEGACY_USERS, &legacy_users())
        .expect("write legacy");

    let report = store.ensure_defaults(&cheap_auth()).expect("seed");
    assert_eq!(report.migrated_users, 2);
    assert!(!report.admin_created, "legacy admin is reused");
    assert!(store
        .documents()
        .get_raw(keys::LEGACY_USERS)
        .expect("read")
        .is_none());

    let users = store.users();
    assert_eq!(users.len(), 2);
    let admin = store.find_user_by_username("admin").expect("admin");
    assert_eq!(admin.id, "u-admin");
    assert!(admin.password.starts_with("$argon2id$"));
    let teacher = store.find_user_by_username("gv1").expect("teacher");
    assert_eq!(teacher.role, Role::SubjectTeacher);
    assert!(teacher.is_active);
}

#[test]
fn migrated_admin_uses_the_configured_password() {
    let store = RecordStore::in_memory();
    store
        .documents()
        .set_raw(keys::LEGACY_USERS, &legacy_users())
        .expect("write legacy");
    store.ensure_defaults(&cheap_auth()).expect("seed");

    let mut auth = Auth::new(&cheap_auth());
    let session = auth
        .login(&store, "admin", "admin123")
        .expect("login")
        .expect("admin session");
    assert_eq!(session.user_id, "u-admin");

    // A pre-argon2 hash never verifies.
    let mut other = Auth::new(&cheap_auth());
    assert!(other.login(&store, "gv1", "password").expect("login").is_none());
}

#[test]
fn rerunning_migration_does_not_duplicate_users() {
    let store = RecordStore::in_memory();
    store
        .documents()
        .set_raw(keys::LEGACY_USERS, &legacy_users())
        .expect("write legacy");
    store.ensure_defaults(&cheap_auth()).expect("first");

    store
        .documents()
        .set_raw(keys::LEGACY_USERS, &legacy_users())
        .expect("legacy again");
    let again = store.ensure_defaults(&cheap_auth()).expect("second");
    assert_eq!(again.migrated_users, 0);
    assert_eq!(store.users().len(), 2);
    assert!(store
        .documents()
        .get_raw(keys::LEGACY_USERS)
        .expect("read")
        .is_none());
}
