//! Shared extraction for handlers. Each helper fails with a ready-made error
//! response so handlers can use `?` and return it as-is.

use crate::errors::RosterError;
use crate::ipc::error::{err, from_roster};
use crate::ipc::types::{AppState, Request};
use crate::models::Session;
use crate::store::RecordStore;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub type HandlerResult = Result<Value, Value>;

pub fn finish(r: HandlerResult) -> Value {
    r.unwrap_or_else(|resp| resp)
}

/// Takes the field rather than the whole state so callers can still borrow
/// `auth` and `views` mutably.
pub fn store<'a>(store: &'a Option<RecordStore>, req: &Request) -> Result<&'a RecordStore, Value> {
    store
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// Workspace open and a user signed in.
pub fn session(state: &mut AppState, req: &Request) -> Result<Session, Value> {
    let Some(store) = state.store.as_ref() else {
        return Err(err(&req.id, "no_workspace", "select a workspace first", None));
    };
    state
        .auth
        .current_user(store)
        .ok_or_else(|| err(&req.id, "not_logged_in", "sign in first", None))
}

pub fn fail(req: &Request, e: RosterError) -> Value {
    from_roster(&req.id, &e)
}

pub fn param_str(req: &Request, key: &str) -> Result<String, Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(err(&req.id, "bad_params", format!("missing {key}"), None)),
    }
}

pub fn opt_param_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn param_object(req: &Request, key: &str) -> Result<Map<String, Value>, Value> {
    match req.params.get(key) {
        Some(Value::Object(m)) => Ok(m.clone()),
        _ => Err(err(
            &req.id,
            "bad_params",
            format!("{key} must be an object"),
            None,
        )),
    }
}

pub fn param_as<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, Value> {
    let v = req.params.get(key).cloned().unwrap_or(Value::Null);
    serde_json::from_value(v)
        .map_err(|e| err(&req.id, "bad_params", format!("invalid {key}: {e}"), None))
}

/// Class ids a session may list; `None` means every class.
pub fn visible_class_ids(store: &RecordStore, session: &Session) -> Option<Vec<String>> {
    use crate::models::Role;
    match session.role {
        Role::Admin => None,
        Role::SubjectTeacher => Some(store.teacher_classes(&session.user_id)),
        Role::HomeroomTeacher => Some(
            store
                .homeroom_classes(&session.user_id)
                .into_iter()
                .map(|c| c.id)
                .collect(),
        ),
        Role::Other => Some(Vec::new()),
    }
}
