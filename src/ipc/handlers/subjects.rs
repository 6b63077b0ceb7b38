use crate::errors::RosterError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{self, finish, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::models::Subject;
use crate::views::router::delete_record;
use serde_json::json;

fn handle_subjects_list(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let store = helpers::store(&state.store, req)?;
    Ok(ok(&req.id, json!({ "subjects": store.subjects() })))
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let subject: Subject = helpers::param_as(req, "subject")?;
    let store = helpers::store(&state.store, req)?;
    state
        .auth
        .require_admin("create subjects")
        .map_err(|e| helpers::fail(req, e))?;
    let created = store.add_subject(subject).map_err(|e| helpers::fail(req, e))?;
    Ok(ok(&req.id, json!({ "subject": created })))
}

fn handle_subjects_update(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let subject_id = helpers::param_str(req, "id")?;
    let patch = helpers::param_object(req, "patch")?;
    let store = helpers::store(&state.store, req)?;
    state
        .auth
        .require_admin("edit subjects")
        .map_err(|e| helpers::fail(req, e))?;
    let updated = store
        .update_subject(&subject_id, &patch)
        .map_err(|e| helpers::fail(req, e))?
        .ok_or_else(|| helpers::fail(req, RosterError::not_found("subject")))?;
    Ok(ok(&req.id, json!({ "subject": updated })))
}

fn handle_subjects_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let subject_id = helpers::param_str(req, "id")?;
    let store = helpers::store(&state.store, req)?;
    delete_record(&state.auth, store, "subjects", &subject_id)
        .map_err(|e| helpers::fail(req, e))?;
    Ok(ok(&req.id, json!({ "deleted": true })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(finish(handle_subjects_list(state, req))),
        "subjects.create" => Some(finish(handle_subjects_create(state, req))),
        "subjects.update" => Some(finish(handle_subjects_update(state, req))),
        "subjects.delete" => Some(finish(handle_subjects_delete(state, req))),
        _ => None,
    }
}
