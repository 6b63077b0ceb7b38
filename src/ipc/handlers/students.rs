use crate::auth::{can_access, ResourceType};
use crate::errors::RosterError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{self, finish, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::models::Student;
use crate::views::router::delete_record;
use serde_json::json;

fn handle_students_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let session = helpers::session(state, req)?;
    let store = helpers::store(&state.store, req)?;
    let class_id = helpers::opt_param_str(req, "classId");

    if let Some(c) = class_id.as_deref() {
        if !can_access(store, Some(&session), ResourceType::Classes, Some(c)) {
            return Err(helpers::fail(req, RosterError::denied("class is outside your assignments")));
        }
    }
    let visible = helpers::visible_class_ids(store, &session);
    let students: Vec<Student> = store
        .students()
        .into_iter()
        .filter(|s| match class_id.as_deref() {
            Some(c) => s.class_id.as_deref() == Some(c),
            None => true,
        })
        .filter(|s| match &visible {
            None => true,
            Some(ids) => s.class_id.as_ref().is_some_and(|c| ids.contains(c)),
        })
        .collect();
    Ok(ok(&req.id, json!({ "students": students })))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let student: Student = helpers::param_as(req, "student")?;
    let store = helpers::store(&state.store, req)?;
    state
        .auth
        .require_roster_write(store, student.class_id.as_deref())
        .map_err(|e| helpers::fail(req, e))?;
    let created = store.add_student(student).map_err(|e| helpers::fail(req, e))?;
    Ok(ok(&req.id, json!({ "student": created })))
}

fn handle_students_update(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let student_id = helpers::param_str(req, "id")?;
    let patch = helpers::param_object(req, "patch")?;
    let store = helpers::store(&state.store, req)?;

    let current = store
        .find_student(&student_id)
        .ok_or_else(|| helpers::fail(req, RosterError::not_found("student")))?;
    state
        .auth
        .require_roster_write(store, current.class_id.as_deref())
        .map_err(|e| helpers::fail(req, e))?;
    if let Some(new_class) = patch.get("classId").and_then(|v| v.as_str()) {
        state
            .auth
            .require_roster_write(store, Some(new_class))
            .map_err(|e| helpers::fail(req, e))?;
    }

    let updated = store
        .update_student(&student_id, &patch)
        .map_err(|e| helpers::fail(req, e))?
        .ok_or_else(|| helpers::fail(req, RosterError::not_found("student")))?;
    Ok(ok(&req.id, json!({ "student": updated })))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let student_id = helpers::param_str(req, "id")?;
    let store = helpers::store(&state.store, req)?;
    delete_record(&state.auth, store, "students", &student_id)
        .map_err(|e| helpers::fail(req, e))?;
    Ok(ok(&req.id, json!({ "deleted": true })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(finish(handle_students_list(state, req))),
        "students.create" => Some(finish(handle_students_create(state, req))),
        "students.update" => Some(finish(handle_students_update(state, req))),
        "students.delete" => Some(finish(handle_students_delete(state, req))),
        _ => None,
    }
}
