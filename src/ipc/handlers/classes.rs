use crate::errors::RosterError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{self, finish, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::models::{Class, Role, TeacherAssignment};
use crate::views::router::delete_record;
use serde_json::json;

fn handle_classes_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let session = helpers::session(state, req)?;
    let store = helpers::store(&state.store, req)?;
    let visible = helpers::visible_class_ids(store, &session);
    let classes: Vec<Class> = store
        .classes_with_counts()
        .into_iter()
        .filter(|c| visible.as_ref().map_or(true, |ids| ids.contains(&c.id)))
        .collect();
    Ok(ok(&req.id, json!({ "classes": classes })))
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let class: Class = helpers::param_as(req, "class")?;
    let store = helpers::store(&state.store, req)?;
    state
        .auth
        .require_admin("create classes")
        .map_err(|e| helpers::fail(req, e))?;
    let created = store.add_class(class).map_err(|e| helpers::fail(req, e))?;
    Ok(ok(&req.id, json!({ "class": created })))
}

fn handle_classes_update(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let class_id = helpers::param_str(req, "id")?;
    let mut patch = helpers::param_object(req, "patch")?;
    // derived, never written through
    patch.remove("studentCount");
    let store = helpers::store(&state.store, req)?;
    state
        .auth
        .require_admin("edit classes")
        .map_err(|e| helpers::fail(req, e))?;
    let updated = store
        .update_class(&class_id, &patch)
        .map_err(|e| helpers::fail(req, e))?
        .ok_or_else(|| helpers::fail(req, RosterError::not_found("class")))?;
    Ok(ok(&req.id, json!({ "class": updated })))
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let class_id = helpers::param_str(req, "id")?;
    let store = helpers::store(&state.store, req)?;
    delete_record(&state.auth, store, "classes", &class_id).map_err(|e| helpers::fail(req, e))?;
    Ok(ok(&req.id, json!({ "deleted": true })))
}

fn handle_assignments_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let session = helpers::session(state, req)?;
    let store = helpers::store(&state.store, req)?;
    let teacher_id = helpers::opt_param_str(req, "teacherId");
    if session.role != Role::Admin && teacher_id.as_deref() != Some(session.user_id.as_str()) {
        return Err(helpers::fail(
            req,
            RosterError::denied("teachers may only list their own assignments"),
        ));
    }
    let assignments: Vec<TeacherAssignment> = store
        .teacher_assignments()
        .into_iter()
        .filter(|a| teacher_id.as_deref().map_or(true, |t| a.teacher_id == t))
        .collect();
    Ok(ok(&req.id, json!({ "assignments": assignments })))
}

fn handle_assignments_create(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let assignment: TeacherAssignment = helpers::param_as(req, "assignment")?;
    let store = helpers::store(&state.store, req)?;
    state
        .auth
        .require_admin("assign teachers")
        .map_err(|e| helpers::fail(req, e))?;
    let stored = store
        .add_teacher_assignment(assignment)
        .map_err(|e| helpers::fail(req, e))?;
    Ok(ok(&req.id, json!({ "assignment": stored })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(finish(handle_classes_list(state, req))),
        "classes.create" => Some(finish(handle_classes_create(state, req))),
        "classes.update" => Some(finish(handle_classes_update(state, req))),
        "classes.delete" => Some(finish(handle_classes_delete(state, req))),
        "assignments.list" => Some(finish(handle_assignments_list(state, req))),
        "assignments.create" => Some(finish(handle_assignments_create(state, req))),
        _ => None,
    }
}
