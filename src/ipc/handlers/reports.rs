use crate::auth::{can_access, ResourceType};
use crate::errors::RosterError;
use crate::grading;
use crate::ipc::error::ok;
use crate::ipc::helpers::{self, finish, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::models::Role;
use serde_json::json;

fn handle_reports_class(state: &mut AppState, req: &Request) -> HandlerResult {
    let session = helpers::session(state, req)?;
    let class_id = helpers::param_str(req, "classId")?;
    let subject_id = helpers::param_str(req, "subjectId")?;
    let store = helpers::store(&state.store, req)?;
    if !can_access(store, Some(&session), ResourceType::Scores, Some(&class_id)) {
        return Err(helpers::fail(req, RosterError::denied("outside your classes")));
    }
    let report =
        grading::class_report(store, &class_id, &subject_id).map_err(|e| helpers::fail(req, e))?;
    Ok(ok(&req.id, json!({ "report": report })))
}

fn handle_reports_subject(state: &mut AppState, req: &Request) -> HandlerResult {
    let session = helpers::session(state, req)?;
    let subject_id = helpers::param_str(req, "subjectId")?;
    let store = helpers::store(&state.store, req)?;
    let allowed = match session.role {
        Role::Admin => true,
        Role::SubjectTeacher => store
            .teacher_subjects(&session.user_id)
            .iter()
            .any(|s| *s == subject_id),
        _ => false,
    };
    if !allowed {
        return Err(helpers::fail(req, RosterError::denied("subject is outside your assignments")));
    }
    let report = grading::subject_report(store, &subject_id).map_err(|e| helpers::fail(req, e))?;
    Ok(ok(&req.id, json!({ "report": report })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.class" => Some(finish(handle_reports_class(state, req))),
        "reports.subject" => Some(finish(handle_reports_subject(state, req))),
        _ => None,
    }
}
