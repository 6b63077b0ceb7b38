use crate::auth::{can_access, ResourceType};
use crate::errors::RosterError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{self, finish, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::models::{ScoreField, Session};
use crate::store::RecordStore;
use serde_json::{json, Map, Value};

fn check_access(
    store: &RecordStore,
    session: &Session,
    req: &Request,
    resource: ResourceType,
    id: &str,
) -> Result<(), Value> {
    if can_access(store, Some(session), resource, Some(id)) {
        Ok(())
    } else {
        Err(helpers::fail(req, RosterError::denied("outside your classes")))
    }
}

fn handle_scores_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let session = helpers::session(state, req)?;
    let class_id = helpers::param_str(req, "classId")?;
    let subject_id = helpers::param_str(req, "subjectId")?;
    let store = helpers::store(&state.store, req)?;
    check_access(store, &session, req, ResourceType::Scores, &class_id)?;
    Ok(ok(
        &req.id,
        json!({ "scores": store.scores_for(&class_id, &subject_id) }),
    ))
}

fn handle_scores_upsert(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let partial = helpers::param_object(req, "score")?;
    let store = helpers::store(&state.store, req)?;

    let student_id = partial
        .get("studentId")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let subject_id = partial
        .get("subjectId")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let student = store
        .find_student(student_id)
        .ok_or_else(|| helpers::fail(req, RosterError::not_found("student")))?;
    state
        .auth
        .require_score_write(store, student.class_id.as_deref(), subject_id)
        .map_err(|e| helpers::fail(req, e))?;

    let score = store
        .add_or_update_score(&partial)
        .map_err(|e| helpers::fail(req, e))?;
    Ok(ok(&req.id, json!({ "score": score })))
}

/// One field for many students of a class, e.g. a whole column of 15-minute
/// test marks. Every value is checked before anything is written.
fn handle_scores_save_column(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let class_id = helpers::param_str(req, "classId")?;
    let subject_id = helpers::param_str(req, "subjectId")?;
    let field_name = helpers::param_str(req, "field")?;
    let Some(field) = ScoreField::parse(&field_name) else {
        return Err(helpers::fail(
            req,
            RosterError::validation(format!("unknown score field: {field_name}")),
        ));
    };
    let values = helpers::param_object(req, "values")?;
    let store = helpers::store(&state.store, req)?;

    if store.find_class(&class_id).is_none() {
        return Err(helpers::fail(req, RosterError::not_found("class")));
    }
    state
        .auth
        .require_score_write(store, Some(&class_id), &subject_id)
        .map_err(|e| helpers::fail(req, e))?;

    let members: Vec<String> = store
        .students_by_class(&class_id)
        .into_iter()
        .map(|s| s.id)
        .collect();
    for (student_id, v) in &values {
        if !members.contains(student_id) {
            return Err(helpers::fail(
                req,
                RosterError::validation(format!("student {student_id} is not in this class")),
            ));
        }
        let in_range = v.is_null() || v.as_f64().is_some_and(|n| (0.0..=10.0).contains(&n));
        if !in_range {
            return Err(helpers::fail(
                req,
                RosterError::validation(format!("{field_name} for {student_id} must be in 0..=10")),
            ));
        }
    }

    let now = chrono::Utc::now().to_rfc3339();
    let mut saved = 0usize;
    for (student_id, v) in values {
        let mut partial = Map::new();
        partial.insert("studentId".into(), Value::String(student_id));
        partial.insert("subjectId".into(), Value::String(subject_id.clone()));
        partial.insert("classId".into(), Value::String(class_id.clone()));
        partial.insert(field.key().into(), v);
        partial.insert("updatedAt".into(), Value::String(now.clone()));
        store
            .add_or_update_score(&partial)
            .map_err(|e| helpers::fail(req, e))?;
        saved += 1;
    }
    Ok(ok(&req.id, json!({ "saved": saved })))
}

fn handle_scores_by_student(state: &mut AppState, req: &Request) -> HandlerResult {
    let session = helpers::session(state, req)?;
    let student_id = helpers::param_str(req, "studentId")?;
    let store = helpers::store(&state.store, req)?;
    check_access(store, &session, req, ResourceType::Students, &student_id)?;
    Ok(ok(
        &req.id,
        json!({ "scores": store.scores_by_student(&student_id) }),
    ))
}

fn handle_scores_by_class(state: &mut AppState, req: &Request) -> HandlerResult {
    let session = helpers::session(state, req)?;
    let class_id = helpers::param_str(req, "classId")?;
    let store = helpers::store(&state.store, req)?;
    check_access(store, &session, req, ResourceType::Scores, &class_id)?;
    Ok(ok(
        &req.id,
        json!({ "scores": store.scores_by_class(&class_id) }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scores.list" => Some(finish(handle_scores_list(state, req))),
        "scores.upsert" => Some(finish(handle_scores_upsert(state, req))),
        "scores.saveColumn" => Some(finish(handle_scores_save_column(state, req))),
        "scores.byStudent" => Some(finish(handle_scores_by_student(state, req))),
        "scores.byClass" => Some(finish(handle_scores_by_class(state, req))),
        _ => None,
    }
}
