use crate::auth::activity;
use crate::ipc::error::ok;
use crate::ipc::helpers::{self, finish, HandlerResult};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

const DEFAULT_LIMIT: usize = 50;

fn handle_activities_list(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let store = helpers::store(&state.store, req)?;
    state
        .auth
        .require_admin("read the activity log")
        .map_err(|e| helpers::fail(req, e))?;
    let limit = req
        .params
        .get("limit")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_LIMIT);
    let entries = activity::recent(store, limit);
    Ok(ok(
        &req.id,
        json!({ "entries": entries, "total": activity::list(store).len() }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "activities.list" => Some(finish(handle_activities_list(state, req))),
        _ => None,
    }
}
