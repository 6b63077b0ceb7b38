use crate::errors::RosterError;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{self, finish, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::views::{UiAction, View};
use serde_json::json;

fn handle_view_current(state: &mut AppState, req: &Request) -> HandlerResult {
    Ok(ok(&req.id, json!({ "view": state.views.snapshot() })))
}

fn handle_view_switch(state: &mut AppState, req: &Request) -> HandlerResult {
    let name = helpers::param_str(req, "view")?;
    let Some(view) = View::parse(&name) else {
        return Err(helpers::fail(
            req,
            RosterError::validation(format!("unknown view: {name}")),
        ));
    };
    let store = helpers::store(&state.store, req)?;
    state.auth.current_user(store);

    match state.views.switch_view(view, state.auth.session(), store) {
        Ok(()) => Ok(ok(&req.id, json!({ "view": state.views.snapshot() }))),
        Err(e) => Err(err(
            &req.id,
            e.code(),
            e.to_string(),
            Some(json!({ "view": state.views.snapshot() })),
        )),
    }
}

fn handle_view_action(state: &mut AppState, req: &Request) -> HandlerResult {
    let action: UiAction = helpers::param_as(req, "action")?;
    let store = helpers::store(&state.store, req)?;
    state.auth.current_user(store);

    match state.views.dispatch(action, &mut state.auth, store) {
        Ok(outcome) => Ok(ok(&req.id, json!({ "outcome": outcome }))),
        Err(e) => Err(err(
            &req.id,
            e.code(),
            e.to_string(),
            Some(json!({ "view": state.views.snapshot() })),
        )),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "view.current" => Some(finish(handle_view_current(state, req))),
        "view.switch" => Some(finish(handle_view_switch(state, req))),
        "view.action" => Some(finish(handle_view_action(state, req))),
        _ => None,
    }
}
