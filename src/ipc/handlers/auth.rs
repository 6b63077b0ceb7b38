use crate::auth::{has_permission_for, ResourceType};
use crate::ipc::error::ok;
use crate::ipc::helpers::{self, finish, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::models::Role;
use serde_json::json;

fn handle_login(state: &mut AppState, req: &Request) -> HandlerResult {
    let username = helpers::param_str(req, "username")?;
    let password = req
        .params
        .get("password")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let store = helpers::store(&state.store, req)?;

    let session = state
        .auth
        .login(store, &username, &password)
        .map_err(|e| helpers::fail(req, e))?;
    if session.is_some() {
        let _ = state.views.reset(session.as_ref(), store);
    }
    Ok(ok(
        &req.id,
        json!({
            "session": session,
            "view": state.views.snapshot(),
        }),
    ))
}

fn handle_logout(state: &mut AppState, req: &Request) -> HandlerResult {
    let store = helpers::store(&state.store, req)?;
    state.auth.logout(store).map_err(|e| helpers::fail(req, e))?;
    let _ = state.views.reset(None, store);
    Ok(ok(&req.id, json!({ "view": state.views.snapshot() })))
}

fn handle_current_user(state: &mut AppState, req: &Request) -> HandlerResult {
    let store = helpers::store(&state.store, req)?;
    let session = state.auth.current_user(store);
    let user = session
        .as_ref()
        .and_then(|s| store.find_user(&s.user_id))
        .map(|u| crate::models::PublicUser::from(&u));
    Ok(ok(&req.id, json!({ "session": session, "user": user })))
}

fn handle_has_permission(state: &mut AppState, req: &Request) -> HandlerResult {
    let role = helpers::param_str(req, "role")?;
    let required = Role::parse(&role).unwrap_or(Role::Other);
    let allowed = match state.store.as_ref() {
        Some(store) => state.auth.has_permission(store, required),
        None => has_permission_for(state.auth.session(), required),
    };
    Ok(ok(&req.id, json!({ "allowed": allowed })))
}

fn handle_can_access(state: &mut AppState, req: &Request) -> HandlerResult {
    let resource = helpers::param_str(req, "resource")?;
    let id = helpers::opt_param_str(req, "id");
    let store = helpers::store(&state.store, req)?;
    let allowed = match ResourceType::parse(&resource) {
        Some(kind) => state.auth.can_access_resource(store, kind, id.as_deref()),
        None => false,
    };
    Ok(ok(&req.id, json!({ "allowed": allowed })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(finish(handle_login(state, req))),
        "auth.logout" => Some(finish(handle_logout(state, req))),
        "auth.currentUser" => Some(finish(handle_current_user(state, req))),
        "auth.hasPermission" => Some(finish(handle_has_permission(state, req))),
        "auth.canAccess" => Some(finish(handle_can_access(state, req))),
        _ => None,
    }
}
