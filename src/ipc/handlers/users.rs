use crate::auth::NewUser;
use crate::ipc::error::ok;
use crate::ipc::helpers::{self, finish, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::models::PublicUser;
use serde_json::json;

fn handle_users_list(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let store = helpers::store(&state.store, req)?;
    state
        .auth
        .require_admin("list accounts")
        .map_err(|e| helpers::fail(req, e))?;
    let users: Vec<PublicUser> = store.users().iter().map(PublicUser::from).collect();
    Ok(ok(&req.id, json!({ "users": users })))
}

fn handle_users_create(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let input: NewUser = helpers::param_as(req, "user")?;
    let store = helpers::store(&state.store, req)?;
    let user = state
        .auth
        .create_user(store, input)
        .map_err(|e| helpers::fail(req, e))?;
    Ok(ok(&req.id, json!({ "user": user })))
}

fn handle_users_update(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let user_id = helpers::param_str(req, "id")?;
    let patch = helpers::param_object(req, "patch")?;
    let store = helpers::store(&state.store, req)?;
    let user = state
        .auth
        .update_user(store, &user_id, &patch)
        .map_err(|e| helpers::fail(req, e))?;
    Ok(ok(&req.id, json!({ "user": user })))
}

fn handle_users_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    helpers::session(state, req)?;
    let user_id = helpers::param_str(req, "id")?;
    let store = helpers::store(&state.store, req)?;
    state
        .auth
        .delete_user(store, &user_id)
        .map_err(|e| helpers::fail(req, e))?;
    Ok(ok(&req.id, json!({ "deleted": true })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.list" => Some(finish(handle_users_list(state, req))),
        "users.create" => Some(finish(handle_users_create(state, req))),
        "users.update" => Some(finish(handle_users_update(state, req))),
        "users.delete" => Some(finish(handle_users_delete(state, req))),
        _ => None,
    }
}
